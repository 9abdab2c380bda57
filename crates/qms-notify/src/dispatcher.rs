//! Best-effort notification dispatch.
//!
//! Domain operations call [`Notifier::notify`] after their transaction commits.
//! The call never fails: a full queue, a stopped worker, or a transport error
//! is logged and counted, and the committed operation stands.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::NotifyError;
use crate::mailer::Mailer;
use crate::message::Notification;

/// Delivery counters, readable while the worker runs.
#[derive(Debug, Default)]
struct DispatchStats {
    queued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

enum Delivery {
    /// Messages go through a bounded queue drained by a worker task.
    Queued(mpsc::Sender<Notification>),
    /// Messages are sent before `notify` returns. Deterministic, for tests and
    /// one-shot commands.
    Inline,
    /// Messages are discarded.
    Disabled,
}

struct Inner {
    delivery: Delivery,
    mailer: Option<Arc<dyn Mailer>>,
    stats: Arc<DispatchStats>,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner.delivery {
            Delivery::Queued(_) => "queued",
            Delivery::Inline => "inline",
            Delivery::Disabled => "disabled",
        };
        f.debug_struct("Notifier")
            .field("mode", &mode)
            .field("transport", &self.inner.mailer.as_ref().map(|m| m.name()))
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Start a queued notifier and its worker task. Must be called inside a
    /// Tokio runtime.
    ///
    /// The worker exits once every clone of the returned `Notifier` is dropped
    /// and the queue has drained.
    #[must_use]
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(DispatchStats::default());
        let handle = tokio::spawn(run_worker(rx, Arc::clone(&mailer), Arc::clone(&stats)));
        let notifier = Self {
            inner: Arc::new(Inner {
                delivery: Delivery::Queued(tx),
                mailer: Some(mailer),
                stats,
            }),
        };
        (notifier, handle)
    }

    /// A notifier that sends each message before `notify` returns.
    #[must_use]
    pub fn inline(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delivery: Delivery::Inline,
                mailer: Some(mailer),
                stats: Arc::new(DispatchStats::default()),
            }),
        }
    }

    /// A notifier that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(Inner {
                delivery: Delivery::Disabled,
                mailer: None,
                stats: Arc::new(DispatchStats::default()),
            }),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self.inner.delivery, Delivery::Disabled)
    }

    /// Hand a message off for delivery. Never fails.
    pub async fn notify(&self, notification: Notification) {
        let stats = &self.inner.stats;
        match &self.inner.delivery {
            Delivery::Disabled => {}
            Delivery::Inline => {
                stats.queued.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self.send_now(&notification).await {
                    tracing::warn!(to = %notification.to, kind = ?notification.kind, "notification failed: {e}");
                }
            }
            Delivery::Queued(tx) => match tx.try_send(notification) {
                Ok(()) => {
                    stats.queued.fetch_add(1, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Full(n)) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(to = %n.to, kind = ?n.kind, "notification queue full; message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(n)) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(to = %n.to, kind = ?n.kind, "notification worker stopped; message dropped");
                }
            },
        }
    }

    /// Send one message immediately, bypassing the queue, and report the outcome.
    ///
    /// Used by the reminder sweep, which counts successes and failures. A
    /// disabled notifier accepts and discards the message.
    ///
    /// # Errors
    ///
    /// Returns the transport's `NotifyError` on delivery failure.
    pub async fn send_now(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Some(mailer) = &self.inner.mailer else {
            return Ok(());
        };
        deliver(mailer.as_ref(), &self.inner.stats, notification).await
    }

    #[must_use]
    pub fn stats(&self) -> DispatchSnapshot {
        let stats = &self.inner.stats;
        DispatchSnapshot {
            queued: stats.queued.load(Ordering::Relaxed),
            sent: stats.sent.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            dropped: stats.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn deliver(
    mailer: &dyn Mailer,
    stats: &DispatchStats,
    notification: &Notification,
) -> Result<(), NotifyError> {
    match mailer.send(notification).await {
        Ok(()) => {
            stats.sent.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(to = %notification.to, kind = ?notification.kind, transport = mailer.name(), "notification sent");
            Ok(())
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Notification>,
    mailer: Arc<dyn Mailer>,
    stats: Arc<DispatchStats>,
) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = deliver(mailer.as_ref(), &stats, &notification).await {
            tracing::warn!(
                to = %notification.to,
                kind = ?notification.kind,
                transport = mailer.name(),
                "notification failed: {e}"
            );
        }
    }
    tracing::debug!("notification worker stopped");
}
