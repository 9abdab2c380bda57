use std::sync::Arc;

use qms_config::QmsConfig;
use qms_db::service::QmsService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QmsService>,
    pub config: Arc<QmsConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(service: QmsService, config: QmsConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}
