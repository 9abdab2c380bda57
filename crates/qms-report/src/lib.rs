//! # qms-report
//!
//! Fixed-width text reports laid out on pages.
//!
//! Output is plain bytes: each page carries a header, a body, and a
//! `Page n of m` footer, and pages are separated by a form feed (`\x0C`) so a
//! printer or `lpr` starts each on a fresh sheet.

mod audit;
mod error;
mod layout;
mod nc;
mod text;
mod writer;

pub use audit::render_audit_report;
pub use error::ReportError;
pub use layout::PageLayout;
pub use nc::render_nc_report;
pub use writer::ReportWriter;

/// Separator between pages.
pub const PAGE_BREAK: char = '\x0C';
