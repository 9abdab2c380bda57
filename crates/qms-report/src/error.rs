use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("Invalid page layout: {0}")]
    InvalidLayout(String),
}
