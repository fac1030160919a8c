use thiserror::Error;

/// Error taxonomy for an audit run.
///
/// `Configuration` is reported before any API call, `Fetch` aborts the run
/// before report generation, `Render` covers failures producing an output
/// representation.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Identity API request failed: {0}")]
    Fetch(String),

    #[error("Report rendering failed: {0}")]
    Render(String),
}

impl From<reqwest::Error> for AuditError {
    fn from(err: reqwest::Error) -> Self {
        AuditError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Render(err.to_string())
    }
}
