use crate::error::AuditError;

/// Static AWS credentials for signing API requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Present for temporary (STS) credentials
    pub session_token: Option<String>,
}

impl Credentials {
    /// Read credentials from the standard AWS environment variables.
    pub fn from_env() -> Result<Self, AuditError> {
        let access_key_id = require_var("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = require_var("AWS_SECRET_ACCESS_KEY")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

fn require_var(name: &str) -> Result<String, AuditError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AuditError::Fetch(format!(
            "AWS credentials not found: environment variable {} is not set",
            name
        ))),
    }
}
