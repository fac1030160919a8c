use serde::{Deserialize, Serialize};

/// The misconfiguration categories this tool detects.
///
/// Declaration order is also the report order within one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingKind {
    /// User has no MFA device attached
    NoMfa,
    /// Active access key older than the rotation threshold
    OldAccessKey,
    /// Active access key not used within the inactivity window
    UnusedAccessKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FindingKind {
    /// Severity is a fixed property of the kind, never of the instance.
    pub fn severity(self) -> Severity {
        match self {
            FindingKind::NoMfa => Severity::High,
            FindingKind::OldAccessKey => Severity::Medium,
            FindingKind::UnusedAccessKey => Severity::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FindingKind::NoMfa => "no-mfa",
            FindingKind::OldAccessKey => "old-access-key",
            FindingKind::UnusedAccessKey => "unused-access-key",
        }
    }
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// A single detected misconfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub user_name: String,
    /// Set for key-related kinds, `None` for user-level findings
    pub key_id: Option<String>,
    pub severity: Severity,
    pub detail: String,
    /// Computed age in days where the check is age-based
    pub age_days: Option<i64>,
}

impl Finding {
    pub fn new(kind: FindingKind, user_name: &str) -> Self {
        Finding {
            kind,
            user_name: user_name.to_string(),
            key_id: None,
            severity: kind.severity(),
            detail: String::new(),
            age_days: None,
        }
    }

    pub fn with_key(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    pub fn with_age(mut self, days: i64) -> Self {
        self.age_days = Some(days);
        self
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = detail;
        self
    }
}
