//! Point-in-time IAM state collected for one audit run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single IAM user as seen at fetch time.
///
/// Snapshots are built once per audit run and never mutated afterwards, so
/// every check evaluates the same state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// IAM user name
    pub user_name: String,
    /// When the user was created
    pub created_at: DateTime<Utc>,
    /// Serial numbers of MFA devices attached to the user
    pub mfa_devices: Vec<String>,
    /// The user's access keys, in the order the API returned them
    pub access_keys: Vec<AccessKeySnapshot>,
}

/// One access key with its usage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKeySnapshot {
    /// Access key id
    pub key_id: String,
    /// Owning user name
    pub user_name: String,
    /// Active or Inactive
    pub status: KeyStatus,
    /// When the key was created
    pub created_at: DateTime<Utc>,
    /// When the key was last used; `None` if it has never been used
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Access key status as reported by IAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Inactive,
}

impl KeyStatus {
    pub fn from_api(value: &str) -> Self {
        if value.eq_ignore_ascii_case("active") {
            KeyStatus::Active
        } else {
            KeyStatus::Inactive
        }
    }

    pub fn is_active(self) -> bool {
        self == KeyStatus::Active
    }
}

impl UserSnapshot {
    /// Keys that are eligible for age/usage checks.
    pub fn active_keys(&self) -> impl Iterator<Item = &AccessKeySnapshot> {
        self.access_keys.iter().filter(|k| k.status.is_active())
    }
}
