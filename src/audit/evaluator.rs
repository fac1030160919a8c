use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::finding::{Finding, FindingKind};
use crate::audit::snapshot::{AccessKeySnapshot, UserSnapshot};
use crate::error::AuditError;

/// Day thresholds driving the key checks.
///
/// Passed in explicitly so the evaluator stays a deterministic function of
/// its inputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Flag active keys older than this many days
    pub max_access_key_age_days: i64,
    /// Flag active keys not used in this many days
    pub inactive_key_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            max_access_key_age_days: 90,
            inactive_key_days: 30,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.max_access_key_age_days <= 0 {
            return Err(AuditError::Configuration(format!(
                "max_access_key_age_days must be positive, got {}",
                self.max_access_key_age_days
            )));
        }
        if self.inactive_key_days <= 0 {
            return Err(AuditError::Configuration(format!(
                "inactive_key_days must be positive, got {}",
                self.inactive_key_days
            )));
        }
        Ok(())
    }
}

/// Evaluate all checks against the fetched snapshots.
///
/// Findings are ordered by user name ascending, then by kind in declaration
/// order (NoMfa, OldAccessKey, UnusedAccessKey). All ages are computed
/// against the single `reference_time` so one report is internally
/// consistent. Inactive keys are skipped by both key checks.
pub fn evaluate(
    users: &BTreeMap<String, UserSnapshot>,
    reference_time: DateTime<Utc>,
    thresholds: &Thresholds,
) -> Result<Vec<Finding>, AuditError> {
    thresholds.validate()?;

    let mut findings = Vec::new();
    for user in users.values() {
        check_mfa(user, &mut findings);
        for key in user.active_keys() {
            check_key_age(key, reference_time, thresholds, &mut findings);
        }
        for key in user.active_keys() {
            check_key_usage(key, reference_time, thresholds, &mut findings);
        }
    }
    Ok(findings)
}

fn check_mfa(user: &UserSnapshot, findings: &mut Vec<Finding>) {
    if user.mfa_devices.is_empty() {
        findings.push(
            Finding::new(FindingKind::NoMfa, &user.user_name)
                .with_detail("user has no MFA device attached".to_string()),
        );
    }
}

fn check_key_age(
    key: &AccessKeySnapshot,
    reference_time: DateTime<Utc>,
    thresholds: &Thresholds,
    findings: &mut Vec<Finding>,
) {
    let age = days_between(key.created_at, reference_time);
    if age > thresholds.max_access_key_age_days {
        findings.push(
            Finding::new(FindingKind::OldAccessKey, &key.user_name)
                .with_key(&key.key_id)
                .with_age(age)
                .with_detail(format!(
                    "access key is {} days old (rotation limit {} days)",
                    age, thresholds.max_access_key_age_days
                )),
        );
    }
}

fn check_key_usage(
    key: &AccessKeySnapshot,
    reference_time: DateTime<Utc>,
    thresholds: &Thresholds,
    findings: &mut Vec<Finding>,
) {
    match key.last_used_at {
        Some(last_used) => {
            let idle = days_between(last_used, reference_time);
            if idle > thresholds.inactive_key_days {
                findings.push(
                    Finding::new(FindingKind::UnusedAccessKey, &key.user_name)
                        .with_key(&key.key_id)
                        .with_age(idle)
                        .with_detail(format!(
                            "access key not used for {} days (inactivity window {} days)",
                            idle, thresholds.inactive_key_days
                        )),
                );
            }
        }
        // A key with no usage record counts as unused once its age since
        // creation exceeds the inactivity window.
        None => {
            let age = days_between(key.created_at, reference_time);
            if age > thresholds.inactive_key_days {
                findings.push(
                    Finding::new(FindingKind::UnusedAccessKey, &key.user_name)
                        .with_key(&key.key_id)
                        .with_age(age)
                        .with_detail(format!(
                            "access key never used since creation {} days ago (inactivity window {} days)",
                            age, thresholds.inactive_key_days
                        )),
                );
            }
        }
    }
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_days()
}
