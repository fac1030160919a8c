pub mod evaluator;
pub mod finding;
pub mod report;
pub mod snapshot;

pub use evaluator::{evaluate, Thresholds};
pub use finding::{Finding, FindingKind, Severity};
pub use report::{AuditReport, SeverityCounts};
pub use snapshot::{AccessKeySnapshot, KeyStatus, UserSnapshot};
