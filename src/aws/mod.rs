pub mod client;
pub mod credentials;
pub mod sigv4;

pub use client::{collect_snapshots, AccessKeyMetadata, IamClient, IamUser, IdentitySource};
pub use credentials::Credentials;
