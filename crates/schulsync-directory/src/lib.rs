//! # Directory Gateway
//!
//! LDAP gateway for the school synchronisation engine.
//!
//! This crate owns every directory round trip: binding, searching, entry
//! lifecycle (create, implicit provisioning, rename, delete, password reset,
//! email change) and teacher-group membership. All mutations are serialized
//! per call category and retried on transient failures.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use schulsync_directory::{DirectoryConfig, DirectoryGateway};
//!
//! let config: DirectoryConfig = serde_json::from_str(r#"{
//!     "url": "ldap://directory:389",
//!     "bind_dn": "cn=admin,dc=schule-sh,dc=de",
//!     "admin_password": "secret",
//!     "base_dn": "dc=schule-sh,dc=de"
//! }"#)?;
//!
//! let gateway = DirectoryGateway::new(config, publisher)?;
//! let attrs = gateway.fetch_attributes(person_id, "mmuster", "schule-sh.de").await?;
//! ```

pub mod config;
pub mod dn;
pub mod entry;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod membership;
pub mod retry;
pub mod schema;
pub mod traits;

// Re-exports
pub use config::{DirectoryConfig, OU_ERSATZSCHULEN, OU_OEFFENTLICHE_SCHULEN};
pub use entry::PersonAttributes;
pub use error::{DirectoryError, DirectoryResult};
pub use gateway::{DirectoryGateway, RenameReport};
pub use locks::ExclusiveAccessSet;
pub use membership::{plan_member_addition, plan_member_removal, AdditionStep, RemovalStep};
pub use retry::{RetryConfig, RetryExecutor};
pub use traits::DirectoryOps;
