//! # Schulsync Sync
//!
//! Reconciliation layer of the school directory engine.
//!
//! Given a person in the relational store, this crate computes the directory
//! state the person should have (teacher group memberships, primary email
//! address) and repairs what it can prove needs repairing:
//!
//! - Missing group memberships are added; orphans and malformed group DNs
//!   are flagged but never mutated.
//! - The primary address is written only when the directory's current value
//!   is superseded by the person's own DISABLED-address history.
//! - Identity attribute drift is logged and left alone.

pub mod attributes;
pub mod engine;
pub mod error;
pub mod groups;

// Re-exports
pub use attributes::{
    detect_identity_drift, reconcile_primary_address, select_sync_address,
    AttributeSyncReconciler, EmailReconcileAction, IdentityDrift,
};
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use groups::{plan_memberships, GroupMembershipReconciler, MembershipPlan};
