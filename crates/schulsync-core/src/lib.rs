//! # Schulsync Core
//!
//! Domain model and external interfaces for the school directory
//! reconciliation engine.
//!
//! This crate defines:
//! - Strongly typed identifiers for the relational entities
//! - The read-side domain model (persons, organisations, roles, memberships,
//!   email address history)
//! - Repository traits over the authoritative relational store
//! - Outcome event types and the publisher seam
//!
//! The relational store and the event transport are external collaborators;
//! nothing here touches persistence or a broker directly.

pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod repository;

// Re-exports for convenience
pub use error::{RepoResult, RepositoryError};
pub use events::{EventPublisher, PersonSyncRequested, SyncEvent};
pub use ids::{EmailAddressId, OrganisationId, ParseIdError, PersonId, RoleId};
pub use model::{
    mail_domain, EmailAddress, EmailAddressStatus, Organisation, OrganisationMembership,
    OrganisationTyp, PersonIdentity, Role, Rollenart,
};
pub use repository::{
    EmailRepository, MembershipRepository, OrganisationRepository, PersonRepository,
    RoleRepository,
};
