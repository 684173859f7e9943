//! Repository interfaces
//!
//! Narrow read interfaces over the relational store. Persistence mechanics
//! live with the owning subsystems; this engine consumes these traits and the
//! one `save` needed to persist a directory-assigned entryUUID back.

use async_trait::async_trait;

use crate::error::RepoResult;
use crate::ids::{OrganisationId, PersonId, RoleId};
use crate::model::{
    EmailAddress, Organisation, OrganisationMembership, PersonIdentity, Role,
};

/// Person lookup.
#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// Find a person by id.
    async fn find_by_id(&self, id: PersonId) -> RepoResult<Option<PersonIdentity>>;
}

/// Organisation lookup.
#[async_trait]
pub trait OrganisationRepository: Send + Sync {
    /// Find an organisation by id.
    async fn find_by_id(&self, id: OrganisationId) -> RepoResult<Option<Organisation>>;

    /// Find several organisations at once; missing ids are silently absent
    /// from the result.
    async fn find_by_ids(&self, ids: &[OrganisationId]) -> RepoResult<Vec<Organisation>>;

    /// Resolve the email domain for an organisation, walking up the
    /// organisation hierarchy if the node itself carries none.
    async fn email_domain_for(&self, id: OrganisationId) -> RepoResult<Option<String>>;
}

/// Role lookup.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Find several roles at once; missing ids are silently absent.
    async fn find_by_ids(&self, ids: &[RoleId]) -> RepoResult<Vec<Role>>;
}

/// Membership (Personenkontext) lookup.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// All currently active memberships of a person.
    async fn find_active_by_person(
        &self,
        person_id: PersonId,
    ) -> RepoResult<Vec<OrganisationMembership>>;
}

/// Email address lookup and write-back.
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// The person's enabled address, if any. At most one exists.
    async fn find_enabled_by_person(&self, person_id: PersonId)
        -> RepoResult<Option<EmailAddress>>;

    /// The person's full address history, sorted by `updated_at` descending.
    async fn find_by_person_sorted_desc(
        &self,
        person_id: PersonId,
    ) -> RepoResult<Vec<EmailAddress>>;

    /// Persist a changed address record.
    async fn save(&self, address: EmailAddress) -> RepoResult<EmailAddress>;
}
