//! Seam between the synchronisation layer and the directory.

use async_trait::async_trait;
use schulsync_core::PersonId;

use crate::entry::PersonAttributes;
use crate::error::DirectoryResult;

/// Directory operations the synchronisation engine drives.
///
/// Implementations serialize conflicting mutations internally and retry
/// transient failures; callers see each method as a single atomic step.
#[async_trait]
pub trait DirectoryOps: Send + Sync {
    /// Read the canonical attributes of a person entry, provisioning a
    /// placeholder entry when none exists yet.
    async fn fetch_attributes(
        &self,
        person_id: PersonId,
        username: &str,
        domain: &str,
    ) -> DirectoryResult<PersonAttributes>;

    /// Replace the primary (and optionally alternative) mail address.
    async fn change_primary_email(
        &self,
        person_id: PersonId,
        username: &str,
        address: &str,
        alternative: Option<&str>,
    ) -> DirectoryResult<PersonId>;

    /// Add a member to a school's teacher group, creating the school OU,
    /// `groups` container and group on demand.
    ///
    /// Returns `true` when the membership was added, `false` when the member
    /// was already present.
    async fn add_person_to_group(
        &self,
        person_uid: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool>;

    /// Remove a member from a school's teacher group.
    ///
    /// Returns `true` when the membership was removed, `false` when the group
    /// or the membership did not exist. Removing the sole member deletes the
    /// group entry itself.
    async fn remove_person_from_group(
        &self,
        username: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool>;

    /// DNs of all teacher groups currently listing the member.
    async fn groups_for_member(&self, member_dn: &str) -> DirectoryResult<Vec<String>>;
}
