//! Sync engine.
//!
//! One sync run is a linear sequence: load the person, pick the address,
//! fetch or provision the directory entry, reconcile group memberships, then
//! reconcile the primary address under the conflict-safety rule. The run is
//! triggered per person by an external event; the handler publishes the
//! outcome and never propagates errors.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use schulsync_core::{
    mail_domain, EmailRepository, EventPublisher, MembershipRepository, OrganisationId,
    OrganisationRepository, OrganisationTyp, PersonId, PersonRepository, PersonSyncRequested,
    RoleId, RoleRepository, Rollenart, SyncEvent,
};
use schulsync_directory::DirectoryOps;

use crate::attributes::{detect_identity_drift, select_sync_address, AttributeSyncReconciler};
use crate::error::{SyncError, SyncResult};
use crate::groups::GroupMembershipReconciler;

/// Result of one completed sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub person_id: PersonId,
    /// Group memberships added during reconciliation.
    pub memberships_added: usize,
    /// Whether the primary address was written.
    pub email_written: bool,
}

/// Drives one person's directory state toward the relational record.
pub struct SyncEngine {
    persons: Arc<dyn PersonRepository>,
    organisations: Arc<dyn OrganisationRepository>,
    roles: Arc<dyn RoleRepository>,
    memberships: Arc<dyn MembershipRepository>,
    emails: Arc<dyn EmailRepository>,
    directory: Arc<dyn DirectoryOps>,
    publisher: Arc<dyn EventPublisher>,
    groups: GroupMembershipReconciler,
    attributes: AttributeSyncReconciler,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persons: Arc<dyn PersonRepository>,
        organisations: Arc<dyn OrganisationRepository>,
        roles: Arc<dyn RoleRepository>,
        memberships: Arc<dyn MembershipRepository>,
        emails: Arc<dyn EmailRepository>,
        directory: Arc<dyn DirectoryOps>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let groups = GroupMembershipReconciler::new(directory.clone());
        let attributes = AttributeSyncReconciler::new(directory.clone(), emails.clone());
        Self {
            persons,
            organisations,
            roles,
            memberships,
            emails,
            directory,
            publisher,
            groups,
            attributes,
        }
    }

    /// Entry point for the sync-requested event.
    ///
    /// Publishes the outcome; a failed run becomes a failure event, never a
    /// propagated error. The process must survive any directory failure.
    #[instrument(skip(self), fields(person_id = %event.person_id))]
    pub async fn handle_sync_requested(&self, event: PersonSyncRequested) {
        match self.sync_person(event.person_id).await {
            Ok(outcome) => {
                info!(
                    memberships_added = outcome.memberships_added,
                    email_written = outcome.email_written,
                    "Sync completed"
                );
                let completed = SyncEvent::SyncCompleted {
                    person_id: outcome.person_id,
                    memberships_added: outcome.memberships_added,
                    email_written: outcome.email_written,
                };
                self.publisher.publish(completed.clone(), completed).await;
            }
            Err(e) => {
                error!(error = %e, "Sync failed");
                let failed = SyncEvent::SyncFailed {
                    person_id: event.person_id,
                    reason: e.to_string(),
                };
                self.publisher.publish(failed.clone(), failed).await;
            }
        }
    }

    /// Run one sync for a person.
    #[instrument(skip(self), fields(person_id = %person_id))]
    pub async fn sync_person(&self, person_id: PersonId) -> SyncResult<SyncOutcome> {
        let person = self
            .persons
            .find_by_id(person_id)
            .await?
            .ok_or(SyncError::PersonNotFound { person_id })?;
        let username = person
            .username
            .clone()
            .ok_or(SyncError::UsernameRequired { person_id })?;

        // Address preconditions before any directory round trip.
        let enabled = self.emails.find_enabled_by_person(person_id).await?;
        let history = self.emails.find_by_person_sorted_desc(person_id).await?;
        let selected = select_sync_address(enabled, &history)
            .ok_or(SyncError::NoUsableAddress { person_id })?;
        let domain = mail_domain(&selected.address)
            .ok_or_else(|| SyncError::AddressWithoutDomain {
                address: selected.address.clone(),
            })?
            .to_string();

        let attributes = self
            .directory
            .fetch_attributes(person_id, &username, &domain)
            .await?;

        for drift in detect_identity_drift(&person, &username, &attributes) {
            warn!(
                attribute = drift.attribute,
                relational = %drift.relational,
                directory = drift.directory.as_deref().unwrap_or("<absent>"),
                "Identity attribute drift detected, not corrected"
            );
        }

        let desired = self.desired_kennungs(person_id).await?;
        let memberships_added = self
            .groups
            .reconcile(&username, &attributes.dn, &desired)
            .await?;

        let email_written = self
            .attributes
            .reconcile(person_id, &username, &selected, &attributes, &history)
            .await?;

        Ok(SyncOutcome {
            person_id,
            memberships_added,
            email_written,
        })
    }

    /// Kennungs of schools where the person holds an active LEHR role.
    async fn desired_kennungs(&self, person_id: PersonId) -> SyncResult<BTreeSet<String>> {
        let memberships = self.memberships.find_active_by_person(person_id).await?;
        if memberships.is_empty() {
            return Ok(BTreeSet::new());
        }

        let organisation_ids: Vec<OrganisationId> =
            memberships.iter().map(|m| m.organisation_id).collect();
        let role_ids: Vec<RoleId> = memberships.iter().map(|m| m.role_id).collect();

        let organisations: HashMap<OrganisationId, _> = self
            .organisations
            .find_by_ids(&organisation_ids)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        let roles: HashMap<RoleId, _> = self
            .roles
            .find_by_ids(&role_ids)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut kennungs = BTreeSet::new();
        for membership in &memberships {
            let Some(organisation) = organisations.get(&membership.organisation_id) else {
                debug!(organisation_id = %membership.organisation_id, "Membership references unknown organisation, skipping");
                continue;
            };
            let Some(role) = roles.get(&membership.role_id) else {
                debug!(role_id = %membership.role_id, "Membership references unknown role, skipping");
                continue;
            };
            if organisation.typ != OrganisationTyp::Schule || role.rollenart != Rollenart::Lehr {
                continue;
            }
            let Some(kennung) = organisation.kennung.clone() else {
                warn!(organisation_id = %organisation.id, "School without kennung, skipping");
                continue;
            };
            kennungs.insert(kennung);
        }

        Ok(kennungs)
    }
}
