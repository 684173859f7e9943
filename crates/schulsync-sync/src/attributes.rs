//! Attribute reconciliation rules.
//!
//! Pure decision logic over the relational email history and the directory's
//! current attribute values. The conflict-safety rule lives here: a primary
//! address may only be overwritten when the directory's current value is
//! provably obsolete, meaning it appears verbatim in the person's own
//! DISABLED-address history. An unexplained value is treated as possibly
//! authoritative and never touched.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use schulsync_core::{
    EmailAddress, EmailAddressStatus, EmailRepository, PersonId, PersonIdentity,
};
use schulsync_directory::{DirectoryOps, PersonAttributes};

use crate::error::SyncResult;

/// Pick the address to sync: the enabled one, or failing that the most
/// recently updated FAILED address that has no external mail-system id yet.
///
/// `history` must be sorted by `updated_at` descending.
#[must_use]
pub fn select_sync_address(
    enabled: Option<EmailAddress>,
    history: &[EmailAddress],
) -> Option<EmailAddress> {
    if enabled.is_some() {
        return enabled;
    }
    history
        .iter()
        .find(|a| a.status == EmailAddressStatus::Failed && a.ox_user_id.is_none())
        .cloned()
}

/// Outcome of comparing the directory's primary address with the desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailReconcileAction {
    /// Write the desired address. Either no value exists yet, or the current
    /// value is proven stale by the supersession history.
    Write,
    /// The directory already holds the desired address.
    AlreadyCurrent,
    /// The current value differs and is absent from the supersession
    /// history. The email portion must not write.
    Conflict { current: String },
}

/// Apply the conflict-safety rule.
///
/// `history` is the person's full address history; only DISABLED entries
/// count as supersession evidence.
#[must_use]
pub fn reconcile_primary_address(
    current: Option<&str>,
    desired: &str,
    history: &[EmailAddress],
) -> EmailReconcileAction {
    let Some(current) = current else {
        return EmailReconcileAction::Write;
    };
    if current == desired {
        return EmailReconcileAction::AlreadyCurrent;
    }

    let superseded = history
        .iter()
        .filter(|a| a.status == EmailAddressStatus::Disabled)
        .any(|a| a.address == current);

    if superseded {
        EmailReconcileAction::Write
    } else {
        EmailReconcileAction::Conflict {
            current: current.to_string(),
        }
    }
}

/// One detected mismatch between the relational record and the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDrift {
    /// Directory attribute name the mismatch was found on.
    pub attribute: &'static str,
    pub relational: String,
    pub directory: Option<String>,
}

/// Compare the identity attribute pairs vorname/givenName, familienname/sn
/// and username/cn.
///
/// Detection only; the relational record stays authoritative and nothing is
/// corrected here.
#[must_use]
pub fn detect_identity_drift(
    person: &PersonIdentity,
    username: &str,
    attributes: &PersonAttributes,
) -> Vec<IdentityDrift> {
    let pairs: [(&'static str, &str, &Option<String>); 3] = [
        ("givenName", &person.vorname, &attributes.given_name),
        ("sn", &person.familienname, &attributes.surname),
        ("cn", username, &attributes.cn),
    ];

    pairs
        .into_iter()
        .filter(|(_, relational, directory)| directory.as_deref() != Some(relational))
        .map(|(attribute, relational, directory)| IdentityDrift {
            attribute,
            relational: relational.to_string(),
            directory: directory.clone(),
        })
        .collect()
}

/// Applies the attribute rules against the directory and the relational
/// store.
pub struct AttributeSyncReconciler {
    directory: Arc<dyn DirectoryOps>,
    emails: Arc<dyn EmailRepository>,
}

impl AttributeSyncReconciler {
    pub fn new(directory: Arc<dyn DirectoryOps>, emails: Arc<dyn EmailRepository>) -> Self {
        Self { directory, emails }
    }

    /// Reconcile one person's primary address.
    ///
    /// Returns whether the address was written. A conflict refuses the write
    /// and reports `false`; repairs made earlier in the run stand.
    #[instrument(skip(self, selected, attributes, history), fields(uid = %username))]
    pub async fn reconcile(
        &self,
        person_id: PersonId,
        username: &str,
        selected: &EmailAddress,
        attributes: &PersonAttributes,
        history: &[EmailAddress],
    ) -> SyncResult<bool> {
        match reconcile_primary_address(
            attributes.mail_primary_address.as_deref(),
            &selected.address,
            history,
        ) {
            EmailReconcileAction::AlreadyCurrent => {
                debug!(uid = %username, "Primary address already current");
                Ok(false)
            }
            EmailReconcileAction::Conflict { current } => {
                error!(
                    uid = %username,
                    current = %current,
                    desired = %selected.address,
                    "Primary address conflict: current value is not superseded by the person's own history, refusing to write"
                );
                Ok(false)
            }
            EmailReconcileAction::Write => {
                self.directory
                    .change_primary_email(person_id, username, &selected.address, None)
                    .await?;

                // A previously failed address that made it into the directory
                // is enabled from now on.
                if selected.status != EmailAddressStatus::Enabled {
                    let mut record = selected.clone();
                    record.status = EmailAddressStatus::Enabled;
                    self.emails.save(record).await?;
                }
                Ok(true)
            }
        }
    }
}
