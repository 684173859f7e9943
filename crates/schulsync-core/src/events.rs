//! Outcome events
//!
//! Fire-and-forget announcements of completed or failed directory changes.
//! Every announcement is published twice through the same call: once on the
//! process-local bus and once on the cross-service bus, so other subsystems
//! (mail provisioning, operational tooling) can react without this engine
//! knowing about them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::PersonId;

/// Request to synchronise a person's directory state with the relational
/// record. Emitted by provisioning flows and administrative edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonSyncRequested {
    pub person_id: PersonId,
}

/// An announcement published after a directory change or a failed sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The directory's primary address changed.
    EmailAddressChanged {
        person_id: PersonId,
        username: String,
        primary_address: String,
        alternative_address: Option<String>,
    },

    /// The directory password was reset.
    PasswordReset {
        person_id: PersonId,
        username: String,
    },

    /// A sync run completed; repairs were applied where provable.
    SyncCompleted {
        person_id: PersonId,
        memberships_added: usize,
        email_written: bool,
    },

    /// A sync run aborted before completion.
    SyncFailed {
        person_id: PersonId,
        reason: String,
    },
}

impl SyncEvent {
    /// Stable event-type discriminator for routing and logs.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::EmailAddressChanged { .. } => "email_address_changed",
            SyncEvent::PasswordReset { .. } => "password_reset",
            SyncEvent::SyncCompleted { .. } => "sync_completed",
            SyncEvent::SyncFailed { .. } => "sync_failed",
        }
    }

    /// The person this event is about.
    #[must_use]
    pub fn person_id(&self) -> PersonId {
        match self {
            SyncEvent::EmailAddressChanged { person_id, .. }
            | SyncEvent::PasswordReset { person_id, .. }
            | SyncEvent::SyncCompleted { person_id, .. }
            | SyncEvent::SyncFailed { person_id, .. } => *person_id,
        }
    }
}

/// Publisher seam for outcome events.
///
/// Publishing is fire-and-forget: implementations log transport failures and
/// never propagate them, so a broken bus can never fail a directory repair
/// that already happened.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish the local and the cross-service rendition of one announcement.
    async fn publish(&self, local: SyncEvent, integration: SyncEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_discriminator() {
        let event = SyncEvent::SyncFailed {
            person_id: PersonId::new(),
            reason: "no username".to_string(),
        };
        assert_eq!(event.event_type(), "sync_failed");
    }

    #[test]
    fn test_event_serialization_tag() {
        let person_id = PersonId::new();
        let event = SyncEvent::EmailAddressChanged {
            person_id,
            username: "mmuster".to_string(),
            primary_address: "max@schule-sh.de".to_string(),
            alternative_address: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "email_address_changed");
        assert_eq!(json["username"], "mmuster");

        let back: SyncEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.person_id(), person_id);
    }
}
