//! Relational domain model
//!
//! Read-side view of the authoritative relational records: persons, their
//! organisational memberships and their email address history. These types
//! are owned by other subsystems; this engine only reads them and derives
//! directory state from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::ids::{EmailAddressId, OrganisationId, PersonId, RoleId};

/// A person as recorded in the relational store.
///
/// `username` is the mutable, unique login handle and joins the person to the
/// directory entry (uid = username). A person without a username cannot be
/// synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub id: PersonId,
    pub username: Option<String>,
    pub vorname: String,
    pub familienname: String,
}

/// Organisation kind. Only `Schule` induces directory group memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganisationTyp {
    Schule,
    Traeger,
    Land,
    Sonstige,
}

/// An organisation (school, school board, state, …).
///
/// `kennung` is the school's official identifier code and names the
/// directory containers and the teacher group for that school.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organisation {
    pub id: OrganisationId,
    pub typ: OrganisationTyp,
    pub kennung: Option<String>,
    pub name: String,
}

/// Role kind. Only `Lehr` at a `Schule` induces a teacher group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rollenart {
    Lehr,
    Lern,
    Leit,
    Sonstige,
}

/// A role that can be granted at an organisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub rollenart: Rollenart,
}

/// A Personenkontext: the grant of a role to a person at an organisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganisationMembership {
    pub person_id: PersonId,
    pub organisation_id: OrganisationId,
    pub role_id: RoleId,
}

/// Lifecycle state of an email address record.
///
/// At most one address per person is `Enabled` (enforced by the owning
/// subsystem). `Disabled` addresses, ordered by `updated_at` descending, form
/// the supersession history consulted by the conflict-safety rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailAddressStatus {
    Requested,
    Enabled,
    Disabled,
    Failed,
    Deleted,
    DeletedLdap,
    DeletedOx,
}

impl EmailAddressStatus {
    /// String form as stored relationally.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailAddressStatus::Requested => "REQUESTED",
            EmailAddressStatus::Enabled => "ENABLED",
            EmailAddressStatus::Disabled => "DISABLED",
            EmailAddressStatus::Failed => "FAILED",
            EmailAddressStatus::Deleted => "DELETED",
            EmailAddressStatus::DeletedLdap => "DELETED_LDAP",
            EmailAddressStatus::DeletedOx => "DELETED_OX",
        }
    }
}

impl Display for EmailAddressStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailAddressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(EmailAddressStatus::Requested),
            "ENABLED" => Ok(EmailAddressStatus::Enabled),
            "DISABLED" => Ok(EmailAddressStatus::Disabled),
            "FAILED" => Ok(EmailAddressStatus::Failed),
            "DELETED" => Ok(EmailAddressStatus::Deleted),
            "DELETED_LDAP" => Ok(EmailAddressStatus::DeletedLdap),
            "DELETED_OX" => Ok(EmailAddressStatus::DeletedOx),
            other => Err(format!("unknown email address status: {other}")),
        }
    }
}

/// An email address record attached to a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: EmailAddressId,
    pub person_id: PersonId,
    pub address: String,
    pub status: EmailAddressStatus,
    /// Identifier assigned by the external mail system, if provisioning there
    /// has already happened.
    pub ox_user_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EmailAddress {
    /// The domain part of the address, if it has one.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        mail_domain(&self.address)
    }
}

/// Extract the domain part of an email address.
///
/// Returns `None` when the address has no `@` or an empty domain part.
#[must_use]
pub fn mail_domain(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .filter(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .map(|(_, domain)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_status_round_trip() {
        for status in [
            EmailAddressStatus::Requested,
            EmailAddressStatus::Enabled,
            EmailAddressStatus::Disabled,
            EmailAddressStatus::Failed,
            EmailAddressStatus::Deleted,
            EmailAddressStatus::DeletedLdap,
            EmailAddressStatus::DeletedOx,
        ] {
            let parsed: EmailAddressStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_email_status_serde_matches_relational_form() {
        let json = serde_json::to_string(&EmailAddressStatus::DeletedLdap).unwrap();
        assert_eq!(json, "\"DELETED_LDAP\"");
    }

    #[test]
    fn test_mail_domain() {
        assert_eq!(mail_domain("max.muster@schule-sh.de"), Some("schule-sh.de"));
        assert_eq!(mail_domain("no-domain"), None);
        assert_eq!(mail_domain("trailing@"), None);
        assert_eq!(mail_domain("@only-domain.de"), None);
    }

    #[test]
    fn test_email_address_domain() {
        let address = EmailAddress {
            id: EmailAddressId::new(),
            person_id: PersonId::new(),
            address: "erika@ersatzschule-sh.de".to_string(),
            status: EmailAddressStatus::Enabled,
            ox_user_id: None,
            updated_at: Utc::now(),
        };
        assert_eq!(address.domain(), Some("ersatzschule-sh.de"));
    }
}
