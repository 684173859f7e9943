//! Directory operation gateway.
//!
//! The sole authorized path to the directory. Every public operation follows
//! the same shape: acquire the category lock, then bind, execute and release
//! inside the retry executor. Callers never touch the wire client directly.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use tracing::{debug, info, instrument, warn};

use schulsync_core::{mail_domain, EventPublisher, PersonId, PersonIdentity, SyncEvent};

use crate::config::DirectoryConfig;
use crate::dn::{
    escape_dn_value, escape_filter_value, groups_container_dn, person_dn, school_ou_dn,
    teacher_group_cn, teacher_group_dn,
};
use crate::entry::{normalize_values, PersonAttributes};
use crate::error::{DirectoryError, DirectoryResult};
use crate::locks::ExclusiveAccessSet;
use crate::membership::{plan_member_addition, plan_member_removal, AdditionStep, RemovalStep};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::schema;
use crate::traits::DirectoryOps;

/// LDAP result code for `noSuchObject`.
const RC_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code for `invalidCredentials`.
const RC_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code for `entryAlreadyExists`.
const RC_ALREADY_EXISTS: u32 = 68;

/// Outcome of a rename, including the best-effort group-DN rewrite fan-out.
///
/// A non-empty `failed_groups` does not mean the rename failed; the entry has
/// already moved, only the listed group memberships still carry the old DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameReport {
    /// Effective username after the operation.
    pub username: String,
    /// Groups whose member value was rewritten to the new DN.
    pub rewritten_groups: usize,
    /// Groups whose member value could not be rewritten.
    pub failed_groups: Vec<String>,
}

/// Gateway owning the bind credentials, the category locks and the retry
/// executor.
///
/// One instance per engine; the locks are instance state, not globals.
pub struct DirectoryGateway {
    config: DirectoryConfig,
    locks: ExclusiveAccessSet,
    retry: RetryExecutor,
    publisher: Arc<dyn EventPublisher>,
}

impl DirectoryGateway {
    /// Create a gateway from a validated configuration.
    pub fn new(
        config: DirectoryConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> DirectoryResult<Self> {
        config.validate()?;
        let retry = RetryExecutor::new(RetryConfig {
            attempts: config.retry_attempts,
            delay: config.retry_delay(),
        });
        Ok(Self {
            config,
            locks: ExclusiveAccessSet::new(),
            retry,
            publisher,
        })
    }

    /// Open a connection and perform the administrative bind.
    async fn connect(&self) -> DirectoryResult<Ldap> {
        debug!(url = %self.config.url, "Connecting to directory");

        let settings = LdapConnSettings::new();
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| {
                DirectoryError::bind_with_source(
                    format!("could not connect to {}", self.config.url),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "Directory connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.admin_password)
            .await
            .map_err(|e| {
                DirectoryError::bind_with_source(
                    format!("bind request failed for {}", self.config.bind_dn),
                    e,
                )
            })?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(DirectoryError::bind("invalid bind credentials"));
        }
        if result.rc != 0 {
            return Err(DirectoryError::bind(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(ldap)
    }

    /// Close a connection, tolerating unbind failures.
    async fn release(mut ldap: Ldap) {
        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "Error during directory unbind");
        }
    }

    /// Base-scope read of a single entry. `Ok(None)` when the entry does not
    /// exist.
    async fn read_entry(
        &self,
        ldap: &mut Ldap,
        dn: &str,
        attributes: Vec<&str>,
        entity: &'static str,
    ) -> DirectoryResult<Option<SearchEntry>> {
        let search = ldap
            .search(dn, Scope::Base, "(objectClass=*)", attributes)
            .await
            .map_err(|e| DirectoryError::transport(format!("{entity} search failed for {dn}: {e}")))?;

        let (entries, result) = (search.0, search.1);
        if result.rc == RC_NO_SUCH_OBJECT {
            return Ok(None);
        }
        if result.rc != 0 {
            return Err(DirectoryError::transport(format!(
                "{entity} search failed for {dn} with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(entries.into_iter().next().map(SearchEntry::construct))
    }

    /// Subtree search for a person entry by uid.
    async fn find_person(
        &self,
        ldap: &mut Ldap,
        base: &str,
        username: &str,
    ) -> DirectoryResult<Option<SearchEntry>> {
        let filter = format!("(uid={})", escape_filter_value(username));
        let mut attributes: Vec<&str> = schema::PERSON_ATTRIBUTES.to_vec();
        attributes.push(schema::ATTR_ENTRY_UUID);

        let search = ldap
            .search(base, Scope::Subtree, &filter, attributes)
            .await
            .map_err(|e| {
                DirectoryError::transport(format!("person search failed for uid {username}: {e}"))
            })?;

        let (entries, result) = (search.0, search.1);
        if result.rc == RC_NO_SUCH_OBJECT {
            return Ok(None);
        }
        if result.rc != 0 {
            return Err(DirectoryError::transport(format!(
                "person search failed for uid {username} with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(entries.into_iter().next().map(SearchEntry::construct))
    }

    /// Create a person entry with sentinel name attributes.
    async fn create_placeholder(
        &self,
        ldap: &mut Ldap,
        dn: &str,
        username: &str,
    ) -> DirectoryResult<()> {
        let attrs = placeholder_attributes(username);

        let result = ldap.add(dn, attrs).await.map_err(|e| DirectoryError::Create {
            dn: dn.to_string(),
            message: e.to_string(),
        })?;

        // Lost a race with a concurrent provisioner; the entry exists, which
        // is all this call guarantees.
        if result.rc != 0 && result.rc != RC_ALREADY_EXISTS {
            return Err(DirectoryError::Create {
                dn: dn.to_string(),
                message: format!("code {}: {}", result.rc, result.text),
            });
        }

        info!(dn = %dn, "Provisioned placeholder person entry");
        Ok(())
    }

    /// Warn about canonical attributes missing on an existing entry. The
    /// fields stay absent; the call itself succeeds.
    fn warn_missing_attributes(attributes: &PersonAttributes) {
        let fields: [(&str, &Option<String>); 6] = [
            (schema::ATTR_UID, &attributes.uid),
            (schema::ATTR_CN, &attributes.cn),
            (schema::ATTR_GIVEN_NAME, &attributes.given_name),
            (schema::ATTR_SN, &attributes.surname),
            (schema::ATTR_MAIL_PRIMARY, &attributes.mail_primary_address),
            (
                schema::ATTR_MAIL_ALTERNATIVE,
                &attributes.mail_alternative_address,
            ),
        ];
        for (name, value) in fields {
            if value.is_none() {
                warn!(dn = %attributes.dn, attribute = name, "Attribute could not be read, surfacing as absent");
            }
        }
    }

    async fn fetch_attributes_once(
        &self,
        username: &str,
        domain: &str,
    ) -> DirectoryResult<PersonAttributes> {
        let root = self.config.resolve_root(domain)?;
        let mut ldap = self.connect().await?;

        let outcome = async {
            let base = format!("ou={root},{}", self.config.base_dn);
            if let Some(entry) = self.find_person(&mut ldap, &base, username).await? {
                let attributes = PersonAttributes::from_entry(&entry);
                Self::warn_missing_attributes(&attributes);
                return Ok(attributes);
            }

            // No entry yet: provision the placeholder and hand back its
            // dn/entryUUID only.
            let dn = person_dn(username, root, &self.config.base_dn);
            self.create_placeholder(&mut ldap, &dn, username).await?;

            let entry_uuid = self
                .read_entry(&mut ldap, &dn, vec![schema::ATTR_ENTRY_UUID], "person")
                .await?
                .and_then(|e| crate::entry::first_value(&e, schema::ATTR_ENTRY_UUID));

            Ok(PersonAttributes {
                dn,
                entry_uuid,
                ..PersonAttributes::default()
            })
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Create a teacher entry, ensuring the school group membership first.
    ///
    /// No-ops when the entry already exists. Returns the attributes with the
    /// directory-assigned entryUUID for the caller to persist relationally.
    #[instrument(skip(self, person), fields(person_id = %person.id, kennung = %school_kennung))]
    pub async fn create_teacher_entry(
        &self,
        person: &PersonIdentity,
        domain: &str,
        school_kennung: &str,
        mail: Option<&str>,
    ) -> DirectoryResult<PersonAttributes> {
        let username = person
            .username
            .as_deref()
            .ok_or_else(|| DirectoryError::UsernameRequired {
                person_id: person.id.to_string(),
            })?;

        let root = self.config.resolve_root(domain)?;
        let dn = person_dn(username, root, &self.config.base_dn);

        // Group membership before entry creation, under its own lock.
        DirectoryOps::add_person_to_group(self, username, school_kennung, &dn).await?;

        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.create_teacher_entry_once(person, username, &dn, mail))
            .await
    }

    async fn create_teacher_entry_once(
        &self,
        person: &PersonIdentity,
        username: &str,
        dn: &str,
        mail: Option<&str>,
    ) -> DirectoryResult<PersonAttributes> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let mut attrs: Vec<(String, HashSet<String>)> = vec![
                (
                    "objectClass".to_string(),
                    schema::PERSON_OBJECT_CLASSES
                        .iter()
                        .map(|c| (*c).to_string())
                        .collect(),
                ),
                (schema::ATTR_UID.to_string(), single(username)),
                (schema::ATTR_CN.to_string(), single(username)),
                (schema::ATTR_SN.to_string(), single(&person.familienname)),
                (schema::ATTR_GIVEN_NAME.to_string(), single(&person.vorname)),
                ("uidNumber".to_string(), single(schema::POSIX_SENTINEL_ID)),
                ("gidNumber".to_string(), single(schema::POSIX_SENTINEL_ID)),
                (
                    "homeDirectory".to_string(),
                    single(&format!("/home/{username}")),
                ),
            ];
            if let Some(address) = mail {
                attrs.push((schema::ATTR_MAIL_PRIMARY.to_string(), single(address)));
            }

            let result = ldap.add(dn, attrs).await.map_err(|e| DirectoryError::Create {
                dn: dn.to_string(),
                message: e.to_string(),
            })?;

            if result.rc == RC_ALREADY_EXISTS {
                debug!(dn = %dn, "Teacher entry already exists, treating create as success");
            } else if result.rc != 0 {
                return Err(DirectoryError::Create {
                    dn: dn.to_string(),
                    message: format!("code {}: {}", result.rc, result.text),
                });
            } else {
                info!(dn = %dn, "Created teacher entry");
            }

            // Re-read so the caller can persist the entryUUID.
            let mut attributes = self
                .read_entry(&mut ldap, dn, {
                    let mut a: Vec<&str> = schema::PERSON_ATTRIBUTES.to_vec();
                    a.push(schema::ATTR_ENTRY_UUID);
                    a
                }, "person")
                .await?
                .map(|e| PersonAttributes::from_entry(&e))
                .ok_or_else(|| DirectoryError::search("person", format!("entry vanished after create: {dn}")))?;
            attributes.dn = dn.to_string();
            Ok(attributes)
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Apply the supplied name attributes and, on a username change, rename
    /// the entry and rewrite its group membership DNs best-effort.
    ///
    /// Per-group rewrite failures end up in the returned report; the rename
    /// itself succeeds independently of them.
    #[instrument(skip(self))]
    pub async fn rename_or_update_attributes(
        &self,
        old_username: &str,
        new_given_name: Option<&str>,
        new_surname: Option<&str>,
        new_username: Option<&str>,
    ) -> DirectoryResult<RenameReport> {
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| {
                self.rename_or_update_once(old_username, new_given_name, new_surname, new_username)
            })
            .await
    }

    async fn rename_or_update_once(
        &self,
        old_username: &str,
        new_given_name: Option<&str>,
        new_surname: Option<&str>,
        new_username: Option<&str>,
    ) -> DirectoryResult<RenameReport> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let entry = self
                .find_person(&mut ldap, &self.config.base_dn, old_username)
                .await?
                .ok_or_else(|| {
                    DirectoryError::search("person", format!("no entry for uid {old_username}"))
                })?;
            let old_dn = entry.dn.clone();

            let rename_target = new_username.filter(|u| *u != old_username);

            let mut mods: Vec<Mod<String>> = Vec::new();
            if let Some(given_name) = new_given_name {
                mods.push(Mod::Replace(
                    schema::ATTR_GIVEN_NAME.to_string(),
                    single(given_name),
                ));
            }
            if let Some(surname) = new_surname {
                mods.push(Mod::Replace(schema::ATTR_SN.to_string(), single(surname)));
            }
            if let Some(username) = rename_target {
                // cn mirrors the username.
                mods.push(Mod::Replace(schema::ATTR_CN.to_string(), single(username)));
            }

            if !mods.is_empty() {
                let result = ldap.modify(&old_dn, mods).await.map_err(|e| {
                    DirectoryError::Rename {
                        dn: old_dn.clone(),
                        message: e.to_string(),
                    }
                })?;
                if result.rc != 0 {
                    return Err(DirectoryError::Rename {
                        dn: old_dn.clone(),
                        message: format!("code {}: {}", result.rc, result.text),
                    });
                }
            }

            let Some(username) = rename_target else {
                return Ok(RenameReport {
                    username: old_username.to_string(),
                    rewritten_groups: 0,
                    failed_groups: Vec::new(),
                });
            };

            let new_rdn = format!("uid={}", escape_dn_value(username));
            let result = ldap
                .modifydn(&old_dn, &new_rdn, true, None)
                .await
                .map_err(|e| DirectoryError::Rename {
                    dn: old_dn.clone(),
                    message: e.to_string(),
                })?;
            if result.rc != 0 {
                return Err(DirectoryError::Rename {
                    dn: old_dn.clone(),
                    message: format!("code {}: {}", result.rc, result.text),
                });
            }

            let new_dn = replace_leading_rdn(&old_dn, &new_rdn);
            info!(old_dn = %old_dn, new_dn = %new_dn, "Renamed person entry");

            // Best-effort fan-out: rewrite the member value in every group
            // still listing the old DN. Per-group failures never abort the
            // rename, which has already happened.
            let groups = self.groups_for_member_with(&mut ldap, &old_dn).await?;
            let mut report = RenameReport {
                username: username.to_string(),
                rewritten_groups: 0,
                failed_groups: Vec::new(),
            };
            for group_dn in &groups {
                let mods = vec![
                    Mod::Delete(schema::ATTR_MEMBER.to_string(), single(&old_dn)),
                    Mod::Add(schema::ATTR_MEMBER.to_string(), single(&new_dn)),
                ];
                match ldap.modify(group_dn, mods).await {
                    Ok(result) if result.rc == 0 => {
                        debug!(group = %group_dn, "Rewrote member DN after rename");
                        report.rewritten_groups += 1;
                    }
                    Ok(result) => {
                        warn!(
                            group = %group_dn,
                            code = result.rc,
                            message = %result.text,
                            "Could not rewrite member DN after rename"
                        );
                        report.failed_groups.push(group_dn.clone());
                    }
                    Err(e) => {
                        warn!(group = %group_dn, error = %e, "Could not rewrite member DN after rename");
                        report.failed_groups.push(group_dn.clone());
                    }
                }
            }
            if !report.failed_groups.is_empty() {
                warn!(
                    groups = groups.len(),
                    failed = report.failed_groups.len(),
                    "Member DN rewrite completed with failures"
                );
            }

            Ok(report)
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    async fn change_primary_email_once(
        &self,
        username: &str,
        root: &str,
        address: &str,
        alternative: Option<&str>,
    ) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let dn = person_dn(username, root, &self.config.base_dn);

            let mut mods: Vec<Mod<String>> = vec![Mod::Replace(
                schema::ATTR_MAIL_PRIMARY.to_string(),
                single(address),
            )];
            if let Some(alt) = alternative {
                mods.push(Mod::Replace(
                    schema::ATTR_MAIL_ALTERNATIVE.to_string(),
                    single(alt),
                ));
            }

            let result = ldap.modify(&dn, mods).await.map_err(|e| {
                DirectoryError::ModifyEmail {
                    dn: dn.clone(),
                    message: e.to_string(),
                }
            })?;
            if result.rc != 0 {
                return Err(DirectoryError::ModifyEmail {
                    dn,
                    message: format!("code {}: {}", result.rc, result.text),
                });
            }

            info!(uid = %username, "Changed primary email address");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Remove one value from the alternative-address attribute. A value not
    /// present is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_alternative_email(
        &self,
        username: &str,
        domain: &str,
        address: &str,
    ) -> DirectoryResult<()> {
        let root = self.config.resolve_root(domain)?;
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.remove_alternative_email_once(username, root, address))
            .await
    }

    async fn remove_alternative_email_once(
        &self,
        username: &str,
        root: &str,
        address: &str,
    ) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let dn = person_dn(username, root, &self.config.base_dn);
            let entry = self
                .read_entry(&mut ldap, &dn, vec![schema::ATTR_MAIL_ALTERNATIVE], "person")
                .await?
                .ok_or_else(|| {
                    DirectoryError::search("person", format!("no entry for uid {username}"))
                })?;

            let values = normalize_values(&entry, schema::ATTR_MAIL_ALTERNATIVE);
            if !values.iter().any(|v| v == address) {
                debug!(uid = %username, "Alternative address not present, nothing to remove");
                return Ok(());
            }

            let mods = vec![Mod::Delete(
                schema::ATTR_MAIL_ALTERNATIVE.to_string(),
                single(address),
            )];
            let result = ldap.modify(&dn, mods).await.map_err(|e| {
                DirectoryError::ModifyEmail {
                    dn: dn.clone(),
                    message: e.to_string(),
                }
            })?;
            if result.rc != 0 {
                return Err(DirectoryError::ModifyEmail {
                    dn,
                    message: format!("code {}: {}", result.rc, result.text),
                });
            }

            info!(uid = %username, "Removed alternative email address");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Replace the password and publish a reset event.
    #[instrument(skip(self, password))]
    pub async fn reset_password(
        &self,
        person_id: PersonId,
        username: &str,
        domain: &str,
        password: &str,
    ) -> DirectoryResult<PersonId> {
        let root = self.config.resolve_root(domain)?;
        {
            let _guard = self.locks.general().await;
            self.retry
                .execute(|| self.reset_password_once(username, root, password))
                .await?;
        }

        let event = SyncEvent::PasswordReset {
            person_id,
            username: username.to_string(),
        };
        self.publisher.publish(event.clone(), event).await;

        Ok(person_id)
    }

    async fn reset_password_once(
        &self,
        username: &str,
        root: &str,
        password: &str,
    ) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let dn = person_dn(username, root, &self.config.base_dn);
            let mods = vec![Mod::Replace(
                schema::ATTR_USER_PASSWORD.to_string(),
                single(password),
            )];

            let result = ldap.modify(&dn, mods).await.map_err(|e| {
                DirectoryError::ModifyPassword {
                    dn: dn.clone(),
                    message: e.to_string(),
                }
            })?;
            if result.rc != 0 {
                return Err(DirectoryError::ModifyPassword {
                    dn,
                    message: format!("code {}: {}", result.rc, result.text),
                });
            }

            info!(uid = %username, "Password reset");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Delete a teacher entry located by username anywhere under the base DN.
    #[instrument(skip(self))]
    pub async fn delete_teacher_by_username(&self, username: &str) -> DirectoryResult<()> {
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.delete_teacher_by_username_once(username))
            .await
    }

    async fn delete_teacher_by_username_once(&self, username: &str) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let entry = self
                .find_person(&mut ldap, &self.config.base_dn, username)
                .await?
                .ok_or_else(|| {
                    DirectoryError::search("person", format!("no entry for uid {username}"))
                })?;

            self.delete_dn(&mut ldap, &entry.dn, false).await?;
            info!(uid = %username, dn = %entry.dn, "Deleted teacher entry");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Delete a teacher entry at its canonical DN.
    #[instrument(skip(self))]
    pub async fn delete_teacher_entry(&self, username: &str, domain: &str) -> DirectoryResult<()> {
        let root = self.config.resolve_root(domain)?;
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.delete_teacher_entry_once(username, root))
            .await
    }

    async fn delete_teacher_entry_once(&self, username: &str, root: &str) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let dn = person_dn(username, root, &self.config.base_dn);
            self.delete_dn(&mut ldap, &dn, false).await?;
            info!(dn = %dn, "Deleted teacher entry");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Delete a school's group, `groups` container and organisational unit.
    ///
    /// Absent entries count as deleted; the whole operation is idempotent.
    #[instrument(skip(self))]
    pub async fn delete_organisation_containers(&self, kennung: &str) -> DirectoryResult<()> {
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.delete_organisation_containers_once(kennung))
            .await
    }

    async fn delete_organisation_containers_once(&self, kennung: &str) -> DirectoryResult<()> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            // Deepest first so the parents are empty when their turn comes.
            let targets = [
                teacher_group_dn(kennung, &self.config.base_dn),
                groups_container_dn(kennung, &self.config.base_dn),
                school_ou_dn(kennung, &self.config.base_dn),
            ];

            for dn in &targets {
                self.delete_dn(&mut ldap, dn, true).await.map_err(|e| {
                    DirectoryError::DeleteOrganisation {
                        kennung: kennung.to_string(),
                        message: e.to_string(),
                    }
                })?;
            }

            info!(kennung = %kennung, "Deleted organisation containers");
            Ok(())
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    /// Delete one entry. With `absent_ok`, `noSuchObject` counts as success.
    async fn delete_dn(
        &self,
        ldap: &mut Ldap,
        dn: &str,
        absent_ok: bool,
    ) -> DirectoryResult<()> {
        let result = ldap.delete(dn).await.map_err(|e| DirectoryError::Delete {
            dn: dn.to_string(),
            message: e.to_string(),
        })?;

        if result.rc == RC_NO_SUCH_OBJECT && absent_ok {
            debug!(dn = %dn, "Entry already absent, treating delete as success");
            return Ok(());
        }
        if result.rc != 0 {
            return Err(DirectoryError::Delete {
                dn: dn.to_string(),
                message: format!("code {}: {}", result.rc, result.text),
            });
        }
        Ok(())
    }

    /// Ensure a container entry exists, creating it when absent.
    async fn ensure_container(
        &self,
        ldap: &mut Ldap,
        dn: &str,
        object_class: &str,
        naming_attribute: &str,
        naming_value: &str,
    ) -> DirectoryResult<()> {
        if self
            .read_entry(ldap, dn, vec!["1.1"], "container")
            .await?
            .is_some()
        {
            return Ok(());
        }

        let attrs: Vec<(String, HashSet<String>)> = vec![
            ("objectClass".to_string(), single(object_class)),
            (naming_attribute.to_string(), single(naming_value)),
        ];

        let result = ldap.add(dn, attrs).await.map_err(|e| DirectoryError::Create {
            dn: dn.to_string(),
            message: e.to_string(),
        })?;

        // A concurrent creator winning the race is fine.
        if result.rc != 0 && result.rc != RC_ALREADY_EXISTS {
            return Err(DirectoryError::Create {
                dn: dn.to_string(),
                message: format!("code {}: {}", result.rc, result.text),
            });
        }

        debug!(dn = %dn, "Created container entry");
        Ok(())
    }

    async fn add_person_to_group_once(
        &self,
        person_uid: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let base = &self.config.base_dn;
            let ou_dn = school_ou_dn(kennung, base);
            let container_dn = groups_container_dn(kennung, base);
            let group_dn = teacher_group_dn(kennung, base);

            self.ensure_container(&mut ldap, &ou_dn, schema::OU_OBJECT_CLASS, "ou", kennung)
                .await?;
            self.ensure_container(
                &mut ldap,
                &container_dn,
                schema::ROLE_OBJECT_CLASS,
                "cn",
                "groups",
            )
            .await?;

            let group = self
                .read_entry(&mut ldap, &group_dn, vec![schema::ATTR_MEMBER], "group")
                .await?;
            let members = group
                .as_ref()
                .map(|g| normalize_values(g, schema::ATTR_MEMBER));

            match plan_member_addition(members.as_deref(), member_dn) {
                AdditionStep::CreateGroupWithMember => {
                    let attrs: Vec<(String, HashSet<String>)> = vec![
                        ("objectClass".to_string(), single(schema::GROUP_OBJECT_CLASS)),
                        (schema::ATTR_CN.to_string(), single(&teacher_group_cn(kennung))),
                        (schema::ATTR_MEMBER.to_string(), single(member_dn)),
                    ];
                    let result = ldap.add(&group_dn, attrs).await.map_err(|e| {
                        DirectoryError::AddToGroup {
                            group: group_dn.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    if result.rc != 0 && result.rc != RC_ALREADY_EXISTS {
                        return Err(DirectoryError::AddToGroup {
                            group: group_dn.clone(),
                            message: format!("code {}: {}", result.rc, result.text),
                        });
                    }
                    info!(uid = %person_uid, group = %group_dn, "Created group with first member");
                    Ok(true)
                }
                AdditionStep::AlreadyMember => {
                    debug!(uid = %person_uid, group = %group_dn, "Member already present");
                    Ok(false)
                }
                AdditionStep::AddValue => {
                    let mods = vec![Mod::Add(schema::ATTR_MEMBER.to_string(), single(member_dn))];
                    let result = ldap.modify(&group_dn, mods).await.map_err(|e| {
                        DirectoryError::AddToGroup {
                            group: group_dn.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    if result.rc != 0 {
                        return Err(DirectoryError::AddToGroup {
                            group: group_dn,
                            message: format!("code {}: {}", result.rc, result.text),
                        });
                    }
                    info!(uid = %person_uid, group = %group_dn, "Added member to group");
                    Ok(true)
                }
            }
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    async fn remove_person_from_group_once(
        &self,
        username: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        let mut ldap = self.connect().await?;

        let outcome = async {
            let group_dn = teacher_group_dn(kennung, &self.config.base_dn);

            let group = self
                .read_entry(&mut ldap, &group_dn, vec![schema::ATTR_MEMBER], "group")
                .await?;
            let members = group
                .as_ref()
                .map(|g| normalize_values(g, schema::ATTR_MEMBER));

            match plan_member_removal(members.as_deref(), member_dn) {
                RemovalStep::GroupAbsent => {
                    debug!(group = %group_dn, "Group absent, nothing to remove");
                    Ok(false)
                }
                RemovalStep::NotAMember => {
                    debug!(uid = %username, group = %group_dn, "Member not present, nothing to remove");
                    Ok(false)
                }
                RemovalStep::DeleteGroup => {
                    self.delete_dn(&mut ldap, &group_dn, false)
                        .await
                        .map_err(|e| DirectoryError::RemoveFromGroup {
                            group: group_dn.clone(),
                            message: e.to_string(),
                        })?;
                    info!(uid = %username, group = %group_dn, "Removed sole member and deleted group");
                    Ok(true)
                }
                RemovalStep::RemoveValue => {
                    let mods =
                        vec![Mod::Delete(schema::ATTR_MEMBER.to_string(), single(member_dn))];
                    let result = ldap.modify(&group_dn, mods).await.map_err(|e| {
                        DirectoryError::RemoveFromGroup {
                            group: group_dn.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    if result.rc != 0 {
                        return Err(DirectoryError::RemoveFromGroup {
                            group: group_dn,
                            message: format!("code {}: {}", result.rc, result.text),
                        });
                    }
                    info!(uid = %username, group = %group_dn, "Removed member from group");
                    Ok(true)
                }
            }
        }
        .await;

        Self::release(ldap).await;
        outcome
    }

    async fn groups_for_member_once(&self, member_dn: &str) -> DirectoryResult<Vec<String>> {
        let mut ldap = self.connect().await?;
        let outcome = self.groups_for_member_with(&mut ldap, member_dn).await;
        Self::release(ldap).await;
        outcome
    }

    async fn groups_for_member_with(
        &self,
        ldap: &mut Ldap,
        member_dn: &str,
    ) -> DirectoryResult<Vec<String>> {
        let filter = format!(
            "(&(objectClass={})({}={}))",
            schema::GROUP_OBJECT_CLASS,
            schema::ATTR_MEMBER,
            escape_filter_value(member_dn)
        );

        let search = ldap
            .search(&self.config.base_dn, Scope::Subtree, &filter, vec!["1.1"])
            .await
            .map_err(|e| DirectoryError::transport(format!("member search failed: {e}")))?;

        let (entries, result) = (search.0, search.1);
        if result.rc != 0 && result.rc != RC_NO_SUCH_OBJECT {
            return Err(DirectoryError::transport(format!(
                "member search failed with code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(entries
            .into_iter()
            .map(|e| SearchEntry::construct(e).dn)
            .collect())
    }
}

#[async_trait]
impl DirectoryOps for DirectoryGateway {
    #[instrument(skip(self), fields(person_id = %person_id))]
    async fn fetch_attributes(
        &self,
        person_id: PersonId,
        username: &str,
        domain: &str,
    ) -> DirectoryResult<PersonAttributes> {
        let _guard = self.locks.general().await;
        self.retry
            .execute(|| self.fetch_attributes_once(username, domain))
            .await
    }

    #[instrument(skip(self, address, alternative), fields(person_id = %person_id))]
    async fn change_primary_email(
        &self,
        person_id: PersonId,
        username: &str,
        address: &str,
        alternative: Option<&str>,
    ) -> DirectoryResult<PersonId> {
        // Fail closed before touching the wire: an address without a domain
        // part can never be routed to an organisational-unit root.
        let domain = mail_domain(address).ok_or_else(|| DirectoryError::EmailDomain {
            domain: address.to_string(),
        })?;
        let root = self.config.resolve_root(domain)?;

        {
            let _guard = self.locks.general().await;
            self.retry
                .execute(|| self.change_primary_email_once(username, root, address, alternative))
                .await?;
        }

        let event = SyncEvent::EmailAddressChanged {
            person_id,
            username: username.to_string(),
            primary_address: address.to_string(),
            alternative_address: alternative.map(str::to_string),
        };
        self.publisher.publish(event.clone(), event).await;

        Ok(person_id)
    }

    #[instrument(skip(self, member_dn))]
    async fn add_person_to_group(
        &self,
        person_uid: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        let _guard = self.locks.group_add().await;
        self.retry
            .execute(|| self.add_person_to_group_once(person_uid, kennung, member_dn))
            .await
    }

    #[instrument(skip(self, member_dn))]
    async fn remove_person_from_group(
        &self,
        username: &str,
        kennung: &str,
        member_dn: &str,
    ) -> DirectoryResult<bool> {
        let _guard = self.locks.group_remove().await;
        self.retry
            .execute(|| self.remove_person_from_group_once(username, kennung, member_dn))
            .await
    }

    async fn groups_for_member(&self, member_dn: &str) -> DirectoryResult<Vec<String>> {
        self.retry
            .execute(|| self.groups_for_member_once(member_dn))
            .await
    }
}

/// Single-value attribute set for add/modify calls.
fn single(value: &str) -> HashSet<String> {
    HashSet::from([value.to_string()])
}

/// Attribute set of a placeholder person entry. Name attributes carry the
/// sentinel value until real data arrives.
fn placeholder_attributes(username: &str) -> Vec<(String, HashSet<String>)> {
    vec![
        (
            "objectClass".to_string(),
            schema::PERSON_OBJECT_CLASSES
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        ),
        (schema::ATTR_UID.to_string(), single(username)),
        (schema::ATTR_CN.to_string(), single(schema::PLACEHOLDER_VALUE)),
        (schema::ATTR_SN.to_string(), single(schema::PLACEHOLDER_VALUE)),
        (
            schema::ATTR_GIVEN_NAME.to_string(),
            single(schema::PLACEHOLDER_VALUE),
        ),
        ("uidNumber".to_string(), single(schema::POSIX_SENTINEL_ID)),
        ("gidNumber".to_string(), single(schema::POSIX_SENTINEL_ID)),
        (
            "homeDirectory".to_string(),
            single(&format!("/home/{username}")),
        ),
    ]
}

/// Swap the leading RDN of a DN, keeping the parent path.
fn replace_leading_rdn(dn: &str, new_rdn: &str) -> String {
    match dn.split_once(',') {
        Some((_, parent)) => format!("{new_rdn},{parent}"),
        None => new_rdn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schulsync_core::SyncEvent;

    struct NullPublisher;

    #[async_trait]
    impl EventPublisher for NullPublisher {
        async fn publish(&self, _local: SyncEvent, _integration: SyncEvent) {}
    }

    fn test_config() -> DirectoryConfig {
        DirectoryConfig {
            url: "ldap://localhost:389".to_string(),
            bind_dn: "cn=admin,dc=schule-sh,dc=de".to_string(),
            admin_password: "secret".to_string(),
            base_dn: "dc=schule-sh,dc=de".to_string(),
            oeffentliche_schulen_domain: "schule-sh.de".to_string(),
            ersatzschulen_domain: "ersatzschule-sh.de".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1,
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = test_config();
        config.base_dn.clear();
        let result = DirectoryGateway::new(config, Arc::new(NullPublisher));
        assert!(matches!(
            result,
            Err(DirectoryError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_new_accepts_valid_config() {
        assert!(DirectoryGateway::new(test_config(), Arc::new(NullPublisher)).is_ok());
    }

    #[test]
    fn test_placeholder_sentinels_survive_a_read_back() {
        // What a later fetch sees is exactly what provisioning stored.
        let entry = SearchEntry {
            dn: "uid=mmuster,ou=oeffentlicheSchulen,dc=schule-sh,dc=de".to_string(),
            attrs: placeholder_attributes("mmuster")
                .into_iter()
                .map(|(name, values)| (name, values.into_iter().collect::<Vec<_>>()))
                .collect(),
            bin_attrs: Default::default(),
        };

        let read = PersonAttributes::from_entry(&entry);
        assert_eq!(read.uid.as_deref(), Some("mmuster"));
        assert_eq!(read.cn.as_deref(), Some(schema::PLACEHOLDER_VALUE));
        assert_eq!(read.given_name.as_deref(), Some(schema::PLACEHOLDER_VALUE));
        assert_eq!(read.surname.as_deref(), Some(schema::PLACEHOLDER_VALUE));
        assert_eq!(read.mail_primary_address, None);
        assert_eq!(read.mail_alternative_address, None);
    }

    #[test]
    fn test_replace_leading_rdn() {
        assert_eq!(
            replace_leading_rdn(
                "uid=old,ou=oeffentlicheSchulen,dc=schule-sh,dc=de",
                "uid=new"
            ),
            "uid=new,ou=oeffentlicheSchulen,dc=schule-sh,dc=de"
        );
        assert_eq!(replace_leading_rdn("uid=old", "uid=new"), "uid=new");
    }
}
