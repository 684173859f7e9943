//! Group membership reconciliation.
//!
//! Desired state is the set of kennungs from active LEHR memberships at
//! schools; actual state is the set of kennungs parsed out of the group DNs
//! the person currently belongs to. Missing memberships are repaired; orphans
//! are flagged but never removed; DNs outside the group grammar are skipped
//! without mutation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use schulsync_directory::dn::parse_teacher_group_kennung;
use schulsync_directory::{DirectoryOps, DirectoryResult};

/// Diff between desired and actual group memberships.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    /// Kennungs the person should be a member for but is not.
    pub missing: Vec<String>,
    /// Kennungs of well-formed groups with no matching active membership.
    pub orphaned: Vec<String>,
    /// Group DNs that do not match the group grammar.
    pub malformed: Vec<String>,
}

/// Compute the membership diff. Pure; no directory access.
#[must_use]
pub fn plan_memberships(desired: &BTreeSet<String>, actual_group_dns: &[String]) -> MembershipPlan {
    let mut plan = MembershipPlan::default();
    let mut actual: BTreeSet<String> = BTreeSet::new();

    for dn in actual_group_dns {
        match parse_teacher_group_kennung(dn) {
            Some(kennung) => {
                if !desired.contains(&kennung) {
                    plan.orphaned.push(kennung.clone());
                }
                actual.insert(kennung);
            }
            None => plan.malformed.push(dn.clone()),
        }
    }

    plan.missing = desired.difference(&actual).cloned().collect();
    plan
}

/// Executes a [`MembershipPlan`] against the directory.
pub struct GroupMembershipReconciler {
    directory: Arc<dyn DirectoryOps>,
}

impl GroupMembershipReconciler {
    pub fn new(directory: Arc<dyn DirectoryOps>) -> Self {
        Self { directory }
    }

    /// Reconcile one person's group memberships.
    ///
    /// Returns the number of memberships actually added.
    #[instrument(skip(self, desired), fields(uid = %username))]
    pub async fn reconcile(
        &self,
        username: &str,
        member_dn: &str,
        desired: &BTreeSet<String>,
    ) -> DirectoryResult<usize> {
        let actual = self.directory.groups_for_member(member_dn).await?;
        let plan = plan_memberships(desired, &actual);

        for dn in &plan.malformed {
            warn!(group = %dn, "Group DN does not match the expected grammar, skipping");
        }
        for kennung in &plan.orphaned {
            warn!(kennung = %kennung, "Orphan membership detected, leaving untouched");
        }

        let mut added = 0usize;
        for kennung in &plan.missing {
            if self
                .directory
                .add_person_to_group(username, kennung, member_dn)
                .await?
            {
                info!(kennung = %kennung, "Added missing membership");
                added += 1;
            }
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "dc=schule-sh,dc=de";

    fn desired(kennungs: &[&str]) -> BTreeSet<String> {
        kennungs.iter().map(|k| (*k).to_string()).collect()
    }

    fn group_dn(kennung: &str) -> String {
        format!("cn=lehrer-{kennung},cn=groups,ou={kennung},{BASE}")
    }

    #[test]
    fn test_single_missing_membership() {
        let plan = plan_memberships(&desired(&["1234567"]), &[]);
        assert_eq!(plan.missing, vec!["1234567".to_string()]);
        assert!(plan.orphaned.is_empty());
        assert!(plan.malformed.is_empty());
    }

    #[test]
    fn test_membership_in_sync() {
        let plan = plan_memberships(&desired(&["1234567"]), &[group_dn("1234567")]);
        assert_eq!(plan, MembershipPlan::default());
    }

    #[test]
    fn test_orphan_detected_not_missing() {
        let plan = plan_memberships(&desired(&["1234567"]), &[group_dn("9999999")]);
        assert_eq!(plan.missing, vec!["1234567".to_string()]);
        assert_eq!(plan.orphaned, vec!["9999999".to_string()]);
    }

    #[test]
    fn test_malformed_dn_skipped_others_proceed() {
        let actual = vec![
            "cn=admins,ou=1234567,dc=schule-sh,dc=de".to_string(),
            group_dn("1234567"),
        ];
        let plan = plan_memberships(&desired(&["1234567", "7654321"]), &actual);
        assert_eq!(plan.missing, vec!["7654321".to_string()]);
        assert!(plan.orphaned.is_empty());
        assert_eq!(
            plan.malformed,
            vec!["cn=admins,ou=1234567,dc=schule-sh,dc=de".to_string()]
        );
    }

    #[test]
    fn test_missing_is_sorted_and_deduplicated() {
        let plan = plan_memberships(&desired(&["b", "a"]), &[]);
        assert_eq!(plan.missing, vec!["a".to_string(), "b".to_string()]);
    }
}
