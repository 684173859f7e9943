//! Group membership mutation planning.
//!
//! The branching over a group's normalized member list is pure so the
//! idempotence and sole-member rules can be checked without a directory.
//! The gateway reads the member list and executes the returned step.

/// What adding a member to a teacher group amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionStep {
    /// The group does not exist yet; it is created with this member riding
    /// along, since the group object class demands at least one member.
    CreateGroupWithMember,
    /// Append the member value to the existing group.
    AddValue,
    /// The member is already listed; nothing to do.
    AlreadyMember,
}

/// Decide the addition step. `members` is `None` when the group is absent.
#[must_use]
pub fn plan_member_addition(members: Option<&[String]>, member_dn: &str) -> AdditionStep {
    let Some(members) = members else {
        return AdditionStep::CreateGroupWithMember;
    };
    if members.iter().any(|m| m == member_dn) {
        AdditionStep::AlreadyMember
    } else {
        AdditionStep::AddValue
    }
}

/// What removing a member from a teacher group amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalStep {
    /// The group does not exist; nothing to remove.
    GroupAbsent,
    /// The member is not listed; nothing to remove.
    NotAMember,
    /// Remove just this member value.
    RemoveValue,
    /// The member is the last one; the group goes with it, an empty member
    /// list would violate the group object class.
    DeleteGroup,
}

/// Decide the removal step. `members` is `None` when the group is absent.
#[must_use]
pub fn plan_member_removal(members: Option<&[String]>, member_dn: &str) -> RemovalStep {
    let Some(members) = members else {
        return RemovalStep::GroupAbsent;
    };
    if !members.iter().any(|m| m == member_dn) {
        return RemovalStep::NotAMember;
    }
    if members.len() == 1 {
        RemovalStep::DeleteGroup
    } else {
        RemovalStep::RemoveValue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER: &str = "uid=mmuster,ou=oeffentlicheSchulen,dc=schule-sh,dc=de";
    const OTHER: &str = "uid=other,ou=oeffentlicheSchulen,dc=schule-sh,dc=de";

    fn members(dns: &[&str]) -> Vec<String> {
        dns.iter().map(|d| (*d).to_string()).collect()
    }

    #[test]
    fn test_add_to_absent_group_creates_with_member() {
        assert_eq!(
            plan_member_addition(None, MEMBER),
            AdditionStep::CreateGroupWithMember
        );
    }

    #[test]
    fn test_add_appends_to_existing_group() {
        let existing = members(&[OTHER]);
        assert_eq!(
            plan_member_addition(Some(&existing), MEMBER),
            AdditionStep::AddValue
        );
    }

    #[test]
    fn test_repeated_add_reports_unchanged() {
        let existing = members(&[OTHER, MEMBER]);
        assert_eq!(
            plan_member_addition(Some(&existing), MEMBER),
            AdditionStep::AlreadyMember
        );
    }

    #[test]
    fn test_remove_from_absent_group_reports_unchanged() {
        assert_eq!(plan_member_removal(None, MEMBER), RemovalStep::GroupAbsent);
    }

    #[test]
    fn test_remove_non_member_reports_unchanged() {
        let existing = members(&[OTHER]);
        assert_eq!(
            plan_member_removal(Some(&existing), MEMBER),
            RemovalStep::NotAMember
        );
    }

    #[test]
    fn test_remove_sole_member_deletes_group() {
        let existing = members(&[MEMBER]);
        assert_eq!(
            plan_member_removal(Some(&existing), MEMBER),
            RemovalStep::DeleteGroup
        );
    }

    #[test]
    fn test_remove_one_of_many_keeps_group() {
        let existing = members(&[MEMBER, OTHER]);
        assert_eq!(
            plan_member_removal(Some(&existing), MEMBER),
            RemovalStep::RemoveValue
        );
    }
}
