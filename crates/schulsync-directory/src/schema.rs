//! Directory schema conventions.
//!
//! The directory layout this engine depends on is fixed: attribute names,
//! object classes and the POSIX sentinel values are compile-time constants,
//! not discovered at runtime.

/// Login handle; joins the directory entry to the relational person.
pub const ATTR_UID: &str = "uid";
/// Common name; mirrors the username.
pub const ATTR_CN: &str = "cn";
/// Surname.
pub const ATTR_SN: &str = "sn";
/// Given name.
pub const ATTR_GIVEN_NAME: &str = "givenName";
/// Primary mail address.
pub const ATTR_MAIL_PRIMARY: &str = "mailPrimaryAddress";
/// Alternative mail address.
pub const ATTR_MAIL_ALTERNATIVE: &str = "mailAlternativeAddress";
/// Password, write-only.
pub const ATTR_USER_PASSWORD: &str = "userPassword";
/// Group member DN list.
pub const ATTR_MEMBER: &str = "member";
/// Directory-assigned stable identifier, read-only.
pub const ATTR_ENTRY_UUID: &str = "entryUUID";

/// Object classes of a person entry.
pub const PERSON_OBJECT_CLASSES: [&str; 3] =
    ["inetOrgPerson", "univentionMail", "posixAccount"];

/// Object class of a teacher group.
pub const GROUP_OBJECT_CLASS: &str = "groupOfNames";

/// Object class of a school organisational unit.
pub const OU_OBJECT_CLASS: &str = "organizationalUnit";

/// Object class of the `groups` role container under a school OU.
pub const ROLE_OBJECT_CLASS: &str = "organizationalRole";

/// Placeholder value for name attributes of lazily provisioned entries.
pub const PLACEHOLDER_VALUE: &str = "empty";

/// POSIX uidNumber/gidNumber; unused downstream, pinned to one sentinel.
pub const POSIX_SENTINEL_ID: &str = "503";

/// The six canonical attributes read for a person entry.
pub const PERSON_ATTRIBUTES: [&str; 6] = [
    ATTR_UID,
    ATTR_CN,
    ATTR_GIVEN_NAME,
    ATTR_SN,
    ATTR_MAIL_PRIMARY,
    ATTR_MAIL_ALTERNATIVE,
];
