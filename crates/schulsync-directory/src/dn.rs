//! Distinguished-name construction and parsing.
//!
//! All DNs this engine writes follow two fixed grammars:
//! - person entries: `uid=<username>,ou=<root>,<base>`
//! - teacher groups: `cn=lehrer-<kennung>,cn=groups,ou=<kennung>,<base>`
//!
//! [`parse_teacher_group_kennung`] is the exact left inverse of
//! [`teacher_group_dn`] for every well-formed kennung; anything that does not
//! match the grammar parses to `None` and must never be mutated.

/// Prefix of teacher group common names.
const TEACHER_GROUP_PREFIX: &str = "lehrer-";

/// DN of a person entry under an organisational-unit root.
#[must_use]
pub fn person_dn(username: &str, root_ou: &str, base_dn: &str) -> String {
    format!("uid={},ou={},{}", escape_dn_value(username), root_ou, base_dn)
}

/// DN of a school's organisational unit.
#[must_use]
pub fn school_ou_dn(kennung: &str, base_dn: &str) -> String {
    format!("ou={},{}", escape_dn_value(kennung), base_dn)
}

/// DN of the `groups` role container under a school's organisational unit.
#[must_use]
pub fn groups_container_dn(kennung: &str, base_dn: &str) -> String {
    format!("cn=groups,{}", school_ou_dn(kennung, base_dn))
}

/// DN of the teacher group for a school.
#[must_use]
pub fn teacher_group_dn(kennung: &str, base_dn: &str) -> String {
    format!(
        "cn={}{},{}",
        TEACHER_GROUP_PREFIX,
        escape_dn_value(kennung),
        groups_container_dn(kennung, base_dn)
    )
}

/// Relative DN of the teacher group entry.
#[must_use]
pub fn teacher_group_cn(kennung: &str) -> String {
    format!("{TEACHER_GROUP_PREFIX}{kennung}")
}

/// Parse the kennung out of a teacher group DN.
///
/// Returns `None` unless the DN matches
/// `cn=lehrer-<k>,cn=groups,ou=<k>,…` with the same non-empty `<k>` in both
/// positions. Attribute names match case-insensitively, values exactly.
#[must_use]
pub fn parse_teacher_group_kennung(dn: &str) -> Option<String> {
    let mut rdns = dn.splitn(4, ',');

    let group_rdn = rdns.next()?;
    let container_rdn = rdns.next()?;
    let ou_rdn = rdns.next()?;

    let group_cn = strip_attribute(group_rdn, "cn")?;
    let kennung = group_cn.strip_prefix(TEACHER_GROUP_PREFIX)?;

    if !strip_attribute(container_rdn, "cn")?.eq_ignore_ascii_case("groups") {
        return None;
    }

    let ou_kennung = strip_attribute(ou_rdn, "ou")?;
    if kennung.is_empty() || kennung != ou_kennung {
        return None;
    }

    Some(kennung.to_string())
}

/// Strip `attr=` (case-insensitive, surrounding whitespace tolerated) from an
/// RDN and return the value.
fn strip_attribute<'a>(rdn: &'a str, attribute: &str) -> Option<&'a str> {
    let (name, value) = rdn.trim().split_once('=')?;
    if name.trim().eq_ignore_ascii_case(attribute) {
        Some(value.trim())
    } else {
        None
    }
}

/// Escape special characters in DN attribute values per RFC 4514.
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (escaped as \20)
/// - Leading # (escaped as \23)
/// - Characters: , + " \ < > ; = (escaped with backslash prefix)
/// - NUL character (escaped as \00)
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let char_count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i == char_count - 1;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => {
                result.push_str("\\00");
            }
            ' ' if is_first || is_last => {
                result.push_str("\\20");
            }
            '#' if is_first => {
                result.push_str("\\23");
            }
            _ => {
                result.push(ch);
            }
        }
    }

    result
}

/// Escape special characters in filter values per RFC 4515.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "dc=schule-sh,dc=de";

    #[test]
    fn test_person_dn() {
        assert_eq!(
            person_dn("mmuster", "oeffentlicheSchulen", BASE),
            "uid=mmuster,ou=oeffentlicheSchulen,dc=schule-sh,dc=de"
        );
    }

    #[test]
    fn test_teacher_group_dn() {
        assert_eq!(
            teacher_group_dn("1234567", BASE),
            "cn=lehrer-1234567,cn=groups,ou=1234567,dc=schule-sh,dc=de"
        );
    }

    #[test]
    fn test_kennung_round_trip() {
        for kennung in ["1234567", "9999999", "0001", "ABC123"] {
            let dn = teacher_group_dn(kennung, BASE);
            assert_eq!(
                parse_teacher_group_kennung(&dn).as_deref(),
                Some(kennung),
                "round trip failed for {kennung}"
            );
        }
    }

    #[test]
    fn test_parse_tolerates_attribute_case() {
        assert_eq!(
            parse_teacher_group_kennung("CN=lehrer-1234567,CN=groups,OU=1234567,dc=x"),
            Some("1234567".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_foreign_structure() {
        // Not a teacher group at all
        assert_eq!(
            parse_teacher_group_kennung("cn=admins,ou=1234567,dc=schule-sh,dc=de"),
            None
        );
        // Missing the groups container
        assert_eq!(
            parse_teacher_group_kennung("cn=lehrer-1234567,ou=1234567,dc=schule-sh,dc=de"),
            None
        );
        // Kennung mismatch between group and OU
        assert_eq!(
            parse_teacher_group_kennung("cn=lehrer-1234567,cn=groups,ou=7654321,dc=x"),
            None
        );
        // Empty kennung
        assert_eq!(
            parse_teacher_group_kennung("cn=lehrer-,cn=groups,ou=,dc=x"),
            None
        );
        // Garbage
        assert_eq!(parse_teacher_group_kennung("not a dn"), None);
        assert_eq!(parse_teacher_group_kennung(""), None);
    }

    #[test]
    fn test_escape_dn_value_special_chars() {
        assert_eq!(escape_dn_value("a,b"), "a\\,b");
        assert_eq!(escape_dn_value("a+b"), "a\\+b");
        assert_eq!(escape_dn_value("a\\b"), "a\\\\b");
        assert_eq!(escape_dn_value("a=b"), "a\\=b");
        assert_eq!(escape_dn_value(" admin "), "\\20admin\\20");
        assert_eq!(escape_dn_value("#admin"), "\\23admin");
        assert_eq!(escape_dn_value("plain"), "plain");
        assert_eq!(escape_dn_value(""), "");
    }

    #[test]
    fn test_escape_dn_value_injection_attempt() {
        let malicious = "mmuster,dc=evil,dc=com";
        assert_eq!(escape_dn_value(malicious), "mmuster\\,dc\\=evil\\,dc\\=com");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain"), "plain");
        assert_eq!(escape_filter_value("a*b"), "a\\2ab");
        assert_eq!(escape_filter_value("(x)"), "\\28x\\29");
        assert_eq!(escape_filter_value("a\\b"), "a\\5cb");
    }
}
