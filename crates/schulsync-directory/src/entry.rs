//! Search-entry normalization.
//!
//! Directory servers return attribute values as strings or raw bytes, single
//! or multi-valued, in arbitrary order. Everything downstream works on an
//! ordered `Vec<String>` view so that comparisons and counts are stable.

use ldap3::SearchEntry;

use crate::schema;

/// Attribute snapshot of a person entry, as read from the directory.
///
/// `None` means the attribute is absent on the entry. A freshly provisioned
/// placeholder entry carries only `dn` and `entry_uuid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonAttributes {
    pub dn: String,
    pub entry_uuid: Option<String>,
    pub uid: Option<String>,
    pub cn: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub mail_primary_address: Option<String>,
    pub mail_alternative_address: Option<String>,
}

impl PersonAttributes {
    /// Build a snapshot from a raw search entry, reading the canonical person
    /// attributes. Missing attributes map to `None`.
    #[must_use]
    pub fn from_entry(entry: &SearchEntry) -> Self {
        Self {
            dn: entry.dn.clone(),
            entry_uuid: first_value(entry, schema::ATTR_ENTRY_UUID),
            uid: first_value(entry, schema::ATTR_UID),
            cn: first_value(entry, schema::ATTR_CN),
            given_name: first_value(entry, schema::ATTR_GIVEN_NAME),
            surname: first_value(entry, schema::ATTR_SN),
            mail_primary_address: first_value(entry, schema::ATTR_MAIL_PRIMARY),
            mail_alternative_address: first_value(entry, schema::ATTR_MAIL_ALTERNATIVE),
        }
    }
}

/// All values of an attribute in directory order.
///
/// String values come first, then binary values decoded lossily as UTF-8.
/// An absent attribute yields an empty vector.
#[must_use]
pub fn normalize_values(entry: &SearchEntry, attribute: &str) -> Vec<String> {
    let mut values: Vec<String> = entry
        .attrs
        .get(attribute)
        .cloned()
        .unwrap_or_default();

    if let Some(raw) = entry.bin_attrs.get(attribute) {
        values.extend(raw.iter().map(|bytes| String::from_utf8_lossy(bytes).into_owned()));
    }

    values
}

/// First value of an attribute, or `None` when the attribute is absent.
#[must_use]
pub fn first_value(entry: &SearchEntry, attribute: &str) -> Option<String> {
    normalize_values(entry, attribute).into_iter().next()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry_with(
        attrs: Vec<(&str, Vec<&str>)>,
        bin_attrs: Vec<(&str, Vec<&[u8]>)>,
    ) -> SearchEntry {
        SearchEntry {
            dn: "uid=mmuster,ou=oeffentlicheSchulen,dc=schule-sh,dc=de".to_string(),
            attrs: attrs
                .into_iter()
                .map(|(k, vs)| (k.to_string(), vs.into_iter().map(String::from).collect()))
                .collect(),
            bin_attrs: bin_attrs
                .into_iter()
                .map(|(k, vs)| (k.to_string(), vs.into_iter().map(<[u8]>::to_vec).collect()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_normalize_scalar_and_list() {
        let entry = entry_with(
            vec![("member", vec!["uid=a,dc=x", "uid=b,dc=x"]), ("uid", vec!["mmuster"])],
            vec![],
        );
        assert_eq!(
            normalize_values(&entry, "member"),
            vec!["uid=a,dc=x".to_string(), "uid=b,dc=x".to_string()]
        );
        assert_eq!(normalize_values(&entry, "uid"), vec!["mmuster".to_string()]);
    }

    #[test]
    fn test_normalize_binary_values() {
        let entry = entry_with(vec![], vec![("member", vec![b"uid=c,dc=x".as_slice()])]);
        assert_eq!(normalize_values(&entry, "member"), vec!["uid=c,dc=x".to_string()]);
    }

    #[test]
    fn test_normalize_absent_attribute() {
        let entry = entry_with(vec![], vec![]);
        assert!(normalize_values(&entry, "member").is_empty());
        assert_eq!(first_value(&entry, "member"), None);
    }

    #[test]
    fn test_person_attributes_from_entry() {
        let entry = entry_with(
            vec![
                ("uid", vec!["mmuster"]),
                ("cn", vec!["mmuster"]),
                ("givenName", vec!["Max"]),
                ("sn", vec!["Muster"]),
                ("mailPrimaryAddress", vec!["max.muster@schule-sh.de"]),
            ],
            vec![],
        );
        let attrs = PersonAttributes::from_entry(&entry);
        assert_eq!(attrs.uid.as_deref(), Some("mmuster"));
        assert_eq!(attrs.given_name.as_deref(), Some("Max"));
        assert_eq!(attrs.surname.as_deref(), Some("Muster"));
        assert_eq!(
            attrs.mail_primary_address.as_deref(),
            Some("max.muster@schule-sh.de")
        );
        assert_eq!(attrs.mail_alternative_address, None);
        assert_eq!(attrs.entry_uuid, None);
    }
}
