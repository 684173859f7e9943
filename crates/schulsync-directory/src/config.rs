//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DirectoryError, DirectoryResult};

/// Default number of attempts per directory operation.
fn default_retry_attempts() -> u32 {
    3
}

/// Default delay between attempts, in milliseconds.
fn default_retry_delay_ms() -> u64 {
    15_000
}

fn default_oeffentliche_schulen_domain() -> String {
    "schule-sh.de".to_string()
}

fn default_ersatzschulen_domain() -> String {
    "ersatzschule-sh.de".to_string()
}

/// Configuration for the directory gateway.
///
/// Two email domains are recognised; each maps to its own organisational-unit
/// root under the base DN. Everything else is a deterministic
/// [`DirectoryError::EmailDomain`].
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory URL, e.g. `ldap://directory:389` or `ldaps://…`.
    pub url: String,

    /// DN used for the administrative bind.
    pub bind_dn: String,

    /// Password for the administrative bind.
    pub admin_password: String,

    /// Base DN under which all entries live, e.g. `dc=schule-sh,dc=de`.
    pub base_dn: String,

    /// Email domain of public schools.
    #[serde(default = "default_oeffentliche_schulen_domain")]
    pub oeffentliche_schulen_domain: String,

    /// Email domain of substitute (private) schools.
    #[serde(default = "default_ersatzschulen_domain")]
    pub ersatzschulen_domain: String,

    /// Attempts per operation before a failure is final.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl DirectoryConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.url.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "directory url must not be empty".to_string(),
            });
        }
        if self.bind_dn.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "bind dn must not be empty".to_string(),
            });
        }
        if self.base_dn.is_empty() {
            return Err(DirectoryError::InvalidConfiguration {
                message: "base dn must not be empty".to_string(),
            });
        }
        if self.retry_attempts == 0 {
            return Err(DirectoryError::InvalidConfiguration {
                message: "retry attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Map an email domain to its organisational-unit root.
    ///
    /// Unknown domains fail deterministically and are never retried.
    pub fn resolve_root(&self, domain: &str) -> DirectoryResult<&'static str> {
        if domain.eq_ignore_ascii_case(&self.oeffentliche_schulen_domain) {
            Ok(OU_OEFFENTLICHE_SCHULEN)
        } else if domain.eq_ignore_ascii_case(&self.ersatzschulen_domain) {
            Ok(OU_ERSATZSCHULEN)
        } else {
            Err(DirectoryError::EmailDomain {
                domain: domain.to_string(),
            })
        }
    }

    /// The configured delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Organisational-unit root for public schools.
pub const OU_OEFFENTLICHE_SCHULEN: &str = "oeffentlicheSchulen";

/// Organisational-unit root for substitute schools.
pub const OU_ERSATZSCHULEN: &str = "ersatzSchulen";

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("admin_password", &"***")
            .field("base_dn", &self.base_dn)
            .field(
                "oeffentliche_schulen_domain",
                &self.oeffentliche_schulen_domain,
            )
            .field("ersatzschulen_domain", &self.ersatzschulen_domain)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DirectoryConfig {
        DirectoryConfig {
            url: "ldap://localhost:389".to_string(),
            bind_dn: "cn=admin,dc=schule-sh,dc=de".to_string(),
            admin_password: "secret".to_string(),
            base_dn: "dc=schule-sh,dc=de".to_string(),
            oeffentliche_schulen_domain: default_oeffentliche_schulen_domain(),
            ersatzschulen_domain: default_ersatzschulen_domain(),
            retry_attempts: 3,
            retry_delay_ms: 15_000,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = test_config();
        config.retry_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(DirectoryError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_resolve_root_known_domains() {
        let config = test_config();
        assert_eq!(
            config.resolve_root("schule-sh.de").unwrap(),
            OU_OEFFENTLICHE_SCHULEN
        );
        assert_eq!(
            config.resolve_root("ersatzschule-sh.de").unwrap(),
            OU_ERSATZSCHULEN
        );
        // Domain matching is case-insensitive
        assert_eq!(
            config.resolve_root("Schule-SH.de").unwrap(),
            OU_OEFFENTLICHE_SCHULEN
        );
    }

    #[test]
    fn test_resolve_root_unknown_domain() {
        let config = test_config();
        let err = config.resolve_root("example.org").unwrap_err();
        assert!(matches!(err, DirectoryError::EmailDomain { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{
            "url": "ldap://localhost:389",
            "bind_dn": "cn=admin,dc=schule-sh,dc=de",
            "admin_password": "secret",
            "base_dn": "dc=schule-sh,dc=de"
        }"#;

        let config: DirectoryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(15_000));
        assert_eq!(config.oeffentliche_schulen_domain, "schule-sh.de");
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***"));
    }
}
