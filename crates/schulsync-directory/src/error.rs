//! Directory error types
//!
//! Error definitions with retryable/terminal classification. The retry
//! executor is the only place that inspects the classification; everything
//! else just propagates values.

use thiserror::Error;

/// Error that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Connecting or binding to the directory failed. Usually transient.
    #[error("bind failed: {message}")]
    Bind {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An email domain maps to no configured organisational-unit root.
    /// Deterministic configuration issue, never retried.
    #[error("unknown email domain: {domain}")]
    EmailDomain { domain: String },

    /// A request failed at the wire level mid-operation. The entry's state
    /// is unknown, not absent. Usually transient.
    #[error("directory request failed: {message}")]
    Transport { message: String },

    /// An entry was provably missing where one is required.
    #[error("{entity} not found: {message}")]
    Search { entity: &'static str, message: String },

    /// Creating an entry failed.
    #[error("create failed for {dn}: {message}")]
    Create { dn: String, message: String },

    /// Renaming an entry failed.
    #[error("rename failed for {dn}: {message}")]
    Rename { dn: String, message: String },

    /// Modifying the mail attributes failed.
    #[error("email modification failed for {dn}: {message}")]
    ModifyEmail { dn: String, message: String },

    /// Replacing the password failed.
    #[error("password modification failed for {dn}: {message}")]
    ModifyPassword { dn: String, message: String },

    /// Adding a member to a teacher group failed.
    #[error("could not add member to group {group}: {message}")]
    AddToGroup { group: String, message: String },

    /// Removing a member from a teacher group failed.
    #[error("could not remove member from group {group}: {message}")]
    RemoveFromGroup { group: String, message: String },

    /// Deleting an entry failed.
    #[error("delete failed for {dn}: {message}")]
    Delete { dn: String, message: String },

    /// Deleting an organisation's container chain failed.
    #[error("could not delete organisation containers for {kennung}: {message}")]
    DeleteOrganisation { kennung: String, message: String },

    /// The person has no username and therefore no directory entry to
    /// operate on. Precondition failure, never retried.
    #[error("person {person_id} has no username")]
    UsernameRequired { person_id: String },

    /// The gateway configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl DirectoryError {
    /// Whether the operation should be retried.
    ///
    /// Network-shaped failures are retryable; deterministic failures
    /// (configuration, preconditions, provable absence) are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DirectoryError::Bind { .. }
                | DirectoryError::Transport { .. }
                | DirectoryError::Create { .. }
                | DirectoryError::Rename { .. }
                | DirectoryError::ModifyEmail { .. }
                | DirectoryError::ModifyPassword { .. }
                | DirectoryError::AddToGroup { .. }
                | DirectoryError::RemoveFromGroup { .. }
                | DirectoryError::Delete { .. }
                | DirectoryError::DeleteOrganisation { .. }
        )
    }

    /// Short classification code for structured logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::Bind { .. } => "BIND_FAILED",
            DirectoryError::Transport { .. } => "TRANSPORT_FAILED",
            DirectoryError::EmailDomain { .. } => "UNKNOWN_EMAIL_DOMAIN",
            DirectoryError::Search { .. } => "NOT_FOUND",
            DirectoryError::Create { .. } => "CREATE_FAILED",
            DirectoryError::Rename { .. } => "RENAME_FAILED",
            DirectoryError::ModifyEmail { .. } => "MODIFY_EMAIL_FAILED",
            DirectoryError::ModifyPassword { .. } => "MODIFY_PASSWORD_FAILED",
            DirectoryError::AddToGroup { .. } => "ADD_TO_GROUP_FAILED",
            DirectoryError::RemoveFromGroup { .. } => "REMOVE_FROM_GROUP_FAILED",
            DirectoryError::Delete { .. } => "DELETE_FAILED",
            DirectoryError::DeleteOrganisation { .. } => "DELETE_ORGANISATION_FAILED",
            DirectoryError::UsernameRequired { .. } => "USERNAME_REQUIRED",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
        }
    }

    // Convenience constructors

    /// Create a bind error.
    pub fn bind(message: impl Into<String>) -> Self {
        DirectoryError::Bind {
            message: message.into(),
            source: None,
        }
    }

    /// Create a bind error with source.
    pub fn bind_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Bind {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        DirectoryError::Transport {
            message: message.into(),
        }
    }

    /// Create a search error.
    pub fn search(entity: &'static str, message: impl Into<String>) -> Self {
        DirectoryError::Search {
            entity,
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
