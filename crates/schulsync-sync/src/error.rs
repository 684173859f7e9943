//! Sync engine errors.

use thiserror::Error;

use schulsync_core::{PersonId, RepositoryError};
use schulsync_directory::DirectoryError;

/// Error aborting a sync run before completion.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The person id resolves to no relational record.
    #[error("person {person_id} not found")]
    PersonNotFound { person_id: PersonId },

    /// The person carries no username and therefore no directory entry.
    #[error("person {person_id} has no username")]
    UsernameRequired { person_id: PersonId },

    /// No enabled address and no retryable failed address exists.
    #[error("person {person_id} has no usable email address")]
    NoUsableAddress { person_id: PersonId },

    /// The selected address has no domain part to route by.
    #[error("address '{address}' has no domain part")]
    AddressWithoutDomain { address: String },

    /// The relational store failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The directory failed after the retry bound.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let person_id = PersonId::new();
        let err = SyncError::UsernameRequired { person_id };
        assert_eq!(err.to_string(), format!("person {person_id} has no username"));
    }
}
