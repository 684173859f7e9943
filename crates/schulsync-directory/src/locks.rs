//! Category-scoped mutual exclusion.
//!
//! The directory offers no transactions, so the gateway serializes its own
//! mutations per call category: general mutations, group additions and group
//! removals each hold their own lock. Operations in different categories may
//! interleave; operations in the same category are serialized even when they
//! touch different entries.

use tokio::sync::{Mutex, MutexGuard};

/// Three independent mutual-exclusion locks, one per call category.
///
/// Constructed explicitly and owned by the gateway instance, not a global.
/// Guards are RAII: release happens on every exit path, error paths included.
#[derive(Debug, Default)]
pub struct ExclusiveAccessSet {
    general: Mutex<()>,
    group_add: Mutex<()>,
    group_remove: Mutex<()>,
}

impl ExclusiveAccessSet {
    /// Create a new lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the general-mutation lock.
    pub async fn general(&self) -> MutexGuard<'_, ()> {
        self.general.lock().await
    }

    /// Acquire the group-add lock.
    pub async fn group_add(&self) -> MutexGuard<'_, ()> {
        self.group_add.lock().await
    }

    /// Acquire the group-remove lock.
    pub async fn group_remove(&self) -> MutexGuard<'_, ()> {
        self.group_remove.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_category_serializes() {
        let locks = Arc::new(ExclusiveAccessSet::new());

        let guard = locks.general().await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.general().await;
            })
        };

        // The contender cannot finish while the guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_categories_interleave() {
        let locks = Arc::new(ExclusiveAccessSet::new());

        let _add_guard = locks.group_add().await;

        // A remove-category acquisition proceeds despite the held add lock.
        let remove = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.group_remove().await;
            })
        };

        tokio::time::timeout(Duration::from_millis(100), remove)
            .await
            .expect("remove lock should not wait on add lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_guard_released_on_error_path() {
        let locks = ExclusiveAccessSet::new();

        let failing: Result<(), ()> = async {
            let _guard = locks.general().await;
            Err(())
        }
        .await;
        assert!(failing.is_err());

        // Lock must be free again.
        let _guard = locks.general().await;
    }
}
