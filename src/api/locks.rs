//! Per-user request serialization.
//!
//! Two turns of the same user would both read and then overwrite the same
//! conversation records. Requests touching a user's conversations take that
//! user's lock first; different users never wait on each other.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    /// Wait for exclusive access to `user_id`'s conversations.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of users with a request in flight.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_waits() {
        let locks = Arc::new(UserLocks::default());
        let guard = locks.acquire("alice").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("alice").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("second request should proceed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_wait() {
        let locks = UserLocks::default();
        let _alice = locks.acquire("alice").await;
        let bob = tokio::time::timeout(Duration::from_millis(100), locks.acquire("bob")).await;
        assert!(bob.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = UserLocks::default();
        drop(locks.acquire("alice").await);
        let _bob = locks.acquire("bob").await;
        assert_eq!(locks.locks.lock().len(), 1);
    }
}
