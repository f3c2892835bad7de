use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::database::models::UserProfile;

/// Expired entries are swept on insert once the map reaches this size.
const SWEEP_THRESHOLD: usize = 1024;

struct CachedProfile {
    profile: UserProfile,
    stored_at: Instant,
}

/// In-process TTL cache of account profiles keyed by user id.
#[derive(Clone)]
pub struct UserCache {
    entries: Arc<RwLock<HashMap<i64, CachedProfile>>>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get(&self, user_id: i64) -> Option<UserProfile> {
        let entries = self.entries.read().await;
        entries
            .get(&user_id)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.profile.clone())
    }

    pub async fn insert(&self, profile: UserProfile) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.len() >= SWEEP_THRESHOLD {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }
        entries.insert(
            profile.id,
            CachedProfile {
                profile,
                stored_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn len(cache: &UserCache) -> usize {
        cache.entries.read().await.len()
    }

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            full_name: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = UserCache::new(Duration::from_secs(300));
        cache.insert(profile(1)).await;
        assert_eq!(cache.get(1).await.map(|p| p.username), Some("user1".to_string()));
        assert!(cache.get(2).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_hidden() {
        let cache = UserCache::new(Duration::from_millis(20));
        cache.insert(profile(1)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(1).await.is_none());
    }

    #[tokio::test]
    async fn full_cache_sweeps_expired_entries_on_insert() {
        let cache = UserCache::new(Duration::from_millis(20));
        for id in 0..SWEEP_THRESHOLD as i64 {
            cache.insert(profile(id)).await;
        }
        assert_eq!(len(&cache).await, SWEEP_THRESHOLD);

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.insert(profile(-1)).await;
        assert_eq!(len(&cache).await, 1);
        assert!(cache.get(-1).await.is_some());
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = UserCache::new(Duration::ZERO);
        cache.insert(profile(1)).await;
        assert_eq!(len(&cache).await, 0);
    }
}
