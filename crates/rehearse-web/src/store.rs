//! In-memory session registry with idle eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rehearse::session::InterviewSession;
use tokio::task::JoinHandle;
use tracing::info;

/// One session behind its own async lock, so a user's turns run one at a time
/// without blocking other sessions.
pub type SharedSession = Arc<tokio::sync::Mutex<InterviewSession>>;

struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// Sessions keyed by id. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session and return its id and handle.
    pub fn create(&self) -> (String, SharedSession) {
        let session = InterviewSession::new();
        let id = session.id().to_string();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).insert(
            id.clone(),
            Entry {
                session: shared.clone(),
                last_seen: Instant::now(),
            },
        );
        (id, shared)
    }

    /// Look up a session and mark it active. Ids that are not UUIDs never
    /// match.
    pub fn get(&self, id: &str) -> Option<SharedSession> {
        uuid::Uuid::parse_str(id).ok()?;
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// Drop sessions untouched for longer than `ttl`. Sessions a request
    /// still holds are kept. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, entry| {
            Arc::strong_count(&entry.session) > 1 || now.duration_since(entry.last_seen) <= ttl
        });
        before - sessions.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `every` on a Tokio task.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let evicted = store.evict_idle(ttl);
                if evicted > 0 {
                    info!(evicted, remaining = store.len(), "Idle sessions evicted");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get() {
        let store = SessionStore::new();
        let (id, session) = store.create();
        assert_eq!(store.len(), 1);
        let found = store.get(&id).unwrap();
        assert!(Arc::ptr_eq(&found, &session));
    }

    #[test]
    fn unknown_and_malformed_ids_miss() {
        let store = SessionStore::new();
        store.create();
        assert!(store.get("00000000-0000-4000-8000-000000000000").is_none());
        assert!(store.get("not-a-uuid").is_none());
    }

    #[test]
    fn clones_share_sessions() {
        let store = SessionStore::new();
        let other = store.clone();
        let (id, _) = store.create();
        assert!(other.get(&id).is_some());
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let store = SessionStore::new();
        let (stale, _) = store.create();
        let (touched, _) = store.create();
        std::thread::sleep(Duration::from_millis(60));
        drop(store.get(&touched));
        let (fresh, _) = store.create();

        assert_eq!(store.evict_idle(Duration::from_millis(30)), 1);
        assert!(store.get(&stale).is_none());
        assert!(store.get(&touched).is_some());
        assert!(store.get(&fresh).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn sessions_in_use_survive_eviction() {
        let store = SessionStore::new();
        let (id, held) = store.create();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.evict_idle(Duration::ZERO), 0);
        drop(held);
        assert_eq!(store.evict_idle(Duration::ZERO), 1);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn many_abandoned_sessions_do_not_accumulate() {
        let store = SessionStore::new();
        for _ in 0..10_000 {
            store.create();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_idle(Duration::ZERO), 10_000);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sweeper_removes_idle_sessions() {
        let store = SessionStore::new();
        store.create();
        let sweeper = store.spawn_sweeper(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..50 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        sweeper.abort();
        assert!(store.is_empty());
    }
}
