//! Results of detached explanation tasks, polled by the page.
//!
//! Entries nobody collects expire after a time-to-live, and the registry never
//! holds more than a fixed number of them; the oldest goes first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// How long an uncollected entry is kept.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationState {
    Pending,
    /// Rendered region HTML.
    Ready(String),
}

#[derive(Debug)]
struct Entry {
    state: ExplanationState,
    touched: Instant,
}

#[derive(Clone)]
pub struct ExplanationRegistry {
    entries: Arc<RwLock<HashMap<Uuid, Entry>>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for ExplanationRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl ExplanationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn sweep(&self, entries: &mut HashMap<Uuid, Entry>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.touched.elapsed() <= self.ttl);
        if entries.len() < before {
            debug!(expired = before - entries.len(), "Dropped uncollected explanations");
        }
    }

    /// Reserve an id for a task about to start.
    pub async fn begin(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.write().await;
        self.sweep(&mut entries);
        while entries.len() >= self.max_entries {
            let oldest = entries.iter().min_by_key(|(_, entry)| entry.touched).map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    entries.remove(&oldest);
                }
                None => break,
            }
        }
        entries.insert(
            id,
            Entry {
                state: ExplanationState::Pending,
                touched: Instant::now(),
            },
        );
        id
    }

    /// Store the result of `id`. Results for ids that already expired are dropped.
    pub async fn complete(&self, id: Uuid, html: String) {
        let mut entries = self.entries.write().await;
        self.sweep(&mut entries);
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.state = ExplanationState::Ready(html);
                entry.touched = Instant::now();
            }
            None => debug!(%id, "Explanation finished after its entry expired"),
        }
    }

    /// Current state of `id`. A ready entry is handed out once and then forgotten.
    pub async fn take(&self, id: Uuid) -> Option<ExplanationState> {
        let mut entries = self.entries.write().await;
        let (expired, ready) = entries.get(&id).map(|entry| {
            (
                entry.touched.elapsed() > self.ttl,
                matches!(entry.state, ExplanationState::Ready(_)),
            )
        })?;
        if expired {
            entries.remove(&id);
            return None;
        }
        if ready {
            entries.remove(&id).map(|entry| entry.state)
        } else {
            Some(ExplanationState::Pending)
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let registry = ExplanationRegistry::new();
        let id = registry.begin().await;
        assert_eq!(registry.take(id).await, Some(ExplanationState::Pending));

        registry.complete(id, "<p>done</p>".to_string()).await;
        assert_eq!(registry.take(id).await, Some(ExplanationState::Ready("<p>done</p>".to_string())));
        assert_eq!(registry.take(id).await, None);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let registry = ExplanationRegistry::new();
        assert_eq!(registry.take(Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_uncollected_entries_expire() {
        let registry = ExplanationRegistry::with_limits(Duration::from_millis(20), 100);
        let collected_late = registry.begin().await;
        let never_polled = registry.begin().await;
        registry.complete(never_polled, "<p>lost</p>".to_string()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(registry.take(collected_late).await, None);
        registry.begin().await;
        assert_eq!(registry.len().await, 1);

        // a task that outlives its entry does not resurrect it
        registry.complete(collected_late, "<p>late</p>".to_string()).await;
        assert_eq!(registry.take(collected_late).await, None);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let registry = ExplanationRegistry::with_limits(DEFAULT_TTL, 3);
        let first = registry.begin().await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let mut rest = Vec::new();
        for _ in 0..5 {
            rest.push(registry.begin().await);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(registry.len().await, 3);
        assert_eq!(registry.take(first).await, None);
        assert_eq!(registry.take(rest[4]).await, Some(ExplanationState::Pending));
    }
}
