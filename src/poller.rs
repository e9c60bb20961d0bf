//! Background reconciliation poller
//!
//! Content fetched while translation is still in progress server-side gets
//! re-fetched on a bounded schedule until it arrives complete or attempts
//! run out. Every cycle that returns data is applied to both stores so the
//! UI reflects incremental progress. A registration set enforces at most one
//! active poll per content key; fetch errors fail fast rather than consuming
//! the remaining attempts.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::gateway::ContentFetcher;
use crate::key::{ContentKey, ContentKind};
use crate::payload::is_complete;
use crate::store::{ContentTables, SessionStore};

/// Lifecycle of a poll task. A registration exists only while `Active`;
/// terminal states release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Active,
    Completed,
    Exhausted,
    Errored,
}

/// Schedules and runs reconciliation polls.
pub struct ReconcilePoller {
    registrations: DashMap<String, PollState>,
    fetcher: Arc<dyn ContentFetcher>,
    session: Arc<SessionStore>,
    tables: Arc<ContentTables>,
    interval: Duration,
    max_attempts: u32,
}

impl ReconcilePoller {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        session: Arc<SessionStore>,
        tables: Arc<ContentTables>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            registrations: DashMap::new(),
            fetcher,
            session,
            tables,
            interval: config.poll_interval,
            max_attempts: config.poll_max_attempts,
        }
    }

    /// Start polling a key. No-op (returns false) if a poll for the key is
    /// already active. All effects arrive via store writes; the caller gets
    /// no handle.
    pub fn start(self: &Arc<Self>, key: ContentKey, url: String) -> bool {
        let poll_key = key.poll_key();

        // entry() holds the shard lock, making check-and-register atomic
        // across concurrent resolve calls
        let registered = {
            let entry = self.registrations.entry(poll_key.clone());
            match entry {
                dashmap::mapref::entry::Entry::Occupied(_) => false,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(PollState::Active);
                    true
                }
            }
        };
        if !registered {
            debug!(key = %poll_key, "Poll already active, skipping");
            return false;
        }

        info!(key = %poll_key, url = %url, max_attempts = self.max_attempts, "Poll started");
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let state = poller.run(&key, &url).await;
            poller.registrations.remove(&poll_key);
            debug!(key = %poll_key, state = ?state, "Poll settled");
        });
        true
    }

    /// Whether a poll is currently active for this key.
    pub fn is_active(&self, key: &ContentKey) -> bool {
        self.registrations.contains_key(&key.poll_key())
    }

    pub fn active_count(&self) -> usize {
        self.registrations.len()
    }

    async fn run(&self, key: &ContentKey, url: &str) -> PollState {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;

            let payload = match self.fetcher.fetch(url).await {
                Ok(payload) => payload,
                Err(e) => {
                    // Fail fast: a broken endpoint will not improve over the
                    // remaining attempts
                    warn!(key = %key, attempt = attempt, error = %e, "Poll fetch failed");
                    return PollState::Errored;
                }
            };

            let complete = is_complete(&payload);
            self.apply(key, &payload, complete).await;

            if complete {
                info!(key = %key, attempt = attempt, "Poll completed");
                return PollState::Completed;
            }
            debug!(key = %key, attempt = attempt, "Still incomplete");
        }

        info!(key = %key, attempts = self.max_attempts, "Poll attempts exhausted");
        PollState::Exhausted
    }

    /// Write a poll result through to both stores. Interface strings merge
    /// incrementally; everything else replaces. Table failures degrade to a
    /// warning so a storage hiccup never kills the poll.
    async fn apply(&self, key: &ContentKey, payload: &serde_json::Value, complete: bool) {
        if key.kind == ContentKind::Interface {
            self.session.merge(key, payload);
        } else {
            self.session.put(key, payload.clone());
        }
        self.session.mark_kind_complete(key.kind, complete);

        if let Err(e) = self.tables.put(key, payload, complete).await {
            warn!(key = %key, error = %e, "Persistent cache write failed during poll");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContentError, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher that walks a fixed script of responses.
    struct ScriptedFetcher {
        responses: Vec<Result<Value>>,
        cursor: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses,
                cursor: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(i.min(self.responses.len().saturating_sub(1))) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(e)) => Err(ContentError::Transient(e.to_string())),
                None => Err(ContentError::NotFound("script exhausted".into())),
            }
        }
    }

    fn fast_config() -> CoreConfig {
        CoreConfig {
            poll_interval: Duration::from_millis(10),
            poll_max_attempts: 3,
            ..CoreConfig::default()
        }
    }

    fn setup(
        responses: Vec<Result<Value>>,
    ) -> (Arc<ReconcilePoller>, Arc<ScriptedFetcher>, Arc<SessionStore>) {
        let fetcher = Arc::new(ScriptedFetcher::new(responses));
        let session = Arc::new(SessionStore::new());
        let tables = Arc::new(ContentTables::in_memory().unwrap());
        let poller = Arc::new(ReconcilePoller::new(
            fetcher.clone(),
            session.clone(),
            tables,
            &fast_config(),
        ));
        (poller, fetcher, session)
    }

    fn lesson_key() -> ContentKey {
        ContentKey::new(ContentKind::LessonContent, "dbs", "eng00", "529", 1)
    }

    async fn wait_until_settled(poller: &ReconcilePoller, key: &ContentKey) {
        for _ in 0..200 {
            if !poller.is_active(key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("poll never settled");
    }

    #[tokio::test]
    async fn test_completes_and_releases_registration() {
        let (poller, fetcher, session) = setup(vec![
            Ok(json!({"content": "partial", "meta": {"complete": false}})),
            Ok(json!({"content": "final", "meta": {"complete": true}})),
        ]);
        let key = lesson_key();

        assert!(poller.start(key.clone(), "/translate/x".into()));
        wait_until_settled(&poller, &key).await;

        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(poller.active_count(), 0);
        let record = session.get(&key).unwrap();
        assert_eq!(record["content"], "final");
    }

    #[tokio::test]
    async fn test_duplicate_start_is_noop() {
        let (poller, _, _) = setup(vec![Ok(
            json!({"content": "x", "meta": {"complete": false}}),
        )]);
        let key = lesson_key();

        assert!(poller.start(key.clone(), "/translate/x".into()));
        assert!(!poller.start(key.clone(), "/translate/x".into()));
        assert_eq!(poller.active_count(), 1);

        wait_until_settled(&poller, &key).await;
    }

    #[tokio::test]
    async fn test_exhaustion_performs_exact_attempts() {
        let (poller, fetcher, session) = setup(vec![Ok(
            json!({"content": "never done", "meta": {"complete": false}}),
        )]);
        let key = lesson_key();

        poller.start(key.clone(), "/translate/x".into());
        wait_until_settled(&poller, &key).await;

        // max_attempts = 3 in fast_config
        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(poller.active_count(), 0);
        // Partial data was still applied for incremental progress
        assert_eq!(session.get(&key).unwrap()["content"], "never done");
    }

    #[tokio::test]
    async fn test_fetch_error_fails_fast() {
        let (poller, fetcher, _) = setup(vec![Err(ContentError::Transient("boom".into()))]);
        let key = lesson_key();

        poller.start(key.clone(), "/translate/x".into());
        wait_until_settled(&poller, &key).await;

        // One attempt, then Errored; remaining attempts not consumed
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(poller.active_count(), 0);
    }

    #[tokio::test]
    async fn test_interface_updates_merge_incrementally() {
        let (poller, _, session) = setup(vec![
            Ok(json!({"menu": {"home": "Home", "temp": "x"}, "meta": {"complete": false}})),
            Ok(json!({"menu": {"about": "About", "temp": null}, "meta": {"complete": true}})),
        ]);
        let key = ContentKey::new(ContentKind::Interface, "dbs", "eng00", "529", 1);

        poller.start(key.clone(), "/translate/interface".into());
        wait_until_settled(&poller, &key).await;

        let merged = session.get(&key).unwrap();
        assert_eq!(merged["menu"]["home"], "Home");
        assert_eq!(merged["menu"]["about"], "About");
        assert!(merged["menu"].get("temp").is_none());
    }
}
