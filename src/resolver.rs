//! Content resolution engine
//!
//! Resolves a content request through the tiers in strict order: session
//! store, persistent cache, remote gateway. Records found below the session
//! tier are promoted upward; remote fetches are written through to both
//! stores. Incomplete payloads come back to the caller immediately while a
//! background poll reconciles them; subscribers see the replacement when it
//! lands.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ContentError, Result};
use crate::gateway::ContentFetcher;
use crate::key::{ContentKey, ContentKind, DEFAULT_LANGUAGE_HL};
use crate::payload::is_complete;
use crate::poller::ReconcilePoller;
use crate::store::{ContentTables, SessionStore};

/// A single content request.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub key: ContentKey,
    /// Path on the content API, e.g. `/translate/commonContent/eng00/dbs`
    pub remote_url: String,
    /// Treat any fetched payload as final (used for kinds with no partial
    /// state, like video URL lists)
    pub skip_completeness_check: bool,
}

impl ContentRequest {
    pub fn new(key: ContentKey, remote_url: impl Into<String>) -> Self {
        let skip = !key.kind.has_partial_state();
        Self {
            key,
            remote_url: remote_url.into(),
            skip_completeness_check: skip,
        }
    }

    pub fn skip_completeness(mut self) -> Self {
        self.skip_completeness_check = true;
        self
    }

    /// The same request retargeted at the default HL language, or `None` if
    /// this request already asks for it. Routes embed the HL code as a path
    /// segment, so the URL is rewritten by substitution.
    fn default_language_fallback(&self) -> Option<ContentRequest> {
        if self.key.language_hl == DEFAULT_LANGUAGE_HL {
            return None;
        }
        let mut key = self.key.clone();
        let remote_url = self.remote_url.replace(&key.language_hl, DEFAULT_LANGUAGE_HL);
        key.language_hl = DEFAULT_LANGUAGE_HL.to_string();
        Some(Self {
            key,
            remote_url,
            skip_completeness_check: self.skip_completeness_check,
        })
    }
}

/// Counters for observability.
#[derive(Debug, Clone, Default)]
pub struct ResolutionStats {
    pub resolutions: u64,
    pub session_hits: u64,
    pub table_hits: u64,
    pub remote_fetches: u64,
    pub polls_started: u64,
    pub language_fallbacks: u64,
    pub failures: u64,
}

/// Tiered content resolver.
pub struct ContentResolver {
    session: Arc<SessionStore>,
    tables: Arc<ContentTables>,
    fetcher: Arc<dyn ContentFetcher>,
    poller: Arc<ReconcilePoller>,
    stats: RwLock<ResolutionStats>,
}

impl ContentResolver {
    pub fn new(
        session: Arc<SessionStore>,
        tables: Arc<ContentTables>,
        fetcher: Arc<dyn ContentFetcher>,
        poller: Arc<ReconcilePoller>,
    ) -> Self {
        Self {
            session,
            tables,
            fetcher,
            poller,
            stats: RwLock::new(ResolutionStats::default()),
        }
    }

    /// Resolve a request to a content record.
    ///
    /// A later tier is never consulted once an earlier tier yields a
    /// complete record. An incomplete record found on the way down is kept
    /// as the best-known fallback: it is returned if the remote fetch fails,
    /// so a stale partial translation beats an error page.
    ///
    /// Interface strings get one extra chance: a failed interface resolution
    /// re-runs the tier walk once against the default HL language, so the UI
    /// can still render even when the requested language is unreachable.
    pub async fn resolve(&self, request: &ContentRequest) -> Result<Value> {
        match self.resolve_tiers(request).await {
            Err(e)
                if request.key.kind == ContentKind::Interface
                    && !matches!(e, ContentError::Validation(_)) =>
            {
                let Some(fallback) = request.default_language_fallback() else {
                    return Err(e);
                };
                warn!(
                    key = %request.key,
                    error = %e,
                    fallback_hl = DEFAULT_LANGUAGE_HL,
                    "Interface resolution failed, retrying with default language"
                );
                self.bump(|s| s.language_fallbacks += 1);
                self.resolve_tiers(&fallback).await
            }
            other => other,
        }
    }

    async fn resolve_tiers(&self, request: &ContentRequest) -> Result<Value> {
        if request.remote_url.trim().is_empty() {
            return Err(ContentError::Validation("remoteUrl".to_string()));
        }
        self.bump(|s| s.resolutions += 1);

        let key = &request.key;
        let skip_check = request.skip_completeness_check;
        let mut fallback: Option<Value> = None;

        // Tier 1: session store
        if let Some(record) = self.session.get(key) {
            if skip_check || is_complete(&record) {
                debug!(key = %key, "Session hit (complete)");
                self.session.mark_kind_complete(key.kind, true);
                self.bump(|s| s.session_hits += 1);
                return Ok(record);
            }
            debug!(key = %key, "Session hit is incomplete, trying lower tiers");
            fallback = Some(record);
        }

        // Tier 2: persistent cache. Failures here are misses, not errors.
        match self.tables.get(key).await {
            Ok(Some(cached)) => {
                // Promote into the session store either way
                self.session.put(key, cached.payload.clone());
                if skip_check || cached.complete || is_complete(&cached.payload) {
                    debug!(key = %key, "Persistent cache hit (complete)");
                    self.session.mark_kind_complete(key.kind, true);
                    self.bump(|s| s.table_hits += 1);
                    return Ok(cached.payload);
                }
                fallback = Some(cached.payload);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Persistent cache read failed, treating as miss");
            }
        }

        // Tier 3: remote gateway
        self.bump(|s| s.remote_fetches += 1);
        let payload = match self.fetcher.fetch(&request.remote_url).await {
            Ok(payload) => payload,
            Err(e) => {
                self.bump(|s| s.failures += 1);
                if let Some(stale) = fallback {
                    warn!(key = %key, error = %e, "Remote fetch failed, serving stale partial");
                    return Ok(stale);
                }
                return Err(e);
            }
        };

        self.write_through(key, &payload, skip_check).await;

        if skip_check || is_complete(&payload) {
            info!(key = %key, "Resolved complete from remote");
            self.session.mark_kind_complete(key.kind, true);
            return Ok(payload);
        }

        // Partial: hand off to the poller and return what we have. At most
        // one poll per key; a concurrent resolve finding the same partial
        // data is a no-op here.
        if self.poller.start(key.clone(), request.remote_url.clone()) {
            self.bump(|s| s.polls_started += 1);
        }
        info!(key = %key, "Resolved partial from remote, reconciliation scheduled");
        Ok(payload)
    }

    /// Write a fetched payload into both stores. Table failures degrade to
    /// warnings; the session write cannot fail.
    async fn write_through(&self, key: &ContentKey, payload: &Value, skip_check: bool) {
        if key.kind == ContentKind::Interface {
            self.session.merge(key, payload);
        } else {
            self.session.put(key, payload.clone());
        }

        let complete = skip_check || is_complete(payload);
        if let Err(e) = self.tables.put(key, payload, complete).await {
            warn!(key = %key, error = %e, "Persistent cache write failed");
        }
    }

    fn bump(&self, f: impl FnOnce(&mut ResolutionStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }
}
