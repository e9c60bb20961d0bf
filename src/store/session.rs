//! Reactive session store
//!
//! In-memory, observable state scoped to the running session: the last known
//! record per content key, per-kind completeness status, and session-only UI
//! state (selected language, study, lesson). Only the resolution engine and
//! the poller write content; consumers read and subscribe.

use std::sync::RwLock;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::key::{
    ContentKey, ContentKind, DEFAULT_LANGUAGE_HL, DEFAULT_LANGUAGE_JF, DEFAULT_LESSON,
    DEFAULT_STUDY,
};
use crate::payload::merge_with_delete;

/// Events emitted on content writes so UI consumers can react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record was written or merged for this key
    ContentUpdated { kind: ContentKind, key: String },
    /// All content maps were cleared (version bump or user action)
    Reset,
}

/// Session-only UI state carried alongside the content maps.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub study: String,
    pub language_hl: String,
    pub language_jf: String,
    pub lesson: u32,
    /// Playback position within the current lesson's video, in seconds
    pub position: u32,
    pub menu_open: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            study: DEFAULT_STUDY.to_string(),
            language_hl: DEFAULT_LANGUAGE_HL.to_string(),
            language_jf: DEFAULT_LANGUAGE_JF.to_string(),
            lesson: DEFAULT_LESSON,
            position: 0,
            menu_open: false,
        }
    }
}

/// Observable in-memory store for the running session.
pub struct SessionStore {
    content: DashMap<ContentKey, Value>,
    kind_complete: DashMap<ContentKind, bool>,
    state: RwLock<SessionState>,
    events: broadcast::Sender<StoreEvent>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            content: DashMap::new(),
            kind_complete: DashMap::new(),
            state: RwLock::new(SessionState::default()),
            events,
        }
    }

    /// Subscribe to content updates and resets.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; events are advisory
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Last known record for a key, if any.
    pub fn get(&self, key: &ContentKey) -> Option<Value> {
        self.content.get(key).map(|entry| entry.clone())
    }

    /// Overwrite the record for a key.
    pub fn put(&self, key: &ContentKey, record: Value) {
        debug!(key = %key, "Session store write");
        self.content.insert(key.clone(), record);
        self.emit(StoreEvent::ContentUpdated {
            kind: key.kind,
            key: key.storage_key(),
        });
    }

    /// Merge an interface-strings update into the live translation table.
    ///
    /// Null or empty-string values in `update` delete keys; nested objects
    /// merge recursively. Non-interface keys fall back to a plain overwrite.
    pub fn merge(&self, key: &ContentKey, update: &Value) {
        if key.kind != ContentKind::Interface {
            self.put(key, update.clone());
            return;
        }
        let mut entry = self
            .content
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Default::default()));
        merge_with_delete(entry.value_mut(), update);
        drop(entry);
        self.emit(StoreEvent::ContentUpdated {
            kind: key.kind,
            key: key.storage_key(),
        });
    }

    /// Record that the latest payload for a kind was translation-complete.
    pub fn mark_kind_complete(&self, kind: ContentKind, complete: bool) {
        self.kind_complete.insert(kind, complete);
    }

    pub fn is_kind_complete(&self, kind: ContentKind) -> bool {
        self.kind_complete.get(&kind).map(|v| *v).unwrap_or(false)
    }

    /// Empty all content maps and status flags. UI state survives; the
    /// caller decides what to re-fetch.
    pub fn clear_content(&self) {
        self.content.clear();
        self.kind_complete.clear();
        self.emit(StoreEvent::Reset);
    }

    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    // =========================================================================
    // Session UI state
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn set_language(&self, hl: &str, jf: &str) {
        if let Ok(mut state) = self.state.write() {
            state.language_hl = hl.to_string();
            state.language_jf = jf.to_string();
        }
    }

    pub fn set_study(&self, study: &str) {
        if let Ok(mut state) = self.state.write() {
            state.study = study.to_string();
        }
    }

    pub fn set_lesson(&self, lesson: u32) {
        if let Ok(mut state) = self.state.write() {
            state.lesson = lesson;
            state.position = 0;
        }
    }

    pub fn set_position(&self, position: u32) {
        if let Ok(mut state) = self.state.write() {
            state.position = position;
        }
    }

    pub fn set_menu_open(&self, open: bool) {
        if let Ok(mut state) = self.state.write() {
            state.menu_open = open;
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ContentKind;
    use serde_json::json;

    fn key(kind: ContentKind) -> ContentKey {
        ContentKey::new(kind, "dbs", "eng00", "529", 1)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = SessionStore::new();
        let k = key(ContentKind::CommonContent);
        assert!(store.get(&k).is_none());

        store.put(&k, json!({"content": "X"}));
        assert_eq!(store.get(&k), Some(json!({"content": "X"})));
    }

    #[test]
    fn test_merge_interface_with_delete() {
        let store = SessionStore::new();
        let k = key(ContentKind::Interface);
        store.put(&k, json!({"menu": {"home": "Home", "old": "Gone"}}));

        store.merge(&k, &json!({"menu": {"home": "Inicio", "old": null}}));
        assert_eq!(store.get(&k), Some(json!({"menu": {"home": "Inicio"}})));
    }

    #[test]
    fn test_merge_non_interface_overwrites() {
        let store = SessionStore::new();
        let k = key(ContentKind::CommonContent);
        store.put(&k, json!({"a": 1, "b": 2}));

        store.merge(&k, &json!({"a": 3}));
        assert_eq!(store.get(&k), Some(json!({"a": 3})));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates_and_reset() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        let k = key(ContentKind::CommonContent);

        store.put(&k, json!({"content": "X"}));
        store.clear_content();

        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::ContentUpdated {
                kind: ContentKind::CommonContent,
                key: k.storage_key(),
            }
        );
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::Reset);
    }

    #[test]
    fn test_clear_content_preserves_ui_state() {
        let store = SessionStore::new();
        store.set_language("spa00", "21028");
        store.put(&key(ContentKind::CommonContent), json!({"x": 1}));

        store.clear_content();
        assert_eq!(store.content_len(), 0);
        assert_eq!(store.state().language_hl, "spa00");
    }

    #[test]
    fn test_lesson_change_resets_position() {
        let store = SessionStore::new();
        store.set_position(42);
        assert_eq!(store.state().position, 42);

        store.set_lesson(3);
        assert_eq!(store.state().lesson, 3);
        assert_eq!(store.state().position, 0);
    }

    #[test]
    fn test_kind_complete_status() {
        let store = SessionStore::new();
        assert!(!store.is_kind_complete(ContentKind::Interface));
        store.mark_kind_complete(ContentKind::Interface, true);
        assert!(store.is_kind_complete(ContentKind::Interface));
        store.clear_content();
        assert!(!store.is_kind_complete(ContentKind::Interface));
    }
}
