//! Version-driven cache reset
//!
//! The only automatic invalidation trigger: when the build version changes
//! between sessions, every persistent table and all session content maps are
//! cleared before any new fetch, and interface content loads from scratch.

use tracing::info;

use crate::error::Result;
use crate::store::{ContentTables, SessionStore};

/// Meta-table key holding the version last seen by this device.
pub const LAST_SEEN_VERSION_KEY: &str = "lastSeenVersion";

/// Compare the stored version against the current build version and reset
/// all caches on mismatch. Returns true if a reset happened.
///
/// Call at startup, before the first resolution. A first run (no stored
/// version) records the version without clearing anything.
pub async fn ensure_version(
    tables: &ContentTables,
    session: &SessionStore,
    current: &str,
) -> Result<bool> {
    let stored = tables.get_meta(LAST_SEEN_VERSION_KEY).await?;

    match stored.as_deref() {
        Some(v) if v == current => Ok(false),
        Some(v) => {
            info!(stored = v, current = current, "Version changed, clearing caches");
            tables.clear_all().await?;
            session.clear_content();
            tables.set_meta(LAST_SEEN_VERSION_KEY, current).await?;
            Ok(true)
        }
        None => {
            tables.set_meta(LAST_SEEN_VERSION_KEY, current).await?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ContentKey, ContentKind};
    use serde_json::json;

    fn key() -> ContentKey {
        ContentKey::new(ContentKind::CommonContent, "dbs", "eng00", "529", 1)
    }

    #[tokio::test]
    async fn test_first_run_records_without_reset() {
        let tables = ContentTables::in_memory().unwrap();
        let session = SessionStore::new();

        let reset = ensure_version(&tables, &session, "1.0").await.unwrap();
        assert!(!reset);
        assert_eq!(
            tables.get_meta(LAST_SEEN_VERSION_KEY).await.unwrap().as_deref(),
            Some("1.0")
        );
    }

    #[tokio::test]
    async fn test_same_version_is_noop() {
        let tables = ContentTables::in_memory().unwrap();
        let session = SessionStore::new();
        tables.set_meta(LAST_SEEN_VERSION_KEY, "1.0").await.unwrap();
        tables.put(&key(), &json!({"x": 1}), true).await.unwrap();

        let reset = ensure_version(&tables, &session, "1.0").await.unwrap();
        assert!(!reset);
        assert!(tables.get(&key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_version_bump_clears_everything() {
        let tables = ContentTables::in_memory().unwrap();
        let session = SessionStore::new();
        tables.set_meta(LAST_SEEN_VERSION_KEY, "1.0").await.unwrap();
        tables.put(&key(), &json!({"x": 1}), true).await.unwrap();
        session.put(&key(), json!({"x": 1}));

        let reset = ensure_version(&tables, &session, "1.1").await.unwrap();
        assert!(reset);
        assert!(tables.get(&key()).await.unwrap().is_none());
        assert_eq!(session.content_len(), 0);
        assert_eq!(
            tables.get_meta(LAST_SEEN_VERSION_KEY).await.unwrap().as_deref(),
            Some("1.1")
        );
    }
}
