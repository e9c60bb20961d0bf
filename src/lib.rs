//! Studygate - content resolution and synchronization core
//!
//! Studygate serves localized lesson, common, interface, and video content
//! for multi-site Bible-study applications. For any content request it
//! resolves through three tiers in strict order - reactive session store,
//! persistent SQLite cache, remote content API - promoting records upward
//! and writing fetches through. Partially-translated payloads are returned
//! immediately and reconciled by a bounded background poll that keeps both
//! caches and subscribers in sync as translations land.
//!
//! ## Components
//!
//! - **Key derivation**: canonical, deterministic content keys from raw
//!   routing parameters
//! - **Session store**: observable in-memory state for the running session
//! - **Content tables**: durable per-kind SQLite cache
//! - **Gateway**: HTTP client with bounded retry and correlation ids
//! - **Resolver**: the tiered resolution engine
//! - **Poller**: at-most-one-per-key background reconciliation

pub mod config;
pub mod error;
pub mod gateway;
pub mod key;
pub mod payload;
pub mod poller;
pub mod resolver;
pub mod store;
pub mod version;

pub use config::CoreConfig;
pub use error::{ContentError, Result};
pub use gateway::{ContentFetcher, RemoteGateway};
pub use key::{ContentKey, ContentKind};
pub use poller::{PollState, ReconcilePoller};
pub use resolver::{ContentRequest, ContentResolver};
pub use store::{CachedRecord, ContentTables, SessionStore, StoreEvent};
pub use version::ensure_version;
