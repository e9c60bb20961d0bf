//! Cache and state storage
//!
//! Two tiers back the resolution engine: the reactive in-memory
//! [`session::SessionStore`] scoped to the running session, and the durable
//! SQLite [`tables::ContentTables`] that survive restarts.

pub mod session;
pub mod tables;

pub use session::{SessionStore, StoreEvent};
pub use tables::{CachedRecord, ContentTables};
