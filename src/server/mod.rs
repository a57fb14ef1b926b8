//! Server-side modules for the remote document store.

pub mod api;
pub mod storage;

pub use api::{router, ApiKeyEntry, ApiKeyStore, AuthOrg, ServerState};
pub use storage::{ServerStorage, ServerStorageError};
