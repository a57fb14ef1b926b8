//! Mirroring the local cache to the remote document store.
//!
//! Local writes land in the outbox together with the cache change. The
//! worker pushes outbox entries in order, then pulls each collection and
//! applies it to the cache, leaving documents with unpushed changes alone.

mod client;
mod error;
mod worker;

pub use client::{DocumentClient, HealthInfo, Identity, RemoteStore};
pub use error::{RemoteError, SyncError};
pub use worker::{PullReport, PushReport, RetryPolicy, SyncReport, SyncWorker};
