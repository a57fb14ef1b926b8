//! Offline-first school ERP.
//!
//! Records live in a local SQLite cache and are mirrored to a remote
//! document store by the sync worker.

pub mod app;
pub mod config;
pub mod db;
pub mod models;
pub mod repository;
pub mod server;
pub mod sync;
pub mod viewmodel;
