//! SQLite backend for the Troth account store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The registry handed to
//! [`SqliteStore::open`] is validated against the live schema catalog before
//! a store is returned, so a deployment whose purge rules and tables
//! disagree never comes up.
//!
//! Errors are the shared [`troth_core`] taxonomy; this crate adds no local
//! error type, so callers can classify failures uniformly across backends.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;
pub use troth_core::{Error, Result};

#[cfg(test)]
mod tests;
