//! SQLite backend for the DJE publication tracker.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Implements both
//! [`dje_core::store::PublicationStore`] and
//! [`dje_core::store::ExecutionStore`] on one [`SqliteStore`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
