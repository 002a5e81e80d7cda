//! Core domain for the DJE publication tracker.
//!
//! Entities with pure transition rules, the error taxonomy, persistence ports
//! and the two engines that are the sole writers of publications and scraper
//! executions. This crate is free of HTTP and database dependencies.

// Native `async fn` in traits; the ports spell out their `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod engine;
pub mod error;
pub mod execution;
pub mod hash;
pub mod publication;
pub mod query;
pub mod store;

#[cfg(test)]
mod memory;

pub use error::{Error, ErrorKind, Result};
