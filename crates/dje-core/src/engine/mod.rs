//! The two engines: the sole writers of publications and executions.
//!
//! Both are constructed with their persistence ports and a
//! [`Clock`](crate::clock::Clock); there is no global registry.

mod ingest;
mod lifecycle;

pub use ingest::{
  BatchOutcome, DEFAULT_RETENTION_DAYS, ExecutionPolicy, IngestionEngine, RejectedItem,
};
pub use lifecycle::LifecycleEngine;

use crate::{Error, Result, error::Entity};

/// How many times a compare-and-set write is retried after losing a race
/// before the caller gets an error.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

fn check_id(id: i64) -> Result<()> {
  if id < 1 {
    return Err(Error::validation("id must be a positive integer"));
  }
  Ok(())
}

fn contended(entity: Entity, id: i64) -> Error {
  Error::business_rule(format!(
    "{entity} {id} is being modified concurrently; try again"
  ))
}
