//! Ingestion: publication creation with duplicate control, and the scraper
//! execution lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{MAX_WRITE_ATTEMPTS, check_id, contended};
use crate::{
  Error, Result,
  clock::Clock,
  error::{Conflict, Entity},
  execution::{ExecutionPatch, ExecutionStatus, NewExecution, ScraperExecution, count},
  publication::{NewPublication, Publication},
  query::{ExecutionStats, Page, PageRequest},
  store::{ExecutionStore, PublicationStore},
};

/// Default for [`ExecutionPolicy::retention_days`].
pub const DEFAULT_RETENTION_DAYS: u32 = 180;

/// Tunables for execution creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
  /// How many days back an execution may still be opened.
  pub retention_days: u32,
}

impl Default for ExecutionPolicy {
  fn default() -> Self { Self { retention_days: DEFAULT_RETENTION_DAYS } }
}

/// One item of a batch that was neither created nor a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedItem {
  /// Position in the submitted batch.
  pub index:          usize,
  pub process_number: String,
  pub code:           &'static str,
  pub message:        String,
}

/// Result of [`IngestionEngine::ingest_batch`]. `found` always equals
/// `created + duplicated + rejected.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
  pub found:      u32,
  pub created:    u32,
  pub duplicated: u32,
  pub rejected:   Vec<RejectedItem>,
}

/// Governs how publications enter the system and tracks scraper runs.
pub struct IngestionEngine<P, E> {
  publications: Arc<P>,
  executions:   Arc<E>,
  clock:        Arc<dyn Clock>,
  policy:       ExecutionPolicy,
}

impl<P, E> Clone for IngestionEngine<P, E> {
  fn clone(&self) -> Self {
    Self {
      publications: self.publications.clone(),
      executions:   self.executions.clone(),
      clock:        self.clock.clone(),
      policy:       self.policy,
    }
  }
}

impl<P: PublicationStore, E: ExecutionStore> IngestionEngine<P, E> {
  pub fn new(
    publications: Arc<P>,
    executions: Arc<E>,
    clock: Arc<dyn Clock>,
    policy: ExecutionPolicy,
  ) -> Self {
    Self { publications, executions, clock, policy }
  }

  // ── Publications ──────────────────────────────────────────────────────

  /// Validate and persist a new publication in status `nova`.
  ///
  /// Uniqueness is enforced on the process number only; the content hash is
  /// stored but never used to reject.
  pub async fn create_publication(&self, input: NewPublication) -> Result<Publication> {
    input.validate()?;
    if let Some(execution_id) = input.scraper_execution_id {
      let known = execution_id >= 1
        && self
          .executions
          .find_by_id(execution_id)
          .await
          .map_err(Into::into)?
          .is_some();
      if !known {
        return Err(Error::validation(format!(
          "scraper execution {execution_id} does not exist"
        )));
      }
    }
    self.insert_publication(input).await
  }

  /// Stamp every item with `execution_id` and create it.
  ///
  /// The execution must exist and still be running. Duplicates are counted
  /// rather than reported; other domain failures are collected per item.
  /// Storage failures abort the batch.
  pub async fn ingest_batch(
    &self,
    execution_id: i64,
    items: Vec<NewPublication>,
  ) -> Result<BatchOutcome> {
    let execution = self.execution(execution_id).await?;
    if execution.status != ExecutionStatus::Running {
      return Err(Error::business_rule(format!(
        "execution {execution_id} is '{}' and no longer accepts publications",
        execution.status
      )));
    }

    let mut outcome = BatchOutcome { found: items.len() as u32, ..Default::default() };
    for (index, mut item) in items.into_iter().enumerate() {
      item.scraper_execution_id = Some(execution_id);
      let process_number = item.process_number.trim().to_owned();
      let result = match item.validate() {
        Ok(()) => self.insert_publication(item).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(_) => outcome.created += 1,
        Err(Error::AlreadyExists { .. }) => outcome.duplicated += 1,
        Err(e @ Error::Storage(_)) => return Err(e),
        Err(e) => outcome.rejected.push(RejectedItem {
          index,
          process_number,
          code: e.kind().code(),
          message: e.to_string(),
        }),
      }
    }

    info!(
      execution_id,
      found = outcome.found,
      created = outcome.created,
      duplicated = outcome.duplicated,
      rejected = outcome.rejected.len(),
      "batch ingested"
    );
    Ok(outcome)
  }

  async fn insert_publication(&self, input: NewPublication) -> Result<Publication> {
    let process_number = input.process_number.trim().to_owned();
    let taken = self
      .publications
      .exists_by_process_number(process_number.clone())
      .await
      .map_err(Into::into)?;
    if taken {
      warn!(%process_number, "duplicate publication rejected");
      return Err(Error::AlreadyExists { process_number });
    }

    let draft = input.into_draft(self.clock.now());
    let publication = self.publications.create(draft).await.map_err(Into::into)?;
    info!(
      publication_id = publication.id,
      process_number = %publication.process_number,
      scraper_execution_id = ?publication.scraper_execution_id,
      "publication created"
    );
    Ok(publication)
  }

  // ── Executions: writes ────────────────────────────────────────────────

  /// Open a new `running` execution.
  ///
  /// The date and running checks here give the precise error early; the store
  /// repeats both atomically with the insert, so a concurrent caller that slips
  /// past them still loses with `ExecutionConflict`.
  pub async fn create_execution(&self, input: NewExecution) -> Result<ScraperExecution> {
    let valid = input.validate(self.clock.today(), self.policy.retention_days)?;

    let taken = self
      .executions
      .exists_by_date(valid.execution_date)
      .await
      .map_err(Into::into)?;
    if taken {
      let conflict = Conflict::DateTaken(valid.execution_date);
      warn!(%conflict, "execution rejected");
      return Err(Error::ExecutionConflict(conflict));
    }
    if let Some(running) = self.executions.find_running().await.map_err(Into::into)? {
      let conflict = Conflict::AlreadyRunning { execution_id: running.id };
      warn!(%conflict, "execution rejected");
      return Err(Error::ExecutionConflict(conflict));
    }

    let draft = input.into_draft(valid, self.clock.now());
    let execution = self.executions.create(draft).await.map_err(|e| {
      let e: Error = e.into();
      if let Error::ExecutionConflict(conflict) = &e {
        warn!(%conflict, "execution lost a creation race");
      }
      e
    })?;
    info!(
      execution_id = execution.id,
      execution_date = %execution.execution_date,
      environment = %execution.environment,
      "execution started"
    );
    Ok(execution)
  }

  /// Record a successful run. `found` and `new` must be non-negative with
  /// `new <= found`; the duplicate count is derived.
  pub async fn complete(&self, id: i64, found: i64, new: i64) -> Result<ScraperExecution> {
    let found = count(found, "publications found")?;
    let new = count(new, "publications new")?;
    let saved = self.mutate(id, |e, at| e.complete(found, new, at)).await?;
    info!(
      execution_id = id,
      found = saved.publications_found,
      new = saved.publications_new,
      duplicated = saved.publications_duplicated,
      "execution completed"
    );
    Ok(saved)
  }

  /// Record a failed run. Re-failing overwrites the message.
  pub async fn fail(&self, id: i64, message: &str) -> Result<ScraperExecution> {
    let saved = self.mutate(id, |e, at| e.fail(message, at)).await?;
    warn!(execution_id = id, error_message = ?saved.error_message, "execution failed");
    Ok(saved)
  }

  /// Fail the execution with the message `Cancelled: <reason>`.
  pub async fn cancel(&self, id: i64, reason: &str) -> Result<ScraperExecution> {
    let reason = reason.trim();
    if reason.is_empty() {
      return Err(Error::validation("a cancellation reason is required"));
    }
    self.fail(id, &format!("Cancelled: {reason}")).await
  }

  /// Generic update; see [`ScraperExecution::apply`] for the rules.
  pub async fn update(&self, id: i64, patch: ExecutionPatch) -> Result<ScraperExecution> {
    let saved = self.mutate(id, |e, at| e.apply(&patch, at)).await?;
    info!(execution_id = id, status = %saved.status, "execution updated");
    Ok(saved)
  }

  /// Load, apply `rule`, and compare-and-set on the status that was read.
  /// Lost races are re-evaluated against the fresh row.
  async fn mutate<F>(&self, id: i64, rule: F) -> Result<ScraperExecution>
  where
    F: Fn(&ScraperExecution, DateTime<Utc>) -> Result<ScraperExecution> + Send + Sync,
  {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.execution(id).await?;
      let next = rule(&current, self.clock.now())?;
      match self
        .executions
        .update(current.status, next)
        .await
        .map_err(Into::into)?
      {
        Some(saved) => return Ok(saved),
        None => warn!(execution_id = id, attempt, "execution changed concurrently, retrying"),
      }
    }
    Err(contended(Entity::ScraperExecution, id))
  }

  // ── Executions: reads ─────────────────────────────────────────────────

  pub async fn execution(&self, id: i64) -> Result<ScraperExecution> {
    check_id(id)?;
    self
      .executions
      .find_by_id(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound { entity: Entity::ScraperExecution, id })
  }

  /// Executions ordered by date, newest first.
  pub async fn executions(&self, page: PageRequest) -> Result<Page<ScraperExecution>> {
    self.executions.find_all(page).await.map_err(Into::into)
  }

  pub async fn execution_by_date(&self, date: NaiveDate) -> Result<Option<ScraperExecution>> {
    self.executions.find_by_date(date).await.map_err(Into::into)
  }

  /// The execution for the clock's current day, if one was opened.
  pub async fn today_execution(&self) -> Result<Option<ScraperExecution>> {
    self.execution_by_date(self.clock.today()).await
  }

  pub async fn running_execution(&self) -> Result<Option<ScraperExecution>> {
    self.executions.find_running().await.map_err(Into::into)
  }

  /// Totals across all executions plus those of the last seven days
  /// (today and the six before it).
  pub async fn stats(&self) -> Result<ExecutionStats> {
    let since = self.clock.today() - Days::new(6);
    self.executions.stats(since).await.map_err(Into::into)
  }
}
