//! In-memory implementation of both persistence ports, used by the engine
//! tests. A single mutex makes every operation atomic.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  Error, Result,
  error::Conflict,
  execution::{ExecutionDraft, ExecutionStatus, ScraperExecution},
  publication::{Publication, PublicationDraft, PublicationStatus},
  query::{
    ExecutionStats, Page, PageRequest, PublicationFilter, RECENT_EXECUTIONS, StatusCounts,
  },
  store::{ExecutionStore, PublicationStore},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
  publications: Vec<Publication>,
  executions:   Vec<ScraperExecution>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
  let data = items
    .iter()
    .skip(page.offset() as usize)
    .take(page.limit as usize)
    .cloned()
    .collect();
  Page::new(data, items.len() as u64, page)
}

impl PublicationStore for MemoryStore {
  type Error = Error;

  async fn find_by_id(&self, id: i64) -> Result<Option<Publication>> {
    Ok(self.state().publications.iter().find(|p| p.id == id).cloned())
  }

  async fn find_by_process_number(&self, process_number: String) -> Result<Option<Publication>> {
    Ok(
      self
        .state()
        .publications
        .iter()
        .find(|p| p.process_number == process_number)
        .cloned(),
    )
  }

  async fn exists_by_process_number(&self, process_number: String) -> Result<bool> {
    Ok(
      self
        .state()
        .publications
        .iter()
        .any(|p| p.process_number == process_number),
    )
  }

  async fn create(&self, draft: PublicationDraft) -> Result<Publication> {
    let mut state = self.state();
    if state
      .publications
      .iter()
      .any(|p| p.process_number == draft.process_number)
    {
      return Err(Error::AlreadyExists { process_number: draft.process_number });
    }
    let id = state.publications.len() as i64 + 1;
    let publication = draft.into_publication(id);
    state.publications.push(publication.clone());
    Ok(publication)
  }

  async fn update_status(
    &self,
    id: i64,
    expected: PublicationStatus,
    target: PublicationStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Publication>> {
    let mut state = self.state();
    let Some(row) = state
      .publications
      .iter_mut()
      .find(|p| p.id == id && p.status == expected)
    else {
      return Ok(None);
    };
    row.status = target;
    row.updated_at = at;
    Ok(Some(row.clone()))
  }

  async fn update_content(
    &self,
    id: i64,
    content: String,
    content_hash: String,
    at: DateTime<Utc>,
  ) -> Result<Option<Publication>> {
    let mut state = self.state();
    let Some(row) = state.publications.iter_mut().find(|p| p.id == id) else {
      return Ok(None);
    };
    row.full_content = Some(content);
    row.content_hash = Some(content_hash);
    row.updated_at = at;
    Ok(Some(row.clone()))
  }

  async fn find_all(
    &self,
    filter: PublicationFilter,
    page: PageRequest,
  ) -> Result<Page<Publication>> {
    let mut hits: Vec<Publication> = self
      .state()
      .publications
      .iter()
      .filter(|p| filter.matches(p))
      .cloned()
      .collect();
    hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(paginate(&hits, page))
  }

  async fn status_counts(&self) -> Result<StatusCounts> {
    Ok(StatusCounts::from_pairs(
      self.state().publications.iter().map(|p| (p.status, 1)),
    ))
  }
}

impl ExecutionStore for MemoryStore {
  type Error = Error;

  async fn find_by_id(&self, id: i64) -> Result<Option<ScraperExecution>> {
    Ok(self.state().executions.iter().find(|e| e.id == id).cloned())
  }

  async fn find_by_date(&self, date: NaiveDate) -> Result<Option<ScraperExecution>> {
    Ok(
      self
        .state()
        .executions
        .iter()
        .find(|e| e.execution_date == date)
        .cloned(),
    )
  }

  async fn exists_by_date(&self, date: NaiveDate) -> Result<bool> {
    Ok(self.state().executions.iter().any(|e| e.execution_date == date))
  }

  async fn find_running(&self) -> Result<Option<ScraperExecution>> {
    Ok(
      self
        .state()
        .executions
        .iter()
        .find(|e| e.status == ExecutionStatus::Running)
        .cloned(),
    )
  }

  async fn create(&self, draft: ExecutionDraft) -> Result<ScraperExecution> {
    let mut state = self.state();
    if state
      .executions
      .iter()
      .any(|e| e.execution_date == draft.execution_date)
    {
      return Err(Error::ExecutionConflict(Conflict::DateTaken(draft.execution_date)));
    }
    if let Some(running) = state
      .executions
      .iter()
      .find(|e| e.status == ExecutionStatus::Running)
    {
      return Err(Error::ExecutionConflict(Conflict::AlreadyRunning {
        execution_id: running.id,
      }));
    }
    let id = state.executions.len() as i64 + 1;
    let execution = draft.into_execution(id);
    state.executions.push(execution.clone());
    Ok(execution)
  }

  async fn update(
    &self,
    expected: ExecutionStatus,
    next: ScraperExecution,
  ) -> Result<Option<ScraperExecution>> {
    let mut state = self.state();
    let Some(row) = state
      .executions
      .iter_mut()
      .find(|e| e.id == next.id && e.status == expected)
    else {
      return Ok(None);
    };
    *row = next;
    Ok(Some(row.clone()))
  }

  async fn find_all(&self, page: PageRequest) -> Result<Page<ScraperExecution>> {
    let mut all = self.state().executions.clone();
    all.sort_by(|a, b| b.execution_date.cmp(&a.execution_date));
    Ok(paginate(&all, page))
  }

  async fn stats(&self, since: NaiveDate) -> Result<ExecutionStats> {
    let state = self.state();
    let mut by_status = ExecutionStats::zeroed_by_status();
    for execution in &state.executions {
      *by_status.entry(execution.status).or_default() += 1;
    }
    let mut recent: Vec<ScraperExecution> = state
      .executions
      .iter()
      .filter(|e| e.execution_date >= since)
      .cloned()
      .collect();
    recent.sort_by(|a, b| b.execution_date.cmp(&a.execution_date));
    recent.truncate(RECENT_EXECUTIONS);

    let sum = |f: fn(&ScraperExecution) -> u32| -> u64 {
      state.executions.iter().map(|e| u64::from(f(e))).sum()
    };
    Ok(ExecutionStats {
      total_executions: state.executions.len() as u64,
      publications_found: sum(|e| e.publications_found),
      publications_new: sum(|e| e.publications_new),
      publications_duplicated: sum(|e| e.publications_duplicated),
      by_status,
      recent,
    })
  }
}
