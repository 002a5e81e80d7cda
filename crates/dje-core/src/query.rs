//! Read-side types: filters, pagination, Kanban projection and statistics.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  execution::{ExecutionStatus, ScraperExecution},
  publication::{Publication, PublicationStatus},
};

pub const DEFAULT_PAGE_LIMIT: u32 = 30;
pub const DEFAULT_EXECUTION_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Minimum length of a free-text search term.
pub const MIN_SEARCH_LEN: usize = 2;
/// How many executions [`ExecutionStats::recent`] holds at most.
pub const RECENT_EXECUTIONS: usize = 7;

// ─── Pagination ──────────────────────────────────────────────────────────────

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
  pub page:  u32,
  pub limit: u32,
}

impl PageRequest {
  /// `page` must be at least 1 and `limit` within `[1, 100]`.
  pub fn new(page: i64, limit: i64) -> Result<Self> {
    if page < 1 {
      return Err(Error::validation("page must be greater than 0"));
    }
    if !(1..=i64::from(MAX_PAGE_LIMIT)).contains(&limit) {
      return Err(Error::validation(format!(
        "limit must be between 1 and {MAX_PAGE_LIMIT}"
      )));
    }
    let page = u32::try_from(page).map_err(|_| Error::validation("page is too large"))?;
    Ok(Self { page, limit: limit as u32 })
  }

  /// Fill in defaults for whichever part the caller left out.
  pub fn or_default(page: Option<i64>, limit: Option<i64>, default_limit: u32) -> Result<Self> {
    Self::new(page.unwrap_or(1), limit.unwrap_or(i64::from(default_limit)))
  }

  pub fn first(limit: u32) -> Self { Self { page: 1, limit: limit.clamp(1, MAX_PAGE_LIMIT) } }

  pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for PageRequest {
  fn default() -> Self { Self::first(DEFAULT_PAGE_LIMIT) }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub data:  Vec<T>,
  pub total: u64,
  pub page:  u32,
  pub limit: u32,
  pub pages: u64,
}

impl<T> Page<T> {
  pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
    Self {
      data,
      total,
      page: request.page,
      limit: request.limit,
      pages: total.div_ceil(u64::from(request.limit)),
    }
  }

  pub fn has_more(&self) -> bool { u64::from(self.page) < self.pages }
}

// ─── Publication filter ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationFilter {
  /// Case-insensitive substring over process number, content, authors and
  /// lawyers.
  pub query:     Option<String>,
  pub status:    Option<PublicationStatus>,
  /// Inclusive lower bound on `publication_date`.
  pub date_from: Option<NaiveDate>,
  /// Inclusive upper bound on `publication_date`.
  pub date_to:   Option<NaiveDate>,
}

impl PublicationFilter {
  /// The trimmed search term, if one is set and non-blank.
  pub fn term(&self) -> Option<&str> {
    self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
  }

  /// Whether `publication` passes every set criterion. Stores backed by a query
  /// language evaluate the same predicate natively.
  pub fn matches(&self, publication: &Publication) -> bool {
    if self.status.is_some_and(|s| s != publication.status) {
      return false;
    }
    if let Some(from) = self.date_from
      && !publication.publication_date.is_some_and(|d| d >= from)
    {
      return false;
    }
    if let Some(to) = self.date_to
      && !publication.publication_date.is_some_and(|d| d <= to)
    {
      return false;
    }
    if let Some(term) = self.term() {
      let term = term.to_lowercase();
      let hit = |s: &str| s.to_lowercase().contains(&term);
      return hit(publication.process_number.as_str())
        || publication.full_content.as_deref().is_some_and(hit)
        || publication.authors.iter().any(|a| hit(a.as_str()))
        || publication.lawyers.iter().any(|l| hit(l.as_str()));
    }
    true
  }
}

// ─── Kanban ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
  pub total:        u64,
  pub has_more:     bool,
  pub current_page: u32,
}

/// Publications grouped by status, one capped page per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanBoard {
  pub kanban_data: BTreeMap<PublicationStatus, Vec<Publication>>,
  pub kanban_meta: BTreeMap<PublicationStatus, ColumnMeta>,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Publication count per status; every status is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusCounts(BTreeMap<PublicationStatus, u64>);

impl StatusCounts {
  /// Zero-fill any status missing from `pairs`.
  pub fn from_pairs(pairs: impl IntoIterator<Item = (PublicationStatus, u64)>) -> Self {
    let mut counts: BTreeMap<_, _> = PublicationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for (status, n) in pairs {
      *counts.entry(status).or_default() += n;
    }
    Self(counts)
  }

  pub fn get(&self, status: PublicationStatus) -> u64 {
    self.0.get(&status).copied().unwrap_or_default()
  }

  pub fn total(&self) -> u64 { self.0.values().sum() }

  pub fn iter(&self) -> impl Iterator<Item = (PublicationStatus, u64)> + '_ {
    self.0.iter().map(|(s, n)| (*s, *n))
  }
}

/// Aggregates over all scraper executions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
  pub total_executions:        u64,
  pub publications_found:      u64,
  pub publications_new:        u64,
  pub publications_duplicated: u64,
  pub by_status:               BTreeMap<ExecutionStatus, u64>,
  /// Executions dated within the last week, newest first.
  pub recent:                  Vec<ScraperExecution>,
}

impl ExecutionStats {
  /// Every execution status mapped to zero.
  pub fn zeroed_by_status() -> BTreeMap<ExecutionStatus, u64> {
    use strum::IntoEnumIterator;
    ExecutionStatus::iter().map(|s| (s, 0)).collect()
  }
}
