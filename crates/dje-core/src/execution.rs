//! Scraper executions — one run of the ingestion job for a calendar day.
//!
//! As with publications, the rules here are pure: each operation takes the
//! current snapshot and returns the next one or an error.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result};

/// Longest accepted `host_name`.
pub const MAX_HOST_NAME_LEN: usize = 255;
/// Longest accepted `executed_by`.
pub const MAX_EXECUTED_BY_LEN: usize = 100;
/// Longest accepted failure message.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
  Running,
  Completed,
  Failed,
  Partial,
  Timeout,
  Maintenance,
}

impl ExecutionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Running => "running",
      Self::Completed => "completed",
      Self::Failed => "failed",
      Self::Partial => "partial",
      Self::Timeout => "timeout",
      Self::Maintenance => "maintenance",
    }
  }

  /// `completed` and `failed` accept no further status change.
  pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// Deployment the scraper ran in.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
  Development,
  Staging,
  #[default]
  Production,
}

impl Environment {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Development => "development",
      Self::Staging => "staging",
      Self::Production => "production",
    }
  }
}

// ─── ScraperExecution ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperExecution {
  pub id:                      i64,
  /// The calendar day this run covers; at most one execution per day.
  pub execution_date:          NaiveDate,
  pub status:                  ExecutionStatus,
  pub start_time:              DateTime<Utc>,
  pub end_time:                Option<DateTime<Utc>>,
  pub publications_found:      u32,
  pub publications_new:        u32,
  /// Always `publications_found - publications_new`.
  pub publications_duplicated: u32,
  pub error_message:           Option<String>,
  pub dje_url:                 Option<String>,
  pub host_name:               Option<String>,
  pub executed_by:             Option<String>,
  pub environment:             Environment,
  pub created_at:              DateTime<Utc>,
}

impl ScraperExecution {
  /// Record a successful run. Refuses terminal executions.
  pub fn complete(&self, found: u32, new: u32, at: DateTime<Utc>) -> Result<Self> {
    check_counts(found, new)?;
    match self.status {
      ExecutionStatus::Completed => {
        return Err(Error::business_rule(format!(
          "execution {} is already completed",
          self.id
        )));
      }
      ExecutionStatus::Failed => {
        return Err(Error::business_rule(format!(
          "execution {} has failed and cannot be completed",
          self.id
        )));
      }
      _ => {}
    }
    Ok(Self {
      status: ExecutionStatus::Completed,
      end_time: Some(at.max(self.start_time)),
      publications_found: found,
      publications_new: new,
      publications_duplicated: found - new,
      ..self.clone()
    })
  }

  /// Record a failed run. Failing an already-failed execution overwrites the
  /// message; completed executions are refused.
  pub fn fail(&self, message: &str, at: DateTime<Utc>) -> Result<Self> {
    let message = check_error_message(Some(message))?;
    if self.status == ExecutionStatus::Completed {
      return Err(Error::business_rule(format!(
        "execution {} is completed and cannot be marked as failed",
        self.id
      )));
    }
    Ok(Self {
      status: ExecutionStatus::Failed,
      end_time: Some(at.max(self.start_time)),
      error_message: Some(message),
      ..self.clone()
    })
  }

  /// Apply a generic update.
  ///
  /// - a completed execution only accepts patches that restate `completed`;
  /// - a failed execution keeps its status (metadata corrections only);
  /// - nothing returns to `running`;
  /// - an explicit `end_time` must not precede `start_time`.
  pub fn apply(&self, patch: &ExecutionPatch, at: DateTime<Utc>) -> Result<Self> {
    let target = patch.status.unwrap_or(self.status);

    if self.status == ExecutionStatus::Completed && patch.status != Some(ExecutionStatus::Completed)
    {
      return Err(Error::business_rule(format!(
        "execution {} is completed; its status cannot change",
        self.id
      )));
    }
    if self.status == ExecutionStatus::Failed && target != ExecutionStatus::Failed {
      return Err(Error::business_rule(format!(
        "execution {} has failed and cannot move to '{target}'",
        self.id
      )));
    }
    if target == ExecutionStatus::Running && self.status != ExecutionStatus::Running {
      return Err(Error::business_rule(format!(
        "execution {} cannot return to 'running'",
        self.id
      )));
    }

    let found = patch.publications_found.map(|v| count(v, "publications found")).transpose()?;
    let new = patch.publications_new.map(|v| count(v, "publications new")).transpose()?;

    if target == ExecutionStatus::Completed && (found.is_none() || new.is_none()) {
      return Err(Error::validation(
        "publications found and new are required to complete an execution",
      ));
    }

    let found = found.unwrap_or(self.publications_found);
    let new = new.unwrap_or(self.publications_new);
    check_counts(found, new)?;

    let error_message = match patch.error_message.as_deref() {
      Some(message) => Some(check_error_message(Some(message))?),
      None if patch.status == Some(ExecutionStatus::Failed) => {
        return Err(Error::validation("an error message is required to mark an execution as failed"));
      }
      None => self.error_message.clone(),
    };

    if let Some(end) = patch.end_time
      && end < self.start_time
    {
      return Err(Error::business_rule(
        "end time must not be earlier than the execution start time",
      ));
    }
    let end_time = match (patch.end_time, self.end_time) {
      (Some(end), _) => Some(end),
      (None, Some(end)) => Some(end),
      (None, None) if target != ExecutionStatus::Running => Some(at.max(self.start_time)),
      (None, None) => None,
    };

    Ok(Self {
      status: target,
      end_time,
      publications_found: found,
      publications_new: new,
      publications_duplicated: found - new,
      error_message,
      ..self.clone()
    })
  }
}

/// Convert a caller-supplied counter, rejecting negatives.
pub fn count(value: i64, field: &str) -> Result<u32> {
  if value < 0 {
    return Err(Error::validation(format!("{field} must not be negative")));
  }
  u32::try_from(value).map_err(|_| Error::validation(format!("{field} is too large")))
}

fn check_counts(found: u32, new: u32) -> Result<()> {
  if new > found {
    return Err(Error::business_rule(format!(
      "new publications ({new}) cannot exceed publications found ({found})"
    )));
  }
  Ok(())
}

fn check_error_message(message: Option<&str>) -> Result<String> {
  let message = message.map(str::trim).unwrap_or_default();
  if message.is_empty() {
    return Err(Error::validation("an error message is required"));
  }
  if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
    return Err(Error::validation(format!(
      "error message must be at most {MAX_ERROR_MESSAGE_LEN} characters"
    )));
  }
  Ok(message.to_owned())
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::engine::IngestionEngine::create_execution`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExecution {
  pub execution_date: Option<NaiveDate>,
  #[serde(default)]
  pub dje_url:        Option<String>,
  #[serde(default)]
  pub host_name:      Option<String>,
  #[serde(default)]
  pub executed_by:    Option<String>,
  /// One of `development`, `staging`, `production`; defaults to production.
  #[serde(default)]
  pub environment:    Option<String>,
}

impl NewExecution {
  pub fn for_date(execution_date: NaiveDate) -> Self {
    Self { execution_date: Some(execution_date), ..Self::default() }
  }

  /// Checks that need no storage access.
  ///
  /// `today` is the current calendar day; `retention_days` bounds how far back
  /// an execution may be opened.
  pub fn validate(&self, today: NaiveDate, retention_days: u32) -> Result<ValidExecution> {
    let date = self
      .execution_date
      .ok_or_else(|| Error::validation("execution date is required"))?;
    if date > today {
      return Err(Error::validation("execution date must not be in the future"));
    }
    let oldest = today
      .checked_sub_days(chrono::Days::new(u64::from(retention_days)))
      .unwrap_or(NaiveDate::MIN);
    if date < oldest {
      return Err(Error::business_rule(format!(
        "cannot open an execution more than {retention_days} days in the past"
      )));
    }
    if let Some(raw) = self.dje_url.as_deref() {
      let valid = url::Url::parse(raw)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host());
      if !valid {
        return Err(Error::validation("DJE URL must be an absolute http(s) URL"));
      }
    }
    if self
      .host_name
      .as_deref()
      .is_some_and(|h| h.chars().count() > MAX_HOST_NAME_LEN)
    {
      return Err(Error::validation(format!(
        "host name must be at most {MAX_HOST_NAME_LEN} characters"
      )));
    }
    if self
      .executed_by
      .as_deref()
      .is_some_and(|e| e.chars().count() > MAX_EXECUTED_BY_LEN)
    {
      return Err(Error::validation(format!(
        "executed by must be at most {MAX_EXECUTED_BY_LEN} characters"
      )));
    }
    let environment = match self.environment.as_deref() {
      None => Environment::default(),
      Some(raw) => raw.parse().map_err(|_| {
        Error::validation("environment must be one of: development, staging, production")
      })?,
    };

    Ok(ValidExecution { execution_date: date, environment })
  }

  /// Resolve into the record handed to the store.
  pub fn into_draft(self, valid: ValidExecution, at: DateTime<Utc>) -> ExecutionDraft {
    ExecutionDraft {
      execution_date: valid.execution_date,
      start_time:     at,
      dje_url:        self.dje_url,
      host_name:      self.host_name,
      executed_by:    self.executed_by,
      environment:    valid.environment,
      created_at:     at,
    }
  }
}

/// The parsed parts of a [`NewExecution`] that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidExecution {
  pub execution_date: NaiveDate,
  pub environment:    Environment,
}

/// A validated execution that has not been assigned an ID. Always starts in
/// `running` with zeroed counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDraft {
  pub execution_date: NaiveDate,
  pub start_time:     DateTime<Utc>,
  pub dje_url:        Option<String>,
  pub host_name:      Option<String>,
  pub executed_by:    Option<String>,
  pub environment:    Environment,
  pub created_at:     DateTime<Utc>,
}

impl ExecutionDraft {
  pub fn into_execution(self, id: i64) -> ScraperExecution {
    ScraperExecution {
      id,
      execution_date: self.execution_date,
      status: ExecutionStatus::Running,
      start_time: self.start_time,
      end_time: None,
      publications_found: 0,
      publications_new: 0,
      publications_duplicated: 0,
      error_message: None,
      dje_url: self.dje_url,
      host_name: self.host_name,
      executed_by: self.executed_by,
      environment: self.environment,
      created_at: self.created_at,
    }
  }
}

/// Fields accepted by the generic update path. Counters are signed so that
/// negative input is reported as a validation failure rather than a decode
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPatch {
  #[serde(default)]
  pub status:             Option<ExecutionStatus>,
  #[serde(default)]
  pub end_time:           Option<DateTime<Utc>>,
  #[serde(default)]
  pub publications_found: Option<i64>,
  #[serde(default)]
  pub publications_new:   Option<i64>,
  #[serde(default)]
  pub error_message:      Option<String>,
}
