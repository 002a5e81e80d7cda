//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC with fixed microsecond precision so that they
//! sort lexically. Calendar days are `YYYY-MM-DD`. Money is decimal text and
//! name lists are compact JSON arrays.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use dje_core::{
  execution::{Environment, ExecutionStatus, ScraperExecution},
  publication::{Publication, PublicationStatus},
};
use rust_decimal::Decimal;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_money(v: Option<Decimal>) -> Option<String> { v.map(|v| v.to_string()) }

fn decode_money(s: Option<String>) -> Result<Option<Decimal>> {
  s.map(|s| Decimal::from_str(&s).map_err(|e| Error::Decode(format!("decimal {s:?}: {e}"))))
    .transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── Name lists ──────────────────────────────────────────────────────────────

pub fn encode_names(names: &[String]) -> Result<String> { Ok(serde_json::to_string(names)?) }

fn decode_names(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPublication::from_row`].
pub const PUBLICATION_COLUMNS: &str = "id, process_number, publication_date, availability_date, \
   authors, lawyers, defendant, main_value, interest_value, legal_fees, full_content, status, \
   content_hash, source_url, scraper_execution_id, created_at, updated_at";

/// Raw values read directly from a `publications` row.
pub struct RawPublication {
  pub id:                   i64,
  pub process_number:       String,
  pub publication_date:     Option<String>,
  pub availability_date:    Option<String>,
  pub authors:              String,
  pub lawyers:              String,
  pub defendant:            String,
  pub main_value:           Option<String>,
  pub interest_value:       Option<String>,
  pub legal_fees:           Option<String>,
  pub full_content:         Option<String>,
  pub status:               String,
  pub content_hash:         Option<String>,
  pub source_url:           Option<String>,
  pub scraper_execution_id: Option<i64>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawPublication {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(0)?,
      process_number:       row.get(1)?,
      publication_date:     row.get(2)?,
      availability_date:    row.get(3)?,
      authors:              row.get(4)?,
      lawyers:              row.get(5)?,
      defendant:            row.get(6)?,
      main_value:           row.get(7)?,
      interest_value:       row.get(8)?,
      legal_fees:           row.get(9)?,
      full_content:         row.get(10)?,
      status:               row.get(11)?,
      content_hash:         row.get(12)?,
      source_url:           row.get(13)?,
      scraper_execution_id: row.get(14)?,
      created_at:           row.get(15)?,
      updated_at:           row.get(16)?,
    })
  }

  pub fn into_publication(self) -> Result<Publication> {
    Ok(Publication {
      id:                   self.id,
      process_number:       self.process_number,
      publication_date:     self.publication_date.as_deref().map(decode_date).transpose()?,
      availability_date:    self.availability_date.as_deref().map(decode_date).transpose()?,
      authors:              decode_names(&self.authors)?,
      lawyers:              decode_names(&self.lawyers)?,
      defendant:            self.defendant,
      main_value:           decode_money(self.main_value)?,
      interest_value:       decode_money(self.interest_value)?,
      legal_fees:           decode_money(self.legal_fees)?,
      full_content:         self.full_content,
      status:               decode_enum::<PublicationStatus>("publication status", &self.status)?,
      content_hash:         self.content_hash,
      source_url:           self.source_url,
      scraper_execution_id: self.scraper_execution_id,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawExecution::from_row`].
pub const EXECUTION_COLUMNS: &str = "id, execution_date, status, start_time, end_time, \
   publications_found, publications_new, publications_duplicated, error_message, dje_url, \
   host_name, executed_by, environment, created_at";

/// Raw values read directly from a `scraper_executions` row.
pub struct RawExecution {
  pub id:                      i64,
  pub execution_date:          String,
  pub status:                  String,
  pub start_time:              String,
  pub end_time:                Option<String>,
  pub publications_found:      i64,
  pub publications_new:        i64,
  pub publications_duplicated: i64,
  pub error_message:           Option<String>,
  pub dje_url:                 Option<String>,
  pub host_name:               Option<String>,
  pub executed_by:             Option<String>,
  pub environment:             String,
  pub created_at:              String,
}

impl RawExecution {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                      row.get(0)?,
      execution_date:          row.get(1)?,
      status:                  row.get(2)?,
      start_time:              row.get(3)?,
      end_time:                row.get(4)?,
      publications_found:      row.get(5)?,
      publications_new:        row.get(6)?,
      publications_duplicated: row.get(7)?,
      error_message:           row.get(8)?,
      dje_url:                 row.get(9)?,
      host_name:               row.get(10)?,
      executed_by:             row.get(11)?,
      environment:             row.get(12)?,
      created_at:              row.get(13)?,
    })
  }

  pub fn into_execution(self) -> Result<ScraperExecution> {
    let counter = |v: i64| {
      u32::try_from(v).map_err(|_| Error::Decode(format!("counter out of range: {v}")))
    };
    Ok(ScraperExecution {
      id:                      self.id,
      execution_date:          decode_date(&self.execution_date)?,
      status:                  decode_enum::<ExecutionStatus>("execution status", &self.status)?,
      start_time:              decode_dt(&self.start_time)?,
      end_time:                self.end_time.as_deref().map(decode_dt).transpose()?,
      publications_found:      counter(self.publications_found)?,
      publications_new:        counter(self.publications_new)?,
      publications_duplicated: counter(self.publications_duplicated)?,
      error_message:           self.error_message,
      dje_url:                 self.dje_url,
      host_name:               self.host_name,
      executed_by:             self.executed_by,
      environment:             decode_enum::<Environment>("environment", &self.environment)?,
      created_at:              decode_dt(&self.created_at)?,
    })
  }
}
