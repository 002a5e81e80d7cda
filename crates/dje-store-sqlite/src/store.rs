//! [`SqliteStore`] — the SQLite implementation of both persistence ports.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use dje_core::{
  execution::{ExecutionDraft, ExecutionStatus, ScraperExecution},
  publication::{Publication, PublicationDraft, PublicationStatus},
  query::{
    ExecutionStats, Page, PageRequest, PublicationFilter, RECENT_EXECUTIONS, StatusCounts,
  },
  store::{ExecutionStore, PublicationStore},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params, params_from_iter, types::Value};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{
    EXECUTION_COLUMNS, PUBLICATION_COLUMNS, RawExecution, RawPublication, encode_date, encode_dt,
    encode_money, encode_names,
  },
  error::constraint_violation,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Publications and scraper executions backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Every call
/// runs on the connection's single worker thread, so statements issued in one
/// `call` closure are never interleaved with another caller's.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What the guarded insert of an execution found.
enum ExecutionInsert {
  Created(RawExecution),
  DateTaken,
  Running(i64),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    debug!("sqlite schema ready");
    Ok(())
  }

  async fn publication_where(
    &self,
    condition: &'static str,
    value: Value,
  ) -> Result<Option<Publication>> {
    let raw: Option<RawPublication> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE {condition}"),
              [value],
              RawPublication::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPublication::into_publication).transpose()
  }

  async fn execution_where(
    &self,
    condition: &'static str,
    args: Vec<Value>,
  ) -> Result<Option<ScraperExecution>> {
    let raw: Option<RawExecution> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {EXECUTION_COLUMNS} FROM scraper_executions WHERE {condition} LIMIT 1"
              ),
              params_from_iter(args.iter()),
              RawExecution::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawExecution::into_execution).transpose()
  }
}

/// Escape `%`, `_` and `\` so a search term matches literally under
/// `LIKE … ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len() + 2);
  escaped.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

/// Translate a [`PublicationFilter`] into a `WHERE` clause with positional
/// arguments. Text matching is `LIKE`, which SQLite folds for ASCII only.
fn filter_clause(filter: &PublicationFilter) -> (String, Vec<Value>) {
  let mut conditions: Vec<String> = vec![];
  let mut args: Vec<Value> = vec![];

  if let Some(status) = filter.status {
    args.push(Value::Text(status.as_str().to_owned()));
    conditions.push(format!("status = ?{}", args.len()));
  }
  if let Some(from) = filter.date_from {
    args.push(Value::Text(encode_date(from)));
    conditions.push(format!("publication_date >= ?{}", args.len()));
  }
  if let Some(to) = filter.date_to {
    args.push(Value::Text(encode_date(to)));
    conditions.push(format!("publication_date <= ?{}", args.len()));
  }
  if let Some(term) = filter.term() {
    args.push(Value::Text(like_pattern(term)));
    let n = args.len();
    conditions.push(format!(
      "(process_number LIKE ?{n} ESCAPE '\\' OR full_content LIKE ?{n} ESCAPE '\\' \
       OR authors LIKE ?{n} ESCAPE '\\' OR lawyers LIKE ?{n} ESCAPE '\\')"
    ));
  }

  let clause = if conditions.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conditions.join(" AND "))
  };
  (clause, args)
}

// ─── PublicationStore impl ───────────────────────────────────────────────────

impl PublicationStore for SqliteStore {
  type Error = Error;

  async fn find_by_id(&self, id: i64) -> Result<Option<Publication>> {
    self.publication_where("id = ?1", Value::Integer(id)).await
  }

  async fn find_by_process_number(&self, process_number: String) -> Result<Option<Publication>> {
    self
      .publication_where("process_number = ?1", Value::Text(process_number))
      .await
  }

  async fn exists_by_process_number(&self, process_number: String) -> Result<bool> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM publications WHERE process_number = ?1)",
            [process_number],
            |row| row.get::<_, bool>(0),
          )?)
        })
        .await?,
    )
  }

  async fn create(&self, draft: PublicationDraft) -> Result<Publication> {
    let authors = encode_names(&draft.authors)?;
    let lawyers = encode_names(&draft.lawyers)?;
    let process_number = draft.process_number.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO publications (
             process_number, publication_date, availability_date, authors, lawyers,
             defendant, main_value, interest_value, legal_fees, full_content, status,
             content_hash, source_url, scraper_execution_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
          params![
            draft.process_number,
            draft.publication_date.map(encode_date),
            draft.availability_date.map(encode_date),
            authors,
            lawyers,
            draft.defendant,
            encode_money(draft.main_value),
            encode_money(draft.interest_value),
            encode_money(draft.legal_fees),
            draft.full_content,
            draft.status.as_str(),
            draft.content_hash,
            draft.source_url,
            draft.scraper_execution_id,
            encode_dt(draft.created_at),
          ],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ?1"),
          [conn.last_insert_rowid()],
          RawPublication::from_row,
        )?)
      })
      .await;

    match inserted {
      Ok(raw) => raw.into_publication(),
      Err(e) if constraint_violation(&e).is_some_and(|m| m.contains("process_number")) => {
        debug!(%process_number, "insert refused by unique constraint");
        Err(Error::DuplicateProcessNumber(process_number))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn update_status(
    &self,
    id: i64,
    expected: PublicationStatus,
    target: PublicationStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Publication>> {
    let at = encode_dt(at);
    let raw: Option<RawPublication> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE publications SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
          params![id, expected.as_str(), target.as_str(), at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ?1"),
          [id],
          RawPublication::from_row,
        )?))
      })
      .await?;
    raw.map(RawPublication::into_publication).transpose()
  }

  async fn update_content(
    &self,
    id: i64,
    content: String,
    content_hash: String,
    at: DateTime<Utc>,
  ) -> Result<Option<Publication>> {
    let at = encode_dt(at);
    let raw: Option<RawPublication> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE publications SET full_content = ?2, content_hash = ?3, updated_at = ?4
           WHERE id = ?1",
          params![id, content, content_hash, at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ?1"),
          [id],
          RawPublication::from_row,
        )?))
      })
      .await?;
    raw.map(RawPublication::into_publication).transpose()
  }

  async fn find_all(
    &self,
    filter: PublicationFilter,
    page: PageRequest,
  ) -> Result<Page<Publication>> {
    let (where_clause, args) = filter_clause(&filter);
    let limit = i64::from(page.limit);
    let offset = page.offset() as i64;

    let (total, raws): (i64, Vec<RawPublication>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM publications {where_clause}"),
          params_from_iter(args.iter()),
          |row| row.get(0),
        )?;

        let n = args.len();
        let sql = format!(
          "SELECT {PUBLICATION_COLUMNS} FROM publications {where_clause}
           ORDER BY created_at DESC, id DESC
           LIMIT ?{} OFFSET ?{}",
          n + 1,
          n + 2
        );
        let mut args = args;
        args.push(Value::Integer(limit));
        args.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(args.iter()), RawPublication::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let data = raws
      .into_iter()
      .map(RawPublication::into_publication)
      .collect::<Result<Vec<_>>>()?;
    Ok(Page::new(data, total as u64, page))
  }

  async fn status_counts(&self) -> Result<StatusCounts> {
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM publications GROUP BY status")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let pairs = rows
      .into_iter()
      .map(|(status, n)| {
        let status = status
          .parse::<PublicationStatus>()
          .map_err(|_| Error::Decode(format!("unknown publication status: {status:?}")))?;
        Ok((status, n as u64))
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(StatusCounts::from_pairs(pairs))
  }
}

// ─── ExecutionStore impl ─────────────────────────────────────────────────────

impl ExecutionStore for SqliteStore {
  type Error = Error;

  async fn find_by_id(&self, id: i64) -> Result<Option<ScraperExecution>> {
    self.execution_where("id = ?1", vec![Value::Integer(id)]).await
  }

  async fn find_by_date(&self, date: NaiveDate) -> Result<Option<ScraperExecution>> {
    self
      .execution_where("execution_date = ?1", vec![Value::Text(encode_date(date))])
      .await
  }

  async fn exists_by_date(&self, date: NaiveDate) -> Result<bool> {
    let date = encode_date(date);
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM scraper_executions WHERE execution_date = ?1)",
            [date],
            |row| row.get::<_, bool>(0),
          )?)
        })
        .await?,
    )
  }

  async fn find_running(&self) -> Result<Option<ScraperExecution>> {
    self.execution_where("status = 'running'", vec![]).await
  }

  /// Both conflict checks and the insert run inside one `IMMEDIATE`
  /// transaction; the unique constraints catch any writer outside this
  /// process.
  async fn create(&self, draft: ExecutionDraft) -> Result<ScraperExecution> {
    let date = draft.execution_date;
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let date_str = encode_date(draft.execution_date);

        let taken: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM scraper_executions WHERE execution_date = ?1)",
          [&date_str],
          |row| row.get(0),
        )?;
        if taken {
          return Ok(ExecutionInsert::DateTaken);
        }
        let running: Option<i64> = tx
          .query_row(
            "SELECT id FROM scraper_executions WHERE status = 'running' LIMIT 1",
            [],
            |row| row.get(0),
          )
          .optional()?;
        if let Some(id) = running {
          return Ok(ExecutionInsert::Running(id));
        }

        tx.execute(
          "INSERT INTO scraper_executions (
             execution_date, status, start_time, dje_url, host_name, executed_by,
             environment, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            date_str,
            ExecutionStatus::Running.as_str(),
            encode_dt(draft.start_time),
            draft.dje_url,
            draft.host_name,
            draft.executed_by,
            draft.environment.as_str(),
            encode_dt(draft.created_at),
          ],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {EXECUTION_COLUMNS} FROM scraper_executions WHERE id = ?1"),
          [tx.last_insert_rowid()],
          RawExecution::from_row,
        )?;
        tx.commit()?;
        Ok(ExecutionInsert::Created(raw))
      })
      .await;

    match outcome {
      Ok(ExecutionInsert::Created(raw)) => raw.into_execution(),
      Ok(ExecutionInsert::DateTaken) => Err(Error::ExecutionDateTaken(date)),
      Ok(ExecutionInsert::Running(id)) => Err(Error::ExecutionRunning(id)),
      Err(e) => match constraint_violation(&e) {
        Some(m) if m.contains("execution_date") => Err(Error::ExecutionDateTaken(date)),
        Some(_) => Err(running_conflict(ExecutionStore::find_running(self).await?)),
        None => Err(e.into()),
      },
    }
  }

  async fn update(
    &self,
    expected: ExecutionStatus,
    next: ScraperExecution,
  ) -> Result<Option<ScraperExecution>> {
    let raw: Option<RawExecution> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE scraper_executions
           SET status = ?3, end_time = ?4, publications_found = ?5, publications_new = ?6,
               publications_duplicated = ?7, error_message = ?8
           WHERE id = ?1 AND status = ?2",
          params![
            next.id,
            expected.as_str(),
            next.status.as_str(),
            next.end_time.map(encode_dt),
            next.publications_found,
            next.publications_new,
            next.publications_duplicated,
            next.error_message,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {EXECUTION_COLUMNS} FROM scraper_executions WHERE id = ?1"),
          [next.id],
          RawExecution::from_row,
        )?))
      })
      .await?;
    raw.map(RawExecution::into_execution).transpose()
  }

  async fn find_all(&self, page: PageRequest) -> Result<Page<ScraperExecution>> {
    let limit = i64::from(page.limit);
    let offset = page.offset() as i64;

    let (total, raws): (i64, Vec<RawExecution>) = self
      .conn
      .call(move |conn| {
        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM scraper_executions", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {EXECUTION_COLUMNS} FROM scraper_executions
           ORDER BY execution_date DESC, id DESC
           LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map(params![limit, offset], RawExecution::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let data = raws
      .into_iter()
      .map(RawExecution::into_execution)
      .collect::<Result<Vec<_>>>()?;
    Ok(Page::new(data, total as u64, page))
  }

  async fn stats(&self, since: NaiveDate) -> Result<ExecutionStats> {
    let since = encode_date(since);
    let recent_limit = RECENT_EXECUTIONS as i64;

    let (totals, by_status, raws) = self
      .conn
      .call(move |conn| {
        let totals: (i64, i64, i64, i64) = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(publications_found), 0),
                  COALESCE(SUM(publications_new), 0),
                  COALESCE(SUM(publications_duplicated), 0)
           FROM scraper_executions",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM scraper_executions GROUP BY status")?;
        let by_status = stmt
          .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {EXECUTION_COLUMNS} FROM scraper_executions
           WHERE execution_date >= ?1
           ORDER BY execution_date DESC
           LIMIT ?2"
        ))?;
        let raws = stmt
          .query_map(params![since, recent_limit], RawExecution::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((totals, by_status, raws))
      })
      .await?;

    let mut counts = ExecutionStats::zeroed_by_status();
    for (status, n) in by_status {
      let status = status
        .parse::<ExecutionStatus>()
        .map_err(|_| Error::Decode(format!("unknown execution status: {status:?}")))?;
      counts.insert(status, n as u64);
    }
    let recent = raws
      .into_iter()
      .map(RawExecution::into_execution)
      .collect::<Result<Vec<_>>>()?;

    let (total, found, new, duplicated) = totals;
    Ok(ExecutionStats {
      total_executions: total as u64,
      publications_found: found as u64,
      publications_new: new as u64,
      publications_duplicated: duplicated as u64,
      by_status: counts,
      recent,
    })
  }
}

/// The error for a lost one-running race, given what is running now.
fn running_conflict(running: Option<ScraperExecution>) -> Error {
  match running {
    Some(execution) => Error::ExecutionRunning(execution.id),
    None => Error::ExecutionStartedConcurrently,
  }
}
