//! Publication lifecycle: status transitions, content edits and the read-side
//! projections over publications.

use std::sync::Arc;

use tracing::{info, warn};

use super::{MAX_WRITE_ATTEMPTS, check_id, contended};
use crate::{
  Error, Result,
  clock::Clock,
  error::Entity,
  hash::content_hash,
  publication::{Publication, PublicationStatus},
  query::{
    ColumnMeta, KanbanBoard, MIN_SEARCH_LEN, Page, PageRequest, PublicationFilter, StatusCounts,
  },
  store::PublicationStore,
};

/// Guards every status mutation of a publication.
pub struct LifecycleEngine<P> {
  publications: Arc<P>,
  clock:        Arc<dyn Clock>,
}

impl<P> Clone for LifecycleEngine<P> {
  fn clone(&self) -> Self {
    Self { publications: self.publications.clone(), clock: self.clock.clone() }
  }
}

impl<P: PublicationStore> LifecycleEngine<P> {
  pub fn new(publications: Arc<P>, clock: Arc<dyn Clock>) -> Self {
    Self { publications, clock }
  }

  pub async fn get(&self, id: i64) -> Result<Publication> {
    check_id(id)?;
    self
      .publications
      .find_by_id(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound { entity: Entity::Publication, id })
  }

  /// Move a publication to `target`.
  ///
  /// The write is a compare-and-set on the status that was checked; if another
  /// writer got there first the rules are re-evaluated against the new state,
  /// so the caller sees the error that state warrants.
  pub async fn apply_status(&self, id: i64, target: PublicationStatus) -> Result<Publication> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.get(id).await?;
      let next = current.transition(target, self.clock.now())?;
      let saved = self
        .publications
        .update_status(id, current.status, next.status, next.updated_at)
        .await
        .map_err(Into::into)?;
      match saved {
        Some(saved) => {
          info!(
            publication_id = id,
            from = %current.status,
            to = %saved.status,
            "publication status changed"
          );
          return Ok(saved);
        }
        None => warn!(publication_id = id, attempt, "status changed concurrently, retrying"),
      }
    }
    Err(contended(Entity::Publication, id))
  }

  /// Replace the full content; the fingerprint is recomputed.
  pub async fn update_content(&self, id: i64, content: String) -> Result<Publication> {
    let current = self.get(id).await?;
    let next = current.with_content(content, self.clock.now())?;
    let (Some(content), Some(hash)) = (next.full_content, next.content_hash) else {
      return Err(Error::validation("full content must not be blank"));
    };
    let saved = self
      .publications
      .update_content(id, content, hash, next.updated_at)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound { entity: Entity::Publication, id })?;
    info!(publication_id = id, content_hash = ?saved.content_hash, "publication content updated");
    Ok(saved)
  }

  /// Filtered, paginated listing, newest first.
  pub async fn list(&self, filter: PublicationFilter, page: PageRequest) -> Result<Page<Publication>> {
    check_date_range(&filter)?;
    self.publications.find_all(filter, page).await.map_err(Into::into)
  }

  /// Free-text search. The term is trimmed and must be at least
  /// [`MIN_SEARCH_LEN`] characters.
  pub async fn search(
    &self,
    query: &str,
    filter: PublicationFilter,
    page: PageRequest,
  ) -> Result<Page<Publication>> {
    let term = query.trim();
    if term.chars().count() < MIN_SEARCH_LEN {
      return Err(Error::validation(format!(
        "search term must be at least {MIN_SEARCH_LEN} characters"
      )));
    }
    self
      .list(PublicationFilter { query: Some(term.to_owned()), ..filter }, page)
      .await
  }

  pub async fn list_by_status(
    &self,
    status: PublicationStatus,
    filter: PublicationFilter,
    page: PageRequest,
  ) -> Result<Page<Publication>> {
    self
      .list(PublicationFilter { status: Some(status), ..filter }, page)
      .await
  }

  /// The filter applied once per status, each column capped at `page_size`.
  /// A status set on `filter` is ignored.
  pub async fn kanban(&self, filter: PublicationFilter, page_size: u32) -> Result<KanbanBoard> {
    check_date_range(&filter)?;
    let request = PageRequest::first(page_size);
    let mut board = KanbanBoard::default();
    for status in PublicationStatus::ALL {
      let column = self
        .publications
        .find_all(PublicationFilter { status: Some(status), ..filter.clone() }, request)
        .await
        .map_err(Into::into)?;
      board.kanban_meta.insert(status, ColumnMeta {
        total:        column.total,
        has_more:     column.has_more(),
        current_page: column.page,
      });
      board.kanban_data.insert(status, column.data);
    }
    Ok(board)
  }

  /// Publication count per status, zero-filled.
  pub async fn stats(&self) -> Result<StatusCounts> {
    self.publications.status_counts().await.map_err(Into::into)
  }
}

fn check_date_range(filter: &PublicationFilter) -> Result<()> {
  if let (Some(from), Some(to)) = (filter.date_from, filter.date_to)
    && from > to
  {
    return Err(Error::validation("dateFrom must not be after dateTo"));
  }
  Ok(())
}
