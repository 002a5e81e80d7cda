//! Publication — a judicial-gazette notice tracked through a four-stage
//! review workflow.
//!
//! Records are never mutated in place. [`Publication::transition`] and
//! [`Publication::with_content`] take a snapshot and return the next one; the
//! persistence port is responsible for writing it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result, hash::content_hash};

/// Defendant recorded when the scraper does not supply one.
pub const DEFAULT_DEFENDANT: &str = "Instituto Nacional do Seguro Social - INSS";

// ─── Status ──────────────────────────────────────────────────────────────────

/// Review status of a publication. The serialised names are the wire values
/// shared with existing clients and must not change.
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
pub enum PublicationStatus {
  #[serde(rename = "nova")]
  #[strum(serialize = "nova")]
  New,
  #[serde(rename = "lida")]
  #[strum(serialize = "lida")]
  Read,
  #[serde(rename = "enviada_adv")]
  #[strum(serialize = "enviada_adv")]
  SentToLawyer,
  #[serde(rename = "concluida")]
  #[strum(serialize = "concluida")]
  Done,
}

impl PublicationStatus {
  /// All statuses in workflow order.
  pub const ALL: [Self; 4] = [Self::New, Self::Read, Self::SentToLawyer, Self::Done];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::New => "nova",
      Self::Read => "lida",
      Self::SentToLawyer => "enviada_adv",
      Self::Done => "concluida",
    }
  }

  /// Statuses reachable in one step. `SentToLawyer -> Read` is the only
  /// backward edge; `Done` is terminal.
  pub fn successors(self) -> &'static [Self] {
    match self {
      Self::New => &[Self::Read],
      Self::Read => &[Self::SentToLawyer],
      Self::SentToLawyer => &[Self::Read, Self::Done],
      Self::Done => &[],
    }
  }

  /// Staying in the same status is never a transition.
  pub fn can_transition_to(self, target: Self) -> bool {
    self.successors().contains(&target)
  }

  pub fn is_terminal(self) -> bool { self.successors().is_empty() }

  /// Parse a wire value, reporting unknown values as a validation failure.
  pub fn parse(raw: &str) -> Result<Self> {
    raw.trim().parse().map_err(|_| {
      Error::validation(format!(
        "status must be one of: nova, lida, enviada_adv, concluida (got '{raw}')"
      ))
    })
  }
}

/// Free-function form of [`PublicationStatus::can_transition_to`].
pub fn can_transition(current: PublicationStatus, target: PublicationStatus) -> bool {
  current.can_transition_to(target)
}

// ─── Publication ─────────────────────────────────────────────────────────────

/// A stored publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
  pub id:                   i64,
  /// Business key; unique and immutable after creation.
  pub process_number:       String,
  pub publication_date:     Option<NaiveDate>,
  pub availability_date:    Option<NaiveDate>,
  pub authors:              Vec<String>,
  pub lawyers:              Vec<String>,
  pub defendant:            String,
  pub main_value:           Option<Decimal>,
  pub interest_value:       Option<Decimal>,
  pub legal_fees:           Option<Decimal>,
  pub full_content:         Option<String>,
  pub status:               PublicationStatus,
  /// Fingerprint of `full_content`; stored for duplicate-content detection but
  /// not enforced as unique.
  pub content_hash:         Option<String>,
  pub source_url:           Option<String>,
  /// The scraper execution that produced this record, if any.
  pub scraper_execution_id: Option<i64>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl Publication {
  pub fn has_content(&self) -> bool {
    self
      .full_content
      .as_deref()
      .is_some_and(|c| !c.trim().is_empty())
  }

  /// Check `target` against the transition graph and the completion rule and
  /// return the next snapshot. `self` is left untouched either way.
  pub fn transition(&self, target: PublicationStatus, at: DateTime<Utc>) -> Result<Self> {
    if !self.status.can_transition_to(target) {
      return Err(Error::InvalidTransition { from: self.status, to: target });
    }
    if target == PublicationStatus::Done && !self.has_content() {
      return Err(Error::business_rule(
        "a publication cannot be completed without full content",
      ));
    }
    Ok(Self { status: target, updated_at: at, ..self.clone() })
  }

  /// Replace the full content, recomputing the fingerprint.
  pub fn with_content(&self, content: String, at: DateTime<Utc>) -> Result<Self> {
    if content.trim().is_empty() {
      return Err(Error::validation("full content must not be blank"));
    }
    Ok(Self {
      content_hash: Some(content_hash(&content)),
      full_content: Some(content),
      updated_at: at,
      ..self.clone()
    })
  }
}

// ─── NewPublication ──────────────────────────────────────────────────────────

/// Input to [`crate::engine::IngestionEngine::create_publication`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPublication {
  pub process_number:       String,
  #[serde(default)]
  pub publication_date:     Option<NaiveDate>,
  #[serde(default)]
  pub availability_date:    Option<NaiveDate>,
  #[serde(default)]
  pub authors:              Vec<String>,
  #[serde(default)]
  pub lawyers:              Vec<String>,
  #[serde(default)]
  pub defendant:            Option<String>,
  #[serde(default)]
  pub main_value:           Option<Decimal>,
  #[serde(default)]
  pub interest_value:       Option<Decimal>,
  #[serde(default)]
  pub legal_fees:           Option<Decimal>,
  #[serde(default)]
  pub full_content:         Option<String>,
  #[serde(default)]
  pub source_url:           Option<String>,
  #[serde(default)]
  pub scraper_execution_id: Option<i64>,
  /// Caller-supplied fingerprint; computed from `full_content` when absent.
  #[serde(default)]
  pub content_hash:         Option<String>,
}

impl NewPublication {
  /// Convenience constructor with every optional field unset.
  pub fn new(process_number: impl Into<String>, authors: Vec<String>) -> Self {
    Self { process_number: process_number.into(), authors, ..Self::default() }
  }

  /// Input checks that need no storage access. Fails with `Validation`, or
  /// `BusinessRule` for date ordering.
  pub fn validate(&self) -> Result<()> {
    if self.process_number.trim().is_empty() {
      return Err(Error::validation("process number is required"));
    }
    if self.authors.is_empty() {
      return Err(Error::validation("at least one author is required"));
    }
    if self.authors.iter().any(|a| a.trim().is_empty()) {
      return Err(Error::validation("author names must not be blank"));
    }
    if self.lawyers.iter().any(|l| l.trim().is_empty()) {
      return Err(Error::validation("lawyer names must not be blank"));
    }
    for (field, value) in [
      ("main value", self.main_value),
      ("interest value", self.interest_value),
      ("legal fees", self.legal_fees),
    ] {
      if value.is_some_and(|v| v < Decimal::ZERO) {
        return Err(Error::validation(format!("{field} must not be negative")));
      }
    }
    if let (Some(published), Some(available)) =
      (self.publication_date, self.availability_date)
      && published > available
    {
      return Err(Error::business_rule(
        "publication date must not be after availability date",
      ));
    }
    Ok(())
  }

  /// Resolve defaults and produce the record handed to the store. Call
  /// [`Self::validate`] first.
  pub fn into_draft(self, at: DateTime<Utc>) -> PublicationDraft {
    let content_hash = self
      .content_hash
      .filter(|h| !h.trim().is_empty())
      .or_else(|| {
        self
          .full_content
          .as_deref()
          .filter(|c| !c.trim().is_empty())
          .map(content_hash)
      });
    let defendant = self
      .defendant
      .map(|d| d.trim().to_owned())
      .filter(|d| !d.is_empty())
      .unwrap_or_else(|| DEFAULT_DEFENDANT.to_owned());

    PublicationDraft {
      process_number: self.process_number.trim().to_owned(),
      publication_date: self.publication_date,
      availability_date: self.availability_date,
      authors: self.authors.iter().map(|a| a.trim().to_owned()).collect(),
      lawyers: self.lawyers.iter().map(|l| l.trim().to_owned()).collect(),
      defendant,
      main_value: self.main_value,
      interest_value: self.interest_value,
      legal_fees: self.legal_fees,
      full_content: self.full_content,
      status: PublicationStatus::New,
      content_hash,
      source_url: self.source_url,
      scraper_execution_id: self.scraper_execution_id,
      created_at: at,
    }
  }
}

/// A validated publication that has not been assigned an ID yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationDraft {
  pub process_number:       String,
  pub publication_date:     Option<NaiveDate>,
  pub availability_date:    Option<NaiveDate>,
  pub authors:              Vec<String>,
  pub lawyers:              Vec<String>,
  pub defendant:            String,
  pub main_value:           Option<Decimal>,
  pub interest_value:       Option<Decimal>,
  pub legal_fees:           Option<Decimal>,
  pub full_content:         Option<String>,
  pub status:               PublicationStatus,
  pub content_hash:         Option<String>,
  pub source_url:           Option<String>,
  pub scraper_execution_id: Option<i64>,
  pub created_at:           DateTime<Utc>,
}

impl PublicationDraft {
  /// Attach the store-assigned ID. `updated_at` starts equal to `created_at`.
  pub fn into_publication(self, id: i64) -> Publication {
    Publication {
      id,
      process_number: self.process_number,
      publication_date: self.publication_date,
      availability_date: self.availability_date,
      authors: self.authors,
      lawyers: self.lawyers,
      defendant: self.defendant,
      main_value: self.main_value,
      interest_value: self.interest_value,
      legal_fees: self.legal_fees,
      full_content: self.full_content,
      status: self.status,
      content_hash: self.content_hash,
      source_url: self.source_url,
      scraper_execution_id: self.scraper_execution_id,
      created_at: self.created_at,
      updated_at: self.created_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use chrono::TimeZone;
  use strum::IntoEnumIterator;

  use super::*;
  use crate::ErrorKind;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn publication(status: PublicationStatus, content: Option<&str>) -> Publication {
    let mut input = NewPublication::new("0001234-56.2024.8.26.0100", vec!["Maria".into()]);
    input.full_content = content.map(str::to_owned);
    let mut p = input.into_draft(at(0)).into_publication(1);
    p.status = status;
    p
  }

  #[test]
  fn wire_values_roundtrip_through_strum_and_serde() {
    for status in PublicationStatus::iter() {
      assert_eq!(PublicationStatus::from_str(status.as_str()).unwrap(), status);
      assert_eq!(status.to_string(), status.as_str());
      let json = serde_json::to_string(&status).unwrap();
      assert_eq!(json, format!("\"{}\"", status.as_str()));
    }
    assert!(PublicationStatus::from_str("new").is_err());
    assert_eq!(PublicationStatus::parse(" lida ").unwrap(), PublicationStatus::Read);
    assert_eq!(PublicationStatus::parse("done").unwrap_err().kind(), ErrorKind::Validation);
  }

  #[test]
  fn graph_matches_the_workflow() {
    use PublicationStatus::*;
    let allowed = [(New, Read), (Read, SentToLawyer), (SentToLawyer, Read), (SentToLawyer, Done)];
    for from in PublicationStatus::iter() {
      for to in PublicationStatus::iter() {
        assert_eq!(
          can_transition(from, to),
          allowed.contains(&(from, to)),
          "{from} -> {to}"
        );
      }
    }
    assert!(Done.is_terminal());
    assert!(!SentToLawyer.is_terminal());
  }

  #[test]
  fn transition_returns_new_snapshot() {
    let p = publication(PublicationStatus::New, None);
    let next = p.transition(PublicationStatus::Read, at(50)).unwrap();
    assert_eq!(next.status, PublicationStatus::Read);
    assert_eq!(next.updated_at, at(50));
    assert_eq!(next.created_at, p.created_at);
    assert_eq!(p.status, PublicationStatus::New);
  }

  #[test]
  fn done_requires_content() {
    let p = publication(PublicationStatus::SentToLawyer, Some("   "));
    let err = p.transition(PublicationStatus::Done, at(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BusinessRule);

    let p = publication(PublicationStatus::SentToLawyer, Some("Intimação"));
    assert!(p.transition(PublicationStatus::Done, at(1)).is_ok());
  }

  #[test]
  fn graph_is_checked_before_content() {
    let p = publication(PublicationStatus::New, None);
    let err = p.transition(PublicationStatus::Done, at(1)).unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidTransition { from: PublicationStatus::New, to: PublicationStatus::Done }
    ));
  }

  #[test]
  fn with_content_recomputes_hash() {
    let p = publication(PublicationStatus::Read, None);
    assert!(p.content_hash.is_none());
    let next = p.with_content("texto".into(), at(9)).unwrap();
    assert_eq!(next.content_hash.as_deref(), Some(content_hash("texto").as_str()));
    assert_eq!(next.updated_at, at(9));
    assert!(p.with_content(" ".into(), at(9)).is_err());
  }

  #[test]
  fn validate_rejects_bad_input() {
    let ok = NewPublication::new("P-1", vec!["A".into()]);
    assert!(ok.validate().is_ok());

    let cases: Vec<(NewPublication, ErrorKind)> = vec![
      (NewPublication::new("  ", vec!["A".into()]), ErrorKind::Validation),
      (NewPublication::new("P-1", vec![]), ErrorKind::Validation),
      (NewPublication::new("P-1", vec![" ".into()]), ErrorKind::Validation),
      (
        NewPublication { lawyers: vec!["".into()], ..ok.clone() },
        ErrorKind::Validation,
      ),
      (
        NewPublication { legal_fees: Some(Decimal::new(-1, 2)), ..ok.clone() },
        ErrorKind::Validation,
      ),
      (
        NewPublication {
          publication_date: NaiveDate::from_ymd_opt(2024, 2, 1),
          availability_date: NaiveDate::from_ymd_opt(2024, 1, 31),
          ..ok.clone()
        },
        ErrorKind::BusinessRule,
      ),
    ];
    for (input, kind) in cases {
      assert_eq!(input.validate().unwrap_err().kind(), kind, "{input:?}");
    }
  }

  #[test]
  fn draft_resolves_defaults() {
    let mut input = NewPublication::new(" P-9 ", vec![" Ana ".into()]);
    input.full_content = Some("conteudo".into());
    let draft = input.into_draft(at(3));
    assert_eq!(draft.process_number, "P-9");
    assert_eq!(draft.authors, vec!["Ana".to_string()]);
    assert_eq!(draft.defendant, DEFAULT_DEFENDANT);
    assert_eq!(draft.status, PublicationStatus::New);
    assert_eq!(draft.content_hash.as_deref(), Some(content_hash("conteudo").as_str()));

    let p = draft.into_publication(42);
    assert_eq!(p.id, 42);
    assert_eq!(p.updated_at, p.created_at);
  }

  #[test]
  fn supplied_hash_wins_and_missing_content_has_none() {
    let mut input = NewPublication::new("P-1", vec!["A".into()]);
    assert!(input.clone().into_draft(at(0)).content_hash.is_none());
    input.full_content = Some("x".into());
    input.content_hash = Some("abc".into());
    assert_eq!(input.into_draft(at(0)).content_hash.as_deref(), Some("abc"));
  }

  #[test]
  fn blank_content_has_no_hash() {
    let mut input = NewPublication::new("P-1", vec!["A".into()]);
    input.full_content = Some(String::new());
    assert!(input.clone().into_draft(at(0)).content_hash.is_none());
    input.full_content = Some("  \n ".into());
    assert!(input.clone().into_draft(at(0)).content_hash.is_none());
    input.full_content = Some("Intimação".into());
    assert_eq!(
      input.into_draft(at(0)).content_hash.as_deref(),
      Some(crate::hash::content_hash("Intimação").as_str())
    );
  }
}
