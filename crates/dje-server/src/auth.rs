//! HTTP Basic authentication for the `/api` tree.
//!
//! One username and an argon2 PHC hash come from [`crate::ServerConfig`].
//! Every refusal answers the same 401; the concrete reason is only logged.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;

use crate::error::Error;

/// The single account allowed to call the API.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  pub password_hash: String,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
  MissingHeader,
  NotBasic,
  Malformed,
  UnknownUser,
  WrongPassword,
  /// The configured hash is not a PHC string.
  UnusableHash,
}

impl Refusal {
  fn as_str(self) -> &'static str {
    match self {
      Self::MissingHeader => "missing authorization header",
      Self::NotBasic => "not a basic authorization",
      Self::Malformed => "malformed basic credentials",
      Self::UnknownUser => "unknown user",
      Self::WrongPassword => "wrong password",
      Self::UnusableHash => "configured password hash is unusable",
    }
  }
}

/// Decoded `user:password` pair of a Basic `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl Credentials {
  /// The auth scheme is matched case-insensitively.
  pub fn from_headers(headers: &HeaderMap) -> Result<Self, Refusal> {
    let value = headers
      .get(header::AUTHORIZATION)
      .ok_or(Refusal::MissingHeader)?
      .to_str()
      .map_err(|_| Refusal::Malformed)?;
    let (scheme, token) = value.trim().split_once(' ').ok_or(Refusal::NotBasic)?;
    if !scheme.eq_ignore_ascii_case("basic") {
      return Err(Refusal::NotBasic);
    }
    let decoded = B64.decode(token.trim()).map_err(|_| Refusal::Malformed)?;
    let pair = String::from_utf8(decoded).map_err(|_| Refusal::Malformed)?;
    let (username, password) = pair.split_once(':').ok_or(Refusal::Malformed)?;
    Ok(Self { username: username.to_owned(), password: password.to_owned() })
  }
}

impl AuthConfig {
  pub fn check(&self, credentials: &Credentials) -> Result<(), Refusal> {
    if credentials.username != self.username {
      return Err(Refusal::UnknownUser);
    }
    let hash = PasswordHash::new(&self.password_hash).map_err(|_| Refusal::UnusableHash)?;
    Argon2::default()
      .verify_password(credentials.password.as_bytes(), &hash)
      .map_err(|_| Refusal::WrongPassword)
  }
}

/// Check the request headers against `config`, logging refusals with `path`.
pub fn verify_auth(headers: &HeaderMap, path: &str, config: &AuthConfig) -> Result<(), Error> {
  Credentials::from_headers(headers)
    .and_then(|credentials| config.check(&credentials))
    .map_err(|refusal| {
      if refusal == Refusal::UnusableHash {
        tracing::error!(path, reason = refusal.as_str(), "credentials rejected");
      } else {
        tracing::warn!(path, reason = refusal.as_str(), "credentials rejected");
      }
      Error::Unauthorized
    })
}

/// Middleware guarding every route it wraps.
pub async fn require_auth(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  verify_auth(req.headers(), req.uri().path(), &config)?;
  Ok(next.run(req).await)
}

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn config() -> AuthConfig {
    AuthConfig {
      username:      "scraper".to_string(),
      password_hash: hash_password("s3cret:with-colon").unwrap(),
    }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(pair: &str) -> HeaderMap { headers(&format!("Basic {}", B64.encode(pair))) }

  #[test]
  fn password_may_contain_colons() {
    let creds = Credentials::from_headers(&basic("scraper:s3cret:with-colon")).unwrap();
    assert_eq!(creds.password, "s3cret:with-colon");
    assert!(verify_auth(&basic("scraper:s3cret:with-colon"), "/api", &config()).is_ok());
  }

  #[test]
  fn scheme_is_case_insensitive() {
    let value = format!("basic {}", B64.encode("scraper:s3cret:with-colon"));
    assert!(config().check(&Credentials::from_headers(&headers(&value)).unwrap()).is_ok());
  }

  #[test]
  fn refusal_reasons() {
    let cfg = config();
    let refuse = |h: &HeaderMap| Credentials::from_headers(h).and_then(|c| cfg.check(&c));
    assert_eq!(refuse(&HeaderMap::new()), Err(Refusal::MissingHeader));
    assert_eq!(refuse(&headers("Bearer abc")), Err(Refusal::NotBasic));
    assert_eq!(refuse(&headers("Basic !!!not-base64!!!")), Err(Refusal::Malformed));
    assert_eq!(refuse(&basic("no-colon")), Err(Refusal::Malformed));
    assert_eq!(refuse(&basic("admin:s3cret:with-colon")), Err(Refusal::UnknownUser));
    assert_eq!(refuse(&basic("scraper:wrong")), Err(Refusal::WrongPassword));
  }

  #[test]
  fn plaintext_hash_never_matches() {
    let cfg = AuthConfig { username: "scraper".into(), password_hash: "plaintext".into() };
    let creds = Credentials::from_headers(&basic("scraper:plaintext")).unwrap();
    assert_eq!(cfg.check(&creds), Err(Refusal::UnusableHash));
    assert!(matches!(verify_auth(&basic("scraper:plaintext"), "/api", &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn hashes_are_salted() {
    let a = hash_password("pw").unwrap();
    assert!(a.starts_with("$argon2id$"));
    assert_ne!(a, hash_password("pw").unwrap());
  }
}
