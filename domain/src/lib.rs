//! Domain library for the weighted redirector.
//!
//! Holds the domain types, the settings sanitizer, the weighted selector, the
//! ports (traits) implemented by storage and link-registry adapters, and the
//! error definitions. Keep HTTP and database concerns out of this crate.

use std::time::SystemTime;

use serde::Deserialize;
use thiserror::Error;

/// A path keyword identifying a redirect list, in canonical form.
///
/// Canonical means: non-empty, only `[A-Za-z0-9_/-]`, no leading or trailing
/// `/`, and no doubled `/`. Use [`sanitize::sanitize_keyword`] to normalize
/// raw input into this form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword(String);

impl Keyword {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.is_empty() {
            return Err(CoreError::InvalidKeyword("empty".into()));
        }
        if !val
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/')
        {
            return Err(CoreError::InvalidKeyword(format!(
                "invalid characters in '{}'",
                val
            )));
        }
        if val.starts_with('/') || val.ends_with('/') || val.contains("//") {
            return Err(CoreError::InvalidKeyword(format!(
                "misplaced '/' in '{}'",
                val
            )));
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One destination of a redirect list.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub url: String,
    /// Relative likelihood; finite and `>= 0` once sanitized. Zero disables the entry.
    pub weight: f64,
}

impl Entry {
    pub fn new<S: Into<String>>(url: S, weight: f64) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }
}

/// A validated redirect list as persisted by the settings store.
#[derive(Clone, Debug, PartialEq)]
pub struct RedirectList {
    pub keyword: Keyword,
    /// Disabled lists never redirect.
    pub enabled: bool,
    /// Set by the service when the list is saved.
    pub updated_at: Option<SystemTime>,
    entries: Vec<Entry>,
}

impl RedirectList {
    /// Build a list from already-validated entries. Rejects an empty entry set.
    pub fn new(keyword: Keyword, entries: Vec<Entry>, enabled: bool) -> Result<Self, CoreError> {
        if entries.is_empty() {
            return Err(CoreError::EmptyList(keyword.as_str().to_string()));
        }
        Ok(Self {
            keyword,
            enabled,
            updated_at: None,
            entries,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Canonical target handed to the link registry: the first URL of the list.
    pub fn first_url(&self) -> &str {
        // Non-empty by construction.
        self.entries.first().map(|e| e.url.as_str()).unwrap_or_default()
    }

    /// Convert back into the untrusted submission shape.
    pub fn to_raw(&self) -> RawList {
        RawList {
            keyword: self.keyword.as_str().to_string(),
            urls: self.entries.iter().map(|e| e.url.clone()).collect(),
            weights: self
                .entries
                .iter()
                .map(|e| RawWeight::Number(e.weight))
                .collect(),
            enabled: self.enabled,
        }
    }
}

/// A weight as it arrives from a form or JSON body.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawWeight {
    Number(f64),
    Text(String),
    Missing,
}

impl From<f64> for RawWeight {
    fn from(v: f64) -> Self {
        RawWeight::Number(v)
    }
}

impl From<&str> for RawWeight {
    fn from(v: &str) -> Self {
        RawWeight::Text(v.to_string())
    }
}

/// Untrusted input for one redirect list.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawList {
    pub keyword: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub weights: Vec<RawWeight>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Source of uniform integer draws. Implementations must be safe to share
/// across concurrent requests.
pub trait RandomSource: Send + Sync {
    /// Uniform draw over `0..=upper`.
    fn draw(&self, upper: u32) -> u32;
}

/// Settings store port: the canonical keyword -> list map.
pub trait RedirectStore: Send + Sync {
    fn get(&self, keyword: &Keyword) -> Result<Option<RedirectList>, CoreError>;
    /// Insert or replace the whole list stored under `list.keyword`.
    fn put(&self, list: RedirectList) -> Result<(), CoreError>;
    /// Remove a list; `NotFound` if there was none.
    fn delete(&self, keyword: &Keyword) -> Result<(), CoreError>;
    /// All lists ordered by keyword.
    fn list(&self) -> Result<Vec<RedirectList>, CoreError>;
}

/// External shortlink registry. Holds an independent keyword -> URL mapping.
pub trait LinkRegistry: Send + Sync {
    /// URL currently mapped to `keyword`, if any.
    fn lookup(&self, keyword: &Keyword) -> Result<Option<String>, CoreError>;
    fn create(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError>;
    fn update(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError>;
}

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid keyword: {0}")]
    InvalidKeyword(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("no valid urls for keyword '{0}'")]
    EmptyList(String),
    #[error("duplicate keyword '{0}'")]
    DuplicateKeyword(String),
    #[error("keyword '{0}' is reserved")]
    ReservedKeyword(String),
    #[error("not found")]
    NotFound,
    #[error("repository error: {0}")]
    Repository(String),
    #[error("link registry error: {0}")]
    Registry(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - weighted redirect core", pkg, ver)
}

pub mod adapters;
pub mod random;
pub mod sanitize;
pub mod select;
pub mod service;
pub mod validate;
