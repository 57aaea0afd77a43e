//! Filter store and predicate evaluation.
//!
//! Every predicate is side-effect free and total: malformed bounds never
//! panic, they simply stop constraining.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::records::{parse_finite, parse_iso_date, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring against one field.
    Contains(&'static str),
    /// Exact token match.
    Exact(&'static str),
    /// Case-insensitive substring, OR across several fields.
    Search(&'static [&'static str]),
    /// Inclusive numeric lower bound.
    Min(&'static str),
    /// Inclusive numeric upper bound.
    Max(&'static str),
    DateFrom(&'static str),
    DateTo(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDef {
    pub key: &'static str,
    pub predicate: Predicate,
}

impl FilterDef {
    pub const fn new(key: &'static str, predicate: Predicate) -> Self {
        Self { key, predicate }
    }
}

pub fn find_def<'a>(defs: &'a [FilterDef], key: &str) -> Option<&'a FilterDef> {
    defs.iter().find(|d| d.key == key)
}

/// `""`, whitespace and the `all` token leave a key unconstrained.
pub fn is_inactive(value: &str) -> bool {
    let t = value.trim();
    t.is_empty() || t.eq_ignore_ascii_case("all")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

impl Predicate {
    pub fn test<R: Record + ?Sized>(&self, record: &R, value: &str) -> bool {
        match *self {
            Predicate::Contains(path) => record
                .field(path)
                .map(|f| contains_ci(&f.as_text(), value))
                .unwrap_or(false),
            Predicate::Exact(path) => record
                .field(path)
                .map(|f| f.as_text().eq_ignore_ascii_case(value.trim()))
                .unwrap_or(false),
            Predicate::Search(paths) => paths.iter().any(|path| {
                record
                    .field(path)
                    .map(|f| contains_ci(&f.as_text(), value))
                    .unwrap_or(false)
            }),
            Predicate::Min(path) => match parse_finite(value) {
                None => true,
                Some(bound) => record
                    .field(path)
                    .and_then(|f| f.as_number())
                    .map(|n| n >= bound)
                    .unwrap_or(false),
            },
            Predicate::Max(path) => match parse_finite(value) {
                None => true,
                Some(bound) => record
                    .field(path)
                    .and_then(|f| f.as_number())
                    .map(|n| n <= bound)
                    .unwrap_or(false),
            },
            Predicate::DateFrom(path) => match parse_iso_date(value) {
                None => true,
                Some(bound) => record
                    .field(path)
                    .and_then(|f| f.as_date())
                    .map(|d| d >= bound)
                    .unwrap_or(false),
            },
            Predicate::DateTo(path) => match parse_iso_date(value) {
                None => true,
                Some(bound) => record
                    .field(path)
                    .and_then(|f| f.as_date())
                    .map(|d| d <= bound)
                    .unwrap_or(false),
            },
        }
    }
}

/// Current filter values keyed by filter key. Only active values are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSpec {
    values: BTreeMap<String, String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the effective spec changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        if is_inactive(value) {
            return self.values.remove(key).is_some();
        }
        let value = value.trim().to_string();
        match self.values.get(key) {
            Some(existing) if *existing == value => false,
            _ => {
                self.values.insert(key.to_string(), value);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// ANDs every active predicate. Keys without a definition are ignored.
pub fn matches<R: Record + ?Sized>(record: &R, spec: &FilterSpec, defs: &[FilterDef]) -> bool {
    defs.iter().all(|def| match spec.get(def.key) {
        None => true,
        Some(value) => def.predicate.test(record, value),
    })
}
