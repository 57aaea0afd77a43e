use serde::Serialize;
use std::cmp::Ordering;

use crate::records::{FieldValue, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn apply(self, base: Ordering) -> Ordering {
        match self {
            Self::Asc => base,
            Self::Desc => base.reverse(),
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortConfig {
    pub key: String,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }
}

/// Ascending base order.
///
/// A missing or uncoercible value sorts after every present one; two missing
/// values are equal. Numbers win over text: if either side is numeric both are
/// coerced, so `"10"` lands after `"9"`.
pub fn compare_values(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };

    if a.is_number() || b.is_number() {
        return match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
    }

    match (a, b) {
        (FieldValue::Date(x), FieldValue::Date(y)) => x.cmp(y),
        (FieldValue::Name(_), _) | (_, FieldValue::Name(_)) => a
            .as_text()
            .to_lowercase()
            .cmp(&b.as_text().to_lowercase()),
        _ => a.as_text().cmp(&b.as_text()),
    }
}

/// Direction flips the sign of the whole base comparison, missing values included.
pub fn compare<R: Record + ?Sized>(a: &R, b: &R, sort: &SortConfig) -> Ordering {
    let base = compare_values(a.field(&sort.key).as_ref(), b.field(&sort.key).as_ref());
    sort.direction.apply(base)
}

/// Stable in-place sort of record indices.
pub fn sort_indices<R: Record>(records: &[R], indices: &mut [usize], sort: &SortConfig) {
    indices.sort_by(|&i, &j| compare(&records[i], &records[j], sort));
}
