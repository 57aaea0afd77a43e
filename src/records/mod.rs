//! Typed records for every management page.
//!
//! Each entity exposes its fields to the list pipeline through [`Record::field`],
//! addressed by snake_case paths. A path may reach one level into a nested
//! structure (`student.full_name`, `schedule.day`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::view::bulk::{BulkActionKind, ExportColumn};
use crate::view::filter::FilterDef;

/// Declares a closed set of lowercase tokens stored as TEXT columns.
macro_rules! token_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn parse(s: &str) -> Option<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($token => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }

            pub fn tokens() -> String {
                Self::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(d)?;
                Self::parse(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} `{}`, expected one of: {}",
                        stringify!($name),
                        raw,
                        Self::tokens()
                    ))
                })
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let raw = value.as_str()?;
                Self::parse(raw).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} token: {}", stringify!($name), raw).into(),
                    )
                })
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }
    };
}

pub mod classes;
pub mod notifications;
pub mod payments;
pub mod students;
pub mod users;

pub use classes::SchoolClass;
pub use notifications::Notification;
pub use payments::Payment;
pub use students::Student;
pub use users::User;

/// A primitive value resolved from a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Display names compare case-insensitively.
    Name(String),
    Number(f64),
    Enum(&'static str),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) | FieldValue::Name(s) => Cow::Borrowed(s.as_str()),
            FieldValue::Enum(s) => Cow::Borrowed(s),
            FieldValue::Number(n) => Cow::Owned(format_number(*n)),
            FieldValue::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Numeric view of the value. Text that parses as a finite number counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) | FieldValue::Name(s) => parse_finite(s),
            FieldValue::Enum(_) | FieldValue::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_iso_date(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, FieldValue::Number(_))
    }
}

pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Splits `parent.child` into its two segments.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    }
}

pub(crate) fn text(v: &Option<String>) -> Option<FieldValue> {
    v.as_ref().map(|s| FieldValue::Text(s.clone()))
}

pub(crate) fn name(v: &Option<String>) -> Option<FieldValue> {
    v.as_ref().map(|s| FieldValue::Name(s.clone()))
}

pub trait Record {
    fn id(&self) -> &str;
    fn field(&self, path: &str) -> Option<FieldValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Students,
    Classes,
    Users,
    Payments,
    Notifications,
}

impl EntityKind {
    #[cfg(test)]
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Students,
        EntityKind::Classes,
        EntityKind::Users,
        EntityKind::Payments,
        EntityKind::Notifications,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "students" => Some(Self::Students),
            "classes" => Some(Self::Classes),
            "users" => Some(Self::Users),
            "payments" => Some(Self::Payments),
            "notifications" => Some(Self::Notifications),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Classes => "classes",
            Self::Users => "users",
            Self::Payments => "payments",
            Self::Notifications => "notifications",
        }
    }

    /// Singular noun used in messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Students => "student",
            Self::Classes => "class",
            Self::Users => "user",
            Self::Payments => "payment",
            Self::Notifications => "notification",
        }
    }

    pub fn filter_defs(self) -> &'static [FilterDef] {
        match self {
            Self::Students => students::FILTERS,
            Self::Classes => classes::FILTERS,
            Self::Users => users::FILTERS,
            Self::Payments => payments::FILTERS,
            Self::Notifications => notifications::FILTERS,
        }
    }

    pub fn export_columns(self) -> &'static [ExportColumn] {
        match self {
            Self::Students => students::EXPORT_COLUMNS,
            Self::Classes => classes::EXPORT_COLUMNS,
            Self::Users => users::EXPORT_COLUMNS,
            Self::Payments => payments::EXPORT_COLUMNS,
            Self::Notifications => notifications::EXPORT_COLUMNS,
        }
    }

    pub fn bulk_actions(self) -> &'static [BulkActionKind] {
        match self {
            Self::Students => &[
                BulkActionKind::Delete,
                BulkActionKind::Export,
                BulkActionKind::SetStatus,
                BulkActionKind::Transfer,
            ],
            _ => &[
                BulkActionKind::Delete,
                BulkActionKind::Export,
                BulkActionKind::SetStatus,
            ],
        }
    }

    /// Checks a status token against this entity's status set.
    pub fn parse_status(self, raw: &str) -> Option<&'static str> {
        match self {
            Self::Students => students::StudentStatus::parse(raw).map(|s| s.as_str()),
            Self::Classes => classes::ClassStatus::parse(raw).map(|s| s.as_str()),
            Self::Users => users::UserStatus::parse(raw).map(|s| s.as_str()),
            Self::Payments => payments::PaymentStatus::parse(raw).map(|s| s.as_str()),
            Self::Notifications => {
                notifications::NotificationStatus::parse(raw).map(|s| s.as_str())
            }
        }
    }

    pub fn status_tokens(self) -> String {
        match self {
            Self::Students => students::StudentStatus::tokens(),
            Self::Classes => classes::ClassStatus::tokens(),
            Self::Users => users::UserStatus::tokens(),
            Self::Payments => payments::PaymentStatus::tokens(),
            Self::Notifications => notifications::NotificationStatus::tokens(),
        }
    }
}

/// Any record the store hands back, regardless of page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyRecord {
    Student(Student),
    Class(SchoolClass),
    User(User),
    Payment(Payment),
    Notification(Notification),
}

impl AnyRecord {
    #[cfg(test)]
    pub fn kind(&self) -> EntityKind {
        match self {
            AnyRecord::Student(_) => EntityKind::Students,
            AnyRecord::Class(_) => EntityKind::Classes,
            AnyRecord::User(_) => EntityKind::Users,
            AnyRecord::Payment(_) => EntityKind::Payments,
            AnyRecord::Notification(_) => EntityKind::Notifications,
        }
    }
}

impl Record for AnyRecord {
    fn id(&self) -> &str {
        match self {
            AnyRecord::Student(r) => r.id(),
            AnyRecord::Class(r) => r.id(),
            AnyRecord::User(r) => r.id(),
            AnyRecord::Payment(r) => r.id(),
            AnyRecord::Notification(r) => r.id(),
        }
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match self {
            AnyRecord::Student(r) => r.field(path),
            AnyRecord::Class(r) => r.field(path),
            AnyRecord::User(r) => r.field(path),
            AnyRecord::Payment(r) => r.field(path),
            AnyRecord::Notification(r) => r.field(path),
        }
    }
}
