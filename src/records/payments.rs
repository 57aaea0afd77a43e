use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::{parse_finite, split_path, text, FieldValue, Record};
use crate::view::bulk::ExportColumn;
use crate::view::filter::{FilterDef, Predicate};

pub const DEFAULT_CURRENCY: &str = "USD";

token_enum!(PaymentStatus {
    Paid => "paid",
    Pending => "pending",
    Overdue => "overdue",
    Refunded => "refunded",
    Cancelled => "cancelled",
});

token_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    BankTransfer => "bank_transfer",
    Cheque => "cheque",
    Online => "online",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub school_id: String,
    pub student: StudentRef,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<String>,
    pub description: Option<String>,
}

impl Record for Payment {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match split_path(path) {
            ("id", None) => Some(FieldValue::Text(self.id.clone())),
            ("student", Some("id")) | ("student_id", None) => {
                Some(FieldValue::Text(self.student.id.clone()))
            }
            ("student", Some("full_name")) => {
                Some(FieldValue::Name(self.student.full_name.clone()))
            }
            ("amount", None) => Some(FieldValue::Number(self.amount)),
            ("currency", None) => Some(FieldValue::Text(self.currency.clone())),
            ("status", None) => Some(FieldValue::Enum(self.status.as_str())),
            ("method", None) => self.method.map(|m| FieldValue::Enum(m.as_str())),
            ("due_date", None) => self.due_date.map(FieldValue::Date),
            ("paid_at", None) => text(&self.paid_at),
            ("description", None) => text(&self.description),
            _ => None,
        }
    }
}

pub const FILTERS: &[FilterDef] = &[
    FilterDef::new(
        "search",
        Predicate::Search(&["student.full_name", "description", "id"]),
    ),
    FilterDef::new("status", Predicate::Exact("status")),
    FilterDef::new("method", Predicate::Exact("method")),
    FilterDef::new("studentId", Predicate::Exact("student_id")),
    FilterDef::new("minAmount", Predicate::Min("amount")),
    FilterDef::new("maxAmount", Predicate::Max("amount")),
    FilterDef::new("dueFrom", Predicate::DateFrom("due_date")),
    FilterDef::new("dueTo", Predicate::DateTo("due_date")),
];

pub const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::new("Payment ID", "id"),
    ExportColumn::new("Student", "student.full_name"),
    ExportColumn::new("Amount", "amount"),
    ExportColumn::new("Currency", "currency"),
    ExportColumn::new("Status", "status"),
    ExportColumn::new("Method", "method"),
    ExportColumn::new("Due Date", "due_date"),
    ExportColumn::new("Paid At", "paid_at"),
    ExportColumn::new("Description", "description"),
];

/// Amounts arrive as JSON numbers or numeric strings.
pub fn de_amount<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(d)?;
    let n = match &raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_finite(s),
        _ => None,
    };
    match n {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(serde::de::Error::custom(format!(
            "amount must be a number, got {}",
            raw
        ))),
    }
}

fn de_opt_amount<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    de_amount(d).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub student_id: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaymentPatch {
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}
