use serde::{Deserialize, Serialize};

use super::{split_path, text, FieldValue, Record};
use crate::view::bulk::ExportColumn;
use crate::view::filter::{FilterDef, Predicate};

token_enum!(Channel {
    Email => "email",
    Sms => "sms",
    Push => "push",
    InApp => "in_app",
});

token_enum!(NotificationStatus {
    Draft => "draft",
    Scheduled => "scheduled",
    Sent => "sent",
    Failed => "failed",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub school_id: String,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub audience: String,
    pub recipient_count: i64,
    pub status: NotificationStatus,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match split_path(path) {
            ("id", None) => Some(FieldValue::Text(self.id.clone())),
            ("title", None) => Some(FieldValue::Name(self.title.clone())),
            ("message", None) => Some(FieldValue::Text(self.message.clone())),
            ("channel", None) => Some(FieldValue::Enum(self.channel.as_str())),
            ("audience", None) => Some(FieldValue::Text(self.audience.clone())),
            ("recipient_count", None) => Some(FieldValue::Number(self.recipient_count as f64)),
            ("status", None) => Some(FieldValue::Enum(self.status.as_str())),
            ("sent_at", None) => text(&self.sent_at),
            ("created_at", None) => Some(FieldValue::Text(self.created_at.clone())),
            _ => None,
        }
    }
}

pub const FILTERS: &[FilterDef] = &[
    FilterDef::new("search", Predicate::Search(&["title", "message"])),
    FilterDef::new("channel", Predicate::Exact("channel")),
    FilterDef::new("status", Predicate::Exact("status")),
    FilterDef::new("audience", Predicate::Contains("audience")),
];

pub const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::new("Notification ID", "id"),
    ExportColumn::new("Title", "title"),
    ExportColumn::new("Channel", "channel"),
    ExportColumn::new("Audience", "audience"),
    ExportColumn::new("Recipients", "recipient_count"),
    ExportColumn::new("Status", "status"),
    ExportColumn::new("Sent At", "sent_at"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub channel: Channel,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub recipient_count: Option<i64>,
    #[serde(default)]
    pub status: Option<NotificationStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub channel: Option<Channel>,
    pub audience: Option<String>,
    pub recipient_count: Option<i64>,
    pub status: Option<NotificationStatus>,
}
