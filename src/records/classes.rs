use serde::{Deserialize, Serialize};

use super::{name, split_path, text, FieldValue, Record};
use crate::view::bulk::ExportColumn;
use crate::view::filter::{FilterDef, Predicate};

pub const DEFAULT_CAPACITY: i64 = 30;

token_enum!(ClassStatus {
    Active => "active",
    Inactive => "inactive",
    Archived => "archived",
});

token_enum!(Weekday {
    Monday => "monday",
    Tuesday => "tuesday",
    Wednesday => "wednesday",
    Thursday => "thursday",
    Friday => "friday",
    Saturday => "saturday",
    Sunday => "sunday",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub day: Weekday,
    /// `HH:MM`, 24 hour.
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub grade_level: Option<i64>,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
    pub capacity: i64,
    pub enrolled: i64,
    pub status: ClassStatus,
    pub schedule: Option<Schedule>,
}

impl Record for SchoolClass {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match split_path(path) {
            ("id", None) => Some(FieldValue::Text(self.id.clone())),
            ("name", None) => Some(FieldValue::Name(self.name.clone())),
            ("grade_level", None) => self.grade_level.map(|g| FieldValue::Number(g as f64)),
            ("teacher_name", None) => name(&self.teacher_name),
            ("room", None) => text(&self.room),
            ("capacity", None) => Some(FieldValue::Number(self.capacity as f64)),
            ("enrolled", None) => Some(FieldValue::Number(self.enrolled as f64)),
            ("seats_left", None) => {
                Some(FieldValue::Number((self.capacity - self.enrolled).max(0) as f64))
            }
            ("status", None) => Some(FieldValue::Enum(self.status.as_str())),
            ("schedule", Some("day")) => self
                .schedule
                .as_ref()
                .map(|s| FieldValue::Enum(s.day.as_str())),
            ("schedule", Some("start")) => self.schedule.as_ref().and_then(|s| text(&s.start)),
            ("schedule", Some("end")) => self.schedule.as_ref().and_then(|s| text(&s.end)),
            _ => None,
        }
    }
}

pub const FILTERS: &[FilterDef] = &[
    FilterDef::new("search", Predicate::Search(&["name", "teacher_name", "room"])),
    FilterDef::new("status", Predicate::Exact("status")),
    FilterDef::new("gradeLevel", Predicate::Exact("grade_level")),
    FilterDef::new("teacher", Predicate::Contains("teacher_name")),
    FilterDef::new("day", Predicate::Exact("schedule.day")),
];

pub const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::new("Class ID", "id"),
    ExportColumn::new("Name", "name"),
    ExportColumn::new("Grade", "grade_level"),
    ExportColumn::new("Teacher", "teacher_name"),
    ExportColumn::new("Room", "room"),
    ExportColumn::new("Enrolled", "enrolled"),
    ExportColumn::new("Capacity", "capacity"),
    ExportColumn::new("Status", "status"),
    ExportColumn::new("Day", "schedule.day"),
    ExportColumn::new("Start", "schedule.start"),
    ExportColumn::new("End", "schedule.end"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    #[serde(default)]
    pub grade_level: Option<i64>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub status: Option<ClassStatus>,
    #[serde(default)]
    pub schedule_day: Option<Weekday>,
    #[serde(default)]
    pub schedule_start: Option<String>,
    #[serde(default)]
    pub schedule_end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub grade_level: Option<i64>,
    pub teacher_name: Option<String>,
    pub room: Option<String>,
    pub capacity: Option<i64>,
    pub status: Option<ClassStatus>,
    pub schedule_day: Option<Weekday>,
    pub schedule_start: Option<String>,
    pub schedule_end: Option<String>,
}

/// Accepts `H:MM` or `HH:MM` and normalizes to `HH:MM`.
pub fn normalize_clock(raw: &str) -> Option<String> {
    let t = chrono::NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()?;
    Some(t.format("%H:%M").to_string())
}
