use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{name, split_path, text, FieldValue, Record};
use crate::view::bulk::ExportColumn;
use crate::view::filter::{FilterDef, Predicate};

token_enum!(StudentStatus {
    Active => "active",
    Pending => "pending",
    Inactive => "inactive",
    Graduated => "graduated",
    Suspended => "suspended",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub school_id: String,
    pub class: Option<ClassRef>,
    pub full_name: String,
    pub email: Option<String>,
    pub student_no: Option<String>,
    pub guardian: Guardian,
    pub status: StudentStatus,
    pub enrolled_on: Option<NaiveDate>,
}

impl Record for Student {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match split_path(path) {
            ("id", None) => Some(FieldValue::Text(self.id.clone())),
            ("full_name", None) => Some(FieldValue::Name(self.full_name.clone())),
            ("email", None) => text(&self.email),
            ("student_no", None) => text(&self.student_no),
            ("status", None) => Some(FieldValue::Enum(self.status.as_str())),
            ("class_id", None) | ("class", Some("id")) => {
                self.class.as_ref().map(|c| FieldValue::Text(c.id.clone()))
            }
            ("class", Some("name")) => self.class.as_ref().map(|c| FieldValue::Name(c.name.clone())),
            ("guardian", Some("name")) => name(&self.guardian.name),
            ("guardian", Some("email")) => text(&self.guardian.email),
            ("guardian", Some("phone")) => text(&self.guardian.phone),
            ("enrolled_on", None) => self.enrolled_on.map(FieldValue::Date),
            _ => None,
        }
    }
}

pub const FILTERS: &[FilterDef] = &[
    FilterDef::new(
        "search",
        Predicate::Search(&["full_name", "email", "student_no"]),
    ),
    FilterDef::new("status", Predicate::Exact("status")),
    FilterDef::new("classId", Predicate::Exact("class_id")),
    FilterDef::new("name", Predicate::Contains("full_name")),
];

pub const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::new("Student ID", "id"),
    ExportColumn::new("Student No", "student_no"),
    ExportColumn::new("Full Name", "full_name"),
    ExportColumn::new("Email", "email"),
    ExportColumn::new("Class", "class.name"),
    ExportColumn::new("Status", "status"),
    ExportColumn::new("Guardian", "guardian.name"),
    ExportColumn::new("Guardian Email", "guardian.email"),
    ExportColumn::new("Guardian Phone", "guardian.phone"),
    ExportColumn::new("Enrolled On", "enrolled_on"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub student_no: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub status: Option<StudentStatus>,
    #[serde(default)]
    pub enrolled_on: Option<NaiveDate>,
}

/// Fields a caller may change on an existing student. Class moves go through transfer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub student_no: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_email: Option<String>,
    pub guardian_phone: Option<String>,
    pub status: Option<StudentStatus>,
    pub enrolled_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Student {
        Student {
            id: "s1".into(),
            school_id: "sch".into(),
            class: Some(ClassRef {
                id: "c1".into(),
                name: "Grade 4B".into(),
            }),
            full_name: "Ada Lovelace".into(),
            email: Some("ada@example.org".into()),
            student_no: Some("S-001".into()),
            guardian: Guardian {
                name: Some("Anne Byron".into()),
                email: None,
                phone: Some("555-0101".into()),
            },
            status: StudentStatus::Active,
            enrolled_on: NaiveDate::from_ymd_opt(2024, 9, 2),
        }
    }

    #[test]
    fn nested_paths_resolve_one_level() {
        let s = sample();
        assert_eq!(s.field("class.name"), Some(FieldValue::Name("Grade 4B".into())));
        assert_eq!(s.field("class_id"), Some(FieldValue::Text("c1".into())));
        assert_eq!(s.field("guardian.email"), None);
        assert_eq!(s.field("guardian.phone"), Some(FieldValue::Text("555-0101".into())));
        assert_eq!(s.field("class.name.extra"), None);
        assert_eq!(s.field("nope"), None);
    }

    #[test]
    fn patch_rejects_class_changes() {
        let err = serde_json::from_value::<StudentPatch>(serde_json::json!({ "classId": "c2" }));
        assert!(err.is_err());
    }

    #[test]
    fn status_token_parses_case_insensitively() {
        assert_eq!(StudentStatus::parse(" Graduated "), Some(StudentStatus::Graduated));
        let parsed: StudentStatus = serde_json::from_value(serde_json::json!("pending")).expect("token");
        assert_eq!(parsed, StudentStatus::Pending);
    }
}
