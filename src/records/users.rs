use serde::{Deserialize, Serialize};

use super::{split_path, FieldValue, Record};
use crate::view::bulk::ExportColumn;
use crate::view::filter::{FilterDef, Predicate};

token_enum!(Role {
    Admin => "admin",
    Teacher => "teacher",
    Staff => "staff",
    Parent => "parent",
    Accountant => "accountant",
});

token_enum!(UserStatus {
    Active => "active",
    Invited => "invited",
    Disabled => "disabled",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub school_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, path: &str) -> Option<FieldValue> {
        match split_path(path) {
            ("id", None) => Some(FieldValue::Text(self.id.clone())),
            ("full_name", None) => Some(FieldValue::Name(self.full_name.clone())),
            ("email", None) => Some(FieldValue::Text(self.email.clone())),
            ("role", None) => Some(FieldValue::Enum(self.role.as_str())),
            ("status", None) => Some(FieldValue::Enum(self.status.as_str())),
            ("created_at", None) => Some(FieldValue::Text(self.created_at.clone())),
            _ => None,
        }
    }
}

pub const FILTERS: &[FilterDef] = &[
    FilterDef::new("search", Predicate::Search(&["full_name", "email"])),
    FilterDef::new("role", Predicate::Exact("role")),
    FilterDef::new("status", Predicate::Exact("status")),
];

pub const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::new("User ID", "id"),
    ExportColumn::new("Full Name", "full_name"),
    ExportColumn::new("Email", "email"),
    ExportColumn::new("Role", "role"),
    ExportColumn::new("Status", "status"),
    ExportColumn::new("Created", "created_at"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}
