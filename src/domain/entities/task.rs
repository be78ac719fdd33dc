use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::entities::record::{Editable, FieldValue, Record, ResourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub assigned_to_name: Option<String>,
    #[serde(default)]
    pub assigned_by: Option<i64>,
    #[serde(default)]
    pub assigned_by_name: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Record for Task {
    const KIND: ResourceKind = ResourceKind::Tasks;
    const FIELDS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "assigned_to",
        "assigned_to_name",
        "assigned_by",
        "assigned_by_name",
        "status",
        "status_name",
        "due_date",
        "created_at",
        "updated_at",
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["title", "description", "status_name", "assigned_to_name"];
    const DEFAULT_SORT: &'static str = "due_date";

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.into(),
            "title" => self.title.as_str().into(),
            "description" => self.description.clone().into(),
            "assigned_to" => self.assigned_to.into(),
            "assigned_to_name" => self.assigned_to_name.clone().into(),
            "assigned_by" => self.assigned_by.into(),
            "assigned_by_name" => self.assigned_by_name.clone().into(),
            "status" => self.status.into(),
            "status_name" => self.status_name.clone().into(),
            "due_date" => self.due_date.into(),
            "created_at" => self.created_at.as_str().into(),
            "updated_at" => self.updated_at.as_str().into(),
            _ => FieldValue::Null,
        }
    }
}

impl Editable for Task {
    type Draft = TaskDraft;
}

/// Writable task fields. References are ids; names are read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub assigned_by: Option<i64>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        TaskDraft {
            title: task.title.clone(),
            description: task.description.clone(),
            assigned_to: task.assigned_to,
            assigned_by: task.assigned_by,
            status: task.status,
            due_date: task.due_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for TaskStatus {
    const KIND: ResourceKind = ResourceKind::TaskStatuses;
    const FIELDS: &'static [&'static str] = &["id", "name", "description"];
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];
    const DEFAULT_SORT: &'static str = "name";

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "description" => self.description.clone().into(),
            _ => FieldValue::Null,
        }
    }
}

/// Read-only account referenced by `Task::assigned_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Record for User {
    const KIND: ResourceKind = ResourceKind::Users;
    const FIELDS: &'static [&'static str] = &["id", "username", "first_name", "last_name"];
    const SEARCH_FIELDS: &'static [&'static str] = &["username", "first_name", "last_name"];
    const DEFAULT_SORT: &'static str = "username";

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.into(),
            "username" => self.username.as_str().into(),
            "first_name" => self.first_name.as_str().into(),
            "last_name" => self.last_name.as_str().into(),
            _ => FieldValue::Null,
        }
    }
}
