use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::entities::record::{Editable, FieldValue, Record, ResourceKind};
use crate::domain::entities::task::Task;

/// Per-status task tally attached to an employee row by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    #[serde(default)]
    pub to_do: Option<i64>,
    #[serde(default)]
    pub in_progress: Option<i64>,
    #[serde(default)]
    pub completed: Option<i64>,
    #[serde(default)]
    pub blocked: Option<i64>,
}

impl TaskCounts {
    pub fn outstanding(&self) -> i64 {
        self.to_do.unwrap_or(0) + self.in_progress.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub hire_date: NaiveDate,
    pub position: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_counts: Option<TaskCounts>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// To-do plus in-progress tasks, falling back to the plain task count.
    pub fn outstanding_tasks(&self) -> i64 {
        match &self.task_counts {
            Some(counts) => counts.outstanding(),
            None => self.task_count.unwrap_or(0),
        }
    }
}

impl Record for Employee {
    const KIND: ResourceKind = ResourceKind::Employees;
    const FIELDS: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "full_name",
        "email",
        "phone_number",
        "hire_date",
        "position",
        "department",
        "task_count",
        "outstanding_tasks",
    ];
    const SEARCH_FIELDS: &'static [&'static str] =
        &["first_name", "last_name", "email", "position", "department"];
    const DEFAULT_SORT: &'static str = "id";

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.into(),
            "first_name" => self.first_name.as_str().into(),
            "last_name" => self.last_name.as_str().into(),
            "full_name" => self.full_name().into(),
            "email" => self.email.as_str().into(),
            "phone_number" => self.phone_number.clone().into(),
            "hire_date" => self.hire_date.into(),
            "position" => self.position.as_str().into(),
            "department" => self.department.as_str().into(),
            "task_count" => self.task_count.into(),
            "outstanding_tasks" => self.outstanding_tasks().into(),
            _ => FieldValue::Null,
        }
    }
}

impl Editable for Employee {
    type Draft = EmployeeDraft;
}

/// Single-employee payload: the list row plus every task assigned to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub employee: Employee,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Writable employee fields, as sent to `create`/`update` and read from CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub hire_date: NaiveDate,
    pub position: String,
    pub department: String,
}

impl From<&Employee> for EmployeeDraft {
    fn from(employee: &Employee) -> Self {
        EmployeeDraft {
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            email: employee.email.clone(),
            phone_number: employee.phone_number.clone(),
            hire_date: employee.hire_date,
            position: employee.position.clone(),
            department: employee.department.clone(),
        }
    }
}
