use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Employees,
    Tasks,
    TaskStatuses,
    Users,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Employees => "employees",
            ResourceKind::Tasks => "tasks",
            ResourceKind::TaskStatuses => "task-statuses",
            ResourceKind::Users => "users",
        }
    }

    /// Human-readable plural used in status messages.
    pub fn noun(&self) -> &'static str {
        match self {
            ResourceKind::Employees => "employees",
            ResourceKind::Tasks => "tasks",
            ResourceKind::TaskStatuses => "task statuses",
            ResourceKind::Users => "users",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            ResourceKind::Employees => "employee",
            ResourceKind::Tasks => "task",
            ResourceKind::TaskStatuses => "task status",
            ResourceKind::Users => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "employees" => Ok(ResourceKind::Employees),
            "tasks" => Ok(ResourceKind::Tasks),
            "task-statuses" => Ok(ResourceKind::TaskStatuses),
            "users" => Ok(ResourceKind::Users),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Scalar cell value as seen by the filter/sort engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Plain rendering, empty for null.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => format_number(*number),
            FieldValue::Date(date) => date.format(DATE_FORMAT).to_string(),
        }
    }

    /// Key used by exact-match filters: trimmed and lowercased text, canonical
    /// renderings for numbers and dates. `None` for null.
    pub fn exact_key(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(text) => Some(text.trim().to_lowercase()),
            other => Some(other.display()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Dates parse from `YYYY-MM-DD`, also when followed by a time part.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(text) => parse_date_prefix(text.trim()),
            _ => None,
        }
    }
}

fn parse_date_prefix(text: &str) -> Option<NaiveDate> {
    let head = text.get(..10)?;
    let rest = &text[10..];
    if !rest.is_empty() && !rest.starts_with([' ', 'T']) {
        return None;
    }
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A typed row the list pipeline can filter and sort by field name.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;
    /// Every name `field` answers for; anything else reads as null.
    const FIELDS: &'static [&'static str];
    /// Fields the local search box looks at.
    const SEARCH_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;

    fn id(&self) -> i64;

    fn field(&self, name: &str) -> FieldValue;

    fn has_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }
}

/// A record the edit forms can write. `Draft` holds exactly the fields
/// `create` and `update` accept.
pub trait Editable: Record {
    type Draft: Serialize + for<'a> From<&'a Self>;
}
