use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::record::ResourceKind;

/// Failure reported by the remote side, shaped like an HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {status})")]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
    /// Field name to validation messages, for 400 responses.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl RemoteError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        RemoteError {
            status,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn not_found() -> Self {
        RemoteError::new(404, "Not found.")
    }

    pub fn invalid_page() -> Self {
        RemoteError::new(404, "Invalid page.")
    }

    pub fn method_not_allowed(method: &str) -> Self {
        RemoteError::new(405, format!("Method \"{method}\" not allowed."))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RemoteError::new(500, message)
    }

    pub fn validation(field_errors: BTreeMap<String, Vec<String>>) -> Self {
        RemoteError {
            status: 400,
            message: "Validation failed.".to_string(),
            field_errors,
        }
    }

    /// One line per field, e.g. `email: employee with this email already exists.`
    pub fn field_detail(&self) -> Option<String> {
        if self.field_errors.is_empty() {
            return None;
        }
        let lines = self
            .field_errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect::<Vec<_>>();
        Some(lines.join("\n"))
    }
}

/// Query for one page of a resource listing. `page` is one-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: i64,
    pub page_size: i64,
    pub search: String,
    /// Comma-separated field names, `-` prefix for descending.
    pub ordering: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        ListParams {
            page: 1,
            page_size: 10,
            search: String::new(),
            ordering: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub results: Vec<Value>,
    /// Matches across all pages.
    pub count: i64,
}

#[async_trait]
pub trait RemoteFetchAdapter: Send + Sync {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> Result<ListPage, RemoteError>;

    async fn get(&self, kind: ResourceKind, id: i64) -> Result<Value, RemoteError>;

    async fn create(&self, kind: ResourceKind, fields: Value) -> Result<Value, RemoteError>;

    async fn update(&self, kind: ResourceKind, id: i64, fields: Value)
        -> Result<Value, RemoteError>;

    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<(), RemoteError>;
}
