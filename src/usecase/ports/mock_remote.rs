//! In-memory adapter for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::remote::{ListPage, ListParams, RemoteError, RemoteFetchAdapter};
use crate::domain::entities::record::ResourceKind;

#[derive(Default)]
struct MockState {
    rows: HashMap<ResourceKind, Vec<Value>>,
    next_id: i64,
    fail_lists: bool,
    fail_deletes: bool,
    list_calls: Vec<ListParams>,
}

#[derive(Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(kind: ResourceKind, rows: Vec<Value>) -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().expect("mock state should lock");
            state.next_id = rows
                .iter()
                .filter_map(|row| row["id"].as_i64())
                .max()
                .unwrap_or(0);
            state.rows.insert(kind, rows);
        }
        mock
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.state.lock().expect("mock state should lock").fail_lists = fail;
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.state.lock().expect("mock state should lock").fail_deletes = fail;
    }

    pub fn list_calls(&self) -> Vec<ListParams> {
        self.state.lock().expect("mock state should lock").list_calls.clone()
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .expect("mock state should lock")
            .rows
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

fn row_matches(row: &Value, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    row.as_object().is_some_and(|fields| {
        fields
            .values()
            .filter_map(Value::as_str)
            .any(|text| text.to_lowercase().contains(&needle))
    })
}

#[async_trait]
impl RemoteFetchAdapter for MockRemote {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> Result<ListPage, RemoteError> {
        let mut state = self.state.lock().expect("mock state should lock");
        state.list_calls.push(params.clone());
        if state.fail_lists {
            return Err(RemoteError::internal("list unavailable"));
        }

        let matching: Vec<Value> = state
            .rows
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row_matches(row, &params.search))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let offset = ((params.page.max(1) - 1) * params.page_size) as usize;
        let results = matching
            .iter()
            .skip(offset)
            .take(params.page_size as usize)
            .cloned()
            .collect();
        Ok(ListPage {
            results,
            count: matching.len() as i64,
        })
    }

    async fn get(&self, kind: ResourceKind, id: i64) -> Result<Value, RemoteError> {
        let state = self.state.lock().expect("mock state should lock");
        state
            .rows
            .get(&kind)
            .and_then(|rows| rows.iter().find(|row| row["id"].as_i64() == Some(id)))
            .cloned()
            .ok_or_else(RemoteError::not_found)
    }

    async fn create(&self, kind: ResourceKind, mut fields: Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock().expect("mock state should lock");
        state.next_id += 1;
        fields["id"] = Value::from(state.next_id);
        state.rows.entry(kind).or_default().push(fields.clone());
        Ok(fields)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        mut fields: Value,
    ) -> Result<Value, RemoteError> {
        let mut state = self.state.lock().expect("mock state should lock");
        let row = state
            .rows
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|row| row["id"].as_i64() == Some(id)))
            .ok_or_else(RemoteError::not_found)?;
        fields["id"] = Value::from(id);
        *row = fields.clone();
        Ok(fields)
    }

    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<(), RemoteError> {
        let mut state = self.state.lock().expect("mock state should lock");
        if state.fail_deletes {
            return Err(RemoteError::internal("delete rejected"));
        }
        let rows = state.rows.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|row| row["id"].as_i64() != Some(id));
        if rows.len() == before {
            return Err(RemoteError::not_found());
        }
        Ok(())
    }
}
