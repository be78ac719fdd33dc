use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::entities::record::ResourceKind;
use crate::infra::sqlite::queries::{create_row, delete_row, get_row, list_rows, update_row};
use crate::infra::sqlite::schema::init_db;
use crate::usecase::ports::remote::{ListPage, ListParams, RemoteError, RemoteFetchAdapter};

/// Local stand-in for the REST backend, one SQLite file per store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub db_path: PathBuf,
}

impl SqliteStore {
    /// Opens the store, creating the schema and default statuses if needed.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        init_db(&db_path)?;
        Ok(SqliteStore { db_path })
    }
}

/// Client errors travel inside `anyhow` as `RemoteError`; anything else is a
/// store failure and becomes a 500.
fn into_remote(err: anyhow::Error) -> RemoteError {
    match err.downcast::<RemoteError>() {
        Ok(remote) => remote,
        Err(other) => RemoteError::internal(format!("{other:#}")),
    }
}

#[async_trait]
impl RemoteFetchAdapter for SqliteStore {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> Result<ListPage, RemoteError> {
        debug!(%kind, page = params.page, page_size = params.page_size, search = %params.search, "sqlite list");
        let (results, count) = list_rows(&self.db_path, kind, params).map_err(into_remote)?;
        Ok(ListPage { results, count })
    }

    async fn get(&self, kind: ResourceKind, id: i64) -> Result<Value, RemoteError> {
        get_row(&self.db_path, kind, id).map_err(into_remote)
    }

    async fn create(&self, kind: ResourceKind, fields: Value) -> Result<Value, RemoteError> {
        create_row(&self.db_path, kind, &fields).map_err(into_remote)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        fields: Value,
    ) -> Result<Value, RemoteError> {
        update_row(&self.db_path, kind, id, &fields).map_err(into_remote)
    }

    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<(), RemoteError> {
        delete_row(&self.db_path, kind, id).map_err(into_remote)
    }
}
