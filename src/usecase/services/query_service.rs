use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::entities::employee::EmployeeDetail;
use crate::domain::entities::record::{Record, ResourceKind};
use crate::usecase::ports::remote::{ListParams, RemoteError, RemoteFetchAdapter};

/// Read side of the remote API, decoding raw payloads into typed records.
#[derive(Clone)]
pub struct QueryService {
    remote: Arc<dyn RemoteFetchAdapter>,
}

impl QueryService {
    pub fn new(remote: Arc<dyn RemoteFetchAdapter>) -> Self {
        Self { remote }
    }

    /// Fetches one batch for `params`. A batch that does not hold every match
    /// is returned as-is and logged.
    pub async fn fetch_source_set<R: Record>(
        &self,
        params: &ListParams,
    ) -> Result<Vec<R>, RemoteError> {
        let page = self.remote.list(R::KIND, params).await?;
        if page.count > page.results.len() as i64 && params.page == 1 {
            warn!(
                kind = %R::KIND,
                count = page.count,
                fetched = page.results.len(),
                "source set truncated by fetch batch size"
            );
        }
        let records = page
            .results
            .into_iter()
            .map(decode_record::<R>)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(kind = %R::KIND, rows = records.len(), search = %params.search, "fetched source set");
        Ok(records)
    }

    pub async fn get<R: Record>(&self, id: i64) -> Result<R, RemoteError> {
        let payload = self.remote.get(R::KIND, id).await?;
        decode_record(payload)
    }

    /// One employee with the tasks assigned to them.
    pub async fn employee_detail(&self, id: i64) -> Result<EmployeeDetail, RemoteError> {
        let payload = self.remote.get(ResourceKind::Employees, id).await?;
        serde_json::from_value(payload)
            .map_err(|err| RemoteError::new(502, format!("malformed employee payload: {err}")))
    }
}

pub(crate) fn decode_record<R: Record>(payload: Value) -> Result<R, RemoteError> {
    serde_json::from_value(payload)
        .map_err(|err| RemoteError::new(502, format!("malformed {} payload: {err}", R::KIND.noun())))
}
