use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::entities::record::{Editable, Record, ResourceKind};
use crate::usecase::ports::remote::{RemoteError, RemoteFetchAdapter};
use crate::usecase::services::query_service::decode_record;

/// Write side of the remote API.
#[derive(Clone)]
pub struct EditService {
    remote: Arc<dyn RemoteFetchAdapter>,
}

impl EditService {
    pub fn new(remote: Arc<dyn RemoteFetchAdapter>) -> Self {
        Self { remote }
    }

    pub async fn create<R: Record>(&self, draft: &impl Serialize) -> Result<R, RemoteError> {
        let fields = encode_fields(draft)?;
        match self.remote.create(R::KIND, fields).await {
            Ok(payload) => {
                let record: R = decode_record(payload)?;
                info!(kind = %R::KIND, id = record.id(), "record created");
                Ok(record)
            }
            Err(err) => {
                warn!(kind = %R::KIND, status = err.status, "create rejected: {err}");
                Err(err)
            }
        }
    }

    pub async fn update<R: Record>(
        &self,
        id: i64,
        draft: &impl Serialize,
    ) -> Result<R, RemoteError> {
        let fields = encode_fields(draft)?;
        match self.remote.update(R::KIND, id, fields).await {
            Ok(payload) => {
                info!(kind = %R::KIND, id, "record updated");
                decode_record(payload)
            }
            Err(err) => {
                warn!(kind = %R::KIND, id, status = err.status, "update rejected: {err}");
                Err(err)
            }
        }
    }

    /// Loads `id`, overlays `changes` on its writable fields and saves the
    /// full record. A blank value clears the field.
    pub async fn apply_changes<R: Editable>(
        &self,
        id: i64,
        changes: &[(String, String)],
    ) -> Result<R, RemoteError> {
        let current: R = decode_record(self.remote.get(R::KIND, id).await?)?;
        let Value::Object(mut fields) = encode_fields(&R::Draft::from(&current))? else {
            return Err(RemoteError::internal("draft did not encode to an object"));
        };

        let mut unknown: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, text) in changes {
            match fields.get_mut(field) {
                Some(slot) => *slot = form_value(text),
                None => unknown
                    .entry(field.clone())
                    .or_default()
                    .push("Not a writable field.".to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(RemoteError::validation(unknown));
        }

        self.update::<R>(id, &Value::Object(fields)).await
    }

    pub async fn delete(&self, kind: ResourceKind, id: i64) -> Result<(), RemoteError> {
        match self.remote.delete(kind, id).await {
            Ok(()) => {
                info!(%kind, id, "record deleted");
                Ok(())
            }
            Err(err) => {
                warn!(%kind, id, status = err.status, "delete rejected: {err}");
                Err(err)
            }
        }
    }
}

fn form_value(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

fn encode_fields(draft: &impl Serialize) -> Result<Value, RemoteError> {
    serde_json::to_value(draft)
        .map_err(|err| RemoteError::new(400, format!("unserializable fields: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::employee::{Employee, EmployeeDraft};
    use crate::usecase::ports::mock_remote::MockRemote;
    use chrono::NaiveDate;

    fn draft() -> EmployeeDraft {
        EmployeeDraft {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone_number: None,
            hire_date: NaiveDate::from_ymd_opt(2020, 3, 1).expect("should build date"),
            position: "Admiral".to_string(),
            department: "Navy".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_update_round_trips_through_remote() {
        let mock = MockRemote::new();
        let service = EditService::new(Arc::new(mock.clone()));

        let created: Employee = service
            .create(&draft())
            .await
            .expect("should create employee");
        assert_eq!(created.id, 1);

        let mut changed = draft();
        changed.department = "Research".to_string();
        let updated: Employee = service
            .update(created.id, &changed)
            .await
            .expect("should update employee");

        assert_eq!(updated.department, "Research");
        assert_eq!(mock.len(ResourceKind::Employees), 1);
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let service = EditService::new(Arc::new(MockRemote::new()));

        let err = service
            .delete(ResourceKind::Tasks, 42)
            .await
            .expect_err("missing task should fail");

        assert_eq!(err.status, 404);
    }

    #[tokio::test]
    async fn apply_changes_overlays_fields_on_the_stored_record() {
        let mock = MockRemote::new();
        let service = EditService::new(Arc::new(mock.clone()));
        let created: Employee = service
            .create(&draft())
            .await
            .expect("should create employee");

        let changes = vec![
            ("department".to_string(), " Research ".to_string()),
            ("phone_number".to_string(), "555-0100".to_string()),
        ];
        let updated: Employee = service
            .apply_changes(created.id, &changes)
            .await
            .expect("should apply changes");

        assert_eq!(updated.department, "Research");
        assert_eq!(updated.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(updated.email, "grace@example.com");
    }

    #[tokio::test]
    async fn apply_changes_rejects_fields_outside_the_form() {
        let mock = MockRemote::new();
        let service = EditService::new(Arc::new(mock.clone()));
        let created: Employee = service
            .create(&draft())
            .await
            .expect("should create employee");

        let changes = vec![("task_count".to_string(), "9".to_string())];
        let err = service
            .apply_changes::<Employee>(created.id, &changes)
            .await
            .expect_err("read-only field should be rejected");

        assert_eq!(err.status, 400);
        assert_eq!(err.field_errors["task_count"], vec!["Not a writable field."]);
    }
}
