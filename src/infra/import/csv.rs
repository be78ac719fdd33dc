use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::entities::employee::{Employee, EmployeeDraft};
use crate::usecase::services::edit_service::EditService;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: Vec<i64>,
    /// `(csv line, message)` for every rejected row.
    pub rejected: Vec<(u64, String)>,
}

/// Creates one employee per CSV row through the regular write path, so the
/// backend's validation applies row by row. A bad row does not stop the rest.
pub async fn import_employees(edits: &EditService, csv_path: &Path) -> Result<ImportReport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("failed to open csv: {}", csv_path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers from csv: {}", csv_path.display()))?
        .clone();
    if headers.is_empty() {
        anyhow::bail!("csv header is required")
    }

    let mut report = ImportReport::default();
    for record in reader.records() {
        let record = record.context("failed to parse csv record")?;
        let line = record.position().map_or(0, |pos| pos.line());

        let draft: EmployeeDraft = match record.deserialize(Some(&headers)) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(line, "skipping malformed employee row: {err}");
                report.rejected.push((line, err.to_string()));
                continue;
            }
        };

        match edits.create::<Employee>(&draft).await {
            Ok(employee) => report.created.push(employee.id),
            Err(err) => {
                let message = err.field_detail().unwrap_or_else(|| err.to_string());
                report.rejected.push((line, message));
            }
        }
    }

    info!(
        created = report.created.len(),
        rejected = report.rejected.len(),
        "employee import finished: {}",
        csv_path.display()
    );
    Ok(report)
}
