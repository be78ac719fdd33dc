use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::entities::record::Record;

/// Writes every record, one column per entry in `R::FIELDS`. Null cells are
/// left empty. Returns the number of data rows written.
pub fn write_records<R: Record, W: Write>(records: &[R], out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(R::FIELDS)
        .context("failed to write csv header")?;
    for record in records {
        writer
            .write_record(R::FIELDS.iter().map(|field| record.field(field).display()))
            .with_context(|| format!("failed to write {} {}", R::KIND.singular(), record.id()))?;
    }
    writer.flush().context("failed to flush csv output")?;
    Ok(records.len())
}

pub fn export_to_path<R: Record>(records: &[R], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir: {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create csv: {}", path.display()))?;
    write_records(records, file)
}
