use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::domain::entities::record::ResourceKind;
use crate::infra::sqlite::schema::open_connection;
use crate::infra::sqlite::validate::{is_valid_email, FieldValidator};
use crate::usecase::ports::remote::{ListParams, RemoteError};

/// How one resource is read: joined columns, searchable expressions and the
/// orderings a client may ask for.
struct Table {
    name: &'static str,
    alias: &'static str,
    columns: &'static str,
    from: &'static str,
    search: &'static [&'static str],
    /// Client-visible ordering name to SQL expression.
    orderings: &'static [(&'static str, &'static str)],
    default_ordering: &'static [&'static str],
}

const EMPLOYEES: Table = Table {
    name: "employee",
    alias: "e",
    columns: "e.id, e.first_name, e.last_name, e.email, e.phone_number, e.hire_date,
        e.position, e.department,
        (SELECT COUNT(*) FROM task t WHERE t.assigned_to = e.id) AS task_count,
        (SELECT COUNT(*) FROM task t JOIN task_status s ON s.id = t.status
            WHERE t.assigned_to = e.id AND s.name = 'To Do') AS to_do,
        (SELECT COUNT(*) FROM task t JOIN task_status s ON s.id = t.status
            WHERE t.assigned_to = e.id AND s.name = 'In Progress') AS in_progress,
        (SELECT COUNT(*) FROM task t JOIN task_status s ON s.id = t.status
            WHERE t.assigned_to = e.id AND s.name = 'Completed') AS completed,
        (SELECT COUNT(*) FROM task t JOIN task_status s ON s.id = t.status
            WHERE t.assigned_to = e.id AND s.name = 'Blocked') AS blocked",
    from: "FROM employee e",
    search: &["e.first_name", "e.last_name", "e.email", "e.position", "e.department"],
    orderings: &[
        ("id", "e.id"),
        ("first_name", "e.first_name"),
        ("last_name", "e.last_name"),
        ("hire_date", "e.hire_date"),
        ("position", "e.position"),
    ],
    default_ordering: &["first_name"],
};

const TASKS: Table = Table {
    name: "task",
    alias: "t",
    columns: "t.id, t.title, t.description,
        t.assigned_to, TRIM(e.first_name || ' ' || e.last_name) AS assigned_to_name,
        t.assigned_by, u.username AS assigned_by_name,
        t.status, s.name AS status_name,
        t.due_date, t.created_at, t.updated_at",
    from: "FROM task t
        LEFT JOIN employee e ON e.id = t.assigned_to
        LEFT JOIN app_user u ON u.id = t.assigned_by
        LEFT JOIN task_status s ON s.id = t.status",
    search: &["t.title", "t.description"],
    orderings: &[
        ("id", "t.id"),
        ("due_date", "t.due_date"),
        ("created_at", "t.created_at"),
        ("status__name", "s.name"),
    ],
    default_ordering: &["due_date"],
};

const STATUSES: Table = Table {
    name: "task_status",
    alias: "s",
    columns: "s.id, s.name, s.description",
    from: "FROM task_status s",
    search: &["s.name"],
    orderings: &[("id", "s.id"), ("name", "s.name")],
    default_ordering: &["name"],
};

const USERS: Table = Table {
    name: "app_user",
    alias: "u",
    columns: "u.id, u.username, u.first_name, u.last_name",
    from: "FROM app_user u",
    search: &["u.username", "u.first_name", "u.last_name"],
    orderings: &[("id", "u.id"), ("username", "u.username"), ("first_name", "u.first_name")],
    default_ordering: &["username"],
};

fn table(kind: ResourceKind) -> &'static Table {
    match kind {
        ResourceKind::Employees => &EMPLOYEES,
        ResourceKind::Tasks => &TASKS,
        ResourceKind::TaskStatuses => &STATUSES,
        ResourceKind::Users => &USERS,
    }
}

/// Splits a search string into terms on whitespace and commas.
pub fn search_terms(search: &str) -> Vec<String> {
    search
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// `ORDER BY` body for a comma-separated ordering. Unknown names are dropped;
/// if nothing survives the table default applies. `id` always breaks ties.
fn order_clause(table: &Table, ordering: Option<&str>) -> String {
    let resolve = |term: &str| -> Option<String> {
        let (name, direction) = match term.strip_prefix('-') {
            Some(name) => (name, "DESC"),
            None => (term, "ASC"),
        };
        table
            .orderings
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, expr)| format!("{expr} {direction}"))
    };

    let mut terms: Vec<String> = ordering
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .filter_map(&resolve)
        .collect();
    if terms.is_empty() {
        terms = table.default_ordering.iter().filter_map(|term| resolve(term)).collect();
    }
    terms.push(format!("{}.id ASC", table.alias));
    terms.join(", ")
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => Value::from(number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn read_rows(conn: &Connection, sql: &str, bind: &[SqlValue]) -> Result<Vec<Value>> {
    let mut stmt = conn.prepare(sql).context("failed to prepare row query")?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt
        .query(params_from_iter(bind.iter()))
        .context("failed to query rows")?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().context("failed to read row")? {
        let mut object = Map::new();
        for (idx, name) in columns.iter().enumerate() {
            let value = row.get_ref(idx).context("failed to read column")?;
            object.insert(name.clone(), json_value(value));
        }
        out.push(Value::Object(object));
    }
    Ok(out)
}

/// Moves the per-status counters of an employee row under `task_counts`.
fn nest_task_counts(row: &mut Value) {
    let Some(object) = row.as_object_mut() else {
        return;
    };
    let mut counts = Map::new();
    for key in ["to_do", "in_progress", "completed", "blocked"] {
        if let Some(value) = object.remove(key) {
            counts.insert(key.to_string(), value);
        }
    }
    object.insert("task_counts".to_string(), Value::Object(counts));
}

fn shape_rows(kind: ResourceKind, mut rows: Vec<Value>) -> Vec<Value> {
    if kind == ResourceKind::Employees {
        rows.iter_mut().for_each(nest_task_counts);
    }
    rows
}

/// One page of `kind`, plus the total match count.
pub fn list_rows(db_path: &Path, kind: ResourceKind, query: &ListParams) -> Result<(Vec<Value>, i64)> {
    if query.page_size <= 0 {
        return Err(RemoteError::new(400, "page_size must be greater than zero").into());
    }
    if query.page < 1 {
        return Err(RemoteError::invalid_page().into());
    }

    let table = table(kind);
    let conn = open_connection(db_path)?;

    let mut filter_clauses = vec!["1 = 1".to_string()];
    let mut filter_params = Vec::new();
    for term in search_terms(&query.search) {
        let pattern = escape_like(&term);
        let any_field = table
            .search
            .iter()
            .map(|expr| {
                filter_params.push(SqlValue::Text(pattern.clone()));
                format!("{expr} LIKE ? ESCAPE '\\'")
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        filter_clauses.push(format!("({any_field})"));
    }
    let where_clause = filter_clauses.join(" AND ");

    let count_sql = format!("SELECT COUNT(*) {} WHERE {where_clause}", table.from);
    let count: i64 = conn
        .query_row(&count_sql, params_from_iter(filter_params.iter()), |row| row.get(0))
        .with_context(|| format!("failed to count {} rows", table.name))?;

    let offset = (query.page - 1).saturating_mul(query.page_size);
    if query.page > 1 && offset >= count {
        return Err(RemoteError::invalid_page().into());
    }

    let select_sql = format!(
        "SELECT {} {} WHERE {where_clause} ORDER BY {} LIMIT ? OFFSET ?",
        table.columns,
        table.from,
        order_clause(table, query.ordering.as_deref()),
    );
    let mut bind = filter_params;
    bind.push(SqlValue::Integer(query.page_size));
    bind.push(SqlValue::Integer(offset));

    let rows = read_rows(&conn, &select_sql, &bind)
        .with_context(|| format!("failed to list {} rows", table.name))?;
    Ok((shape_rows(kind, rows), count))
}

fn fetch_row(conn: &Connection, kind: ResourceKind, id: i64) -> Result<Option<Value>> {
    let table = table(kind);
    let sql = format!(
        "SELECT {} {} WHERE {}.id = ?",
        table.columns, table.from, table.alias
    );
    let rows = read_rows(conn, &sql, &[SqlValue::Integer(id)])
        .with_context(|| format!("failed to load {} {id}", table.name))?;
    Ok(shape_rows(kind, rows).into_iter().next())
}

/// One row. Employees also carry the tasks assigned to them under `tasks`.
pub fn get_row(db_path: &Path, kind: ResourceKind, id: i64) -> Result<Value> {
    let conn = open_connection(db_path)?;
    let mut row = fetch_row(&conn, kind, id)?
        .ok_or_else(|| anyhow::Error::from(RemoteError::not_found()))?;
    if kind == ResourceKind::Employees {
        let sql = format!(
            "SELECT {} {} WHERE t.assigned_to = ? ORDER BY {}",
            TASKS.columns,
            TASKS.from,
            order_clause(&TASKS, None),
        );
        let tasks = read_rows(&conn, &sql, &[SqlValue::Integer(id)])
            .with_context(|| format!("failed to load tasks of employee {id}"))?;
        if let Some(object) = row.as_object_mut() {
            object.insert("tasks".to_string(), Value::Array(tasks));
        }
    }
    Ok(row)
}

fn reject_read_only(kind: ResourceKind, method: &str) -> Result<()> {
    if kind == ResourceKind::Users {
        return Err(RemoteError::method_not_allowed(method).into());
    }
    Ok(())
}

fn exists(conn: &Connection, sql: &str, bind: &[SqlValue]) -> Result<bool> {
    conn.query_row(sql, params_from_iter(bind.iter()), |row| row.get::<_, i64>(0))
        .map(|found| found != 0)
        .context("failed to run existence check")
}

fn check_pk(
    conn: &Connection,
    validator: &mut FieldValidator<'_>,
    field: &str,
    table_name: &str,
    id: Option<i64>,
) -> Result<()> {
    if let Some(id) = id {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table_name} WHERE id = ?)");
        if !exists(conn, &sql, &[SqlValue::Integer(id)])? {
            validator.add_error(field, format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    Ok(())
}

/// Column values ready to bind, in the table's write order.
struct WriteSet {
    columns: &'static [&'static str],
    values: Vec<SqlValue>,
}

fn text_value(value: Option<String>) -> SqlValue {
    value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn id_value(value: Option<i64>) -> SqlValue {
    value.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
}

/// Validates a full payload for `kind`. `current_id` excludes the row being
/// updated from uniqueness checks.
fn validate_payload(
    conn: &Connection,
    kind: ResourceKind,
    payload: &Value,
    current_id: Option<i64>,
) -> Result<WriteSet> {
    let mut validator = FieldValidator::new(payload)?;
    let self_id = SqlValue::Integer(current_id.unwrap_or(-1));

    let write = match kind {
        ResourceKind::Employees => {
            let first_name = validator.required_text("first_name", 100);
            let last_name = validator.required_text("last_name", 100);
            let email = validator.required_text("email", 254);
            let phone_number = validator.optional_text("phone_number", 20);
            let hire_date = validator.required_date("hire_date");
            let position = validator.required_text("position", 100);
            let department = validator.required_text("department", 100);

            if let Some(email) = &email {
                if !is_valid_email(email) {
                    validator.add_error("email", "Enter a valid email address.");
                } else if exists(
                    conn,
                    "SELECT EXISTS(SELECT 1 FROM employee WHERE email = ? AND id != ?)",
                    &[SqlValue::Text(email.clone()), self_id],
                )? {
                    validator.add_error("email", "employee with this email already exists.");
                }
            }

            WriteSet {
                columns: &[
                    "first_name",
                    "last_name",
                    "email",
                    "phone_number",
                    "hire_date",
                    "position",
                    "department",
                ],
                values: vec![
                    text_value(first_name),
                    text_value(last_name),
                    text_value(email),
                    text_value(phone_number),
                    text_value(hire_date),
                    text_value(position),
                    text_value(department),
                ],
            }
        }
        ResourceKind::Tasks => {
            let title = validator.required_text("title", 255);
            let description = validator.optional_text("description", usize::MAX);
            let status = validator.optional_pk("status");
            let assigned_to = validator.optional_pk("assigned_to");
            let assigned_by = validator.optional_pk("assigned_by");
            let due_date = validator.optional_date("due_date");

            check_pk(conn, &mut validator, "status", "task_status", status)?;
            check_pk(conn, &mut validator, "assigned_to", "employee", assigned_to)?;
            check_pk(conn, &mut validator, "assigned_by", "app_user", assigned_by)?;

            WriteSet {
                columns: &[
                    "title",
                    "description",
                    "status",
                    "assigned_to",
                    "assigned_by",
                    "due_date",
                ],
                values: vec![
                    text_value(title),
                    text_value(description),
                    id_value(status),
                    id_value(assigned_to),
                    id_value(assigned_by),
                    text_value(due_date),
                ],
            }
        }
        ResourceKind::TaskStatuses => {
            let name = validator.required_text("name", 50);
            let description = validator.optional_text("description", usize::MAX);

            if let Some(name) = &name {
                if exists(
                    conn,
                    "SELECT EXISTS(SELECT 1 FROM task_status WHERE name = ? AND id != ?)",
                    &[SqlValue::Text(name.clone()), self_id],
                )? {
                    validator.add_error("name", "task status with this name already exists.");
                }
            }

            WriteSet {
                columns: &["name", "description"],
                values: vec![text_value(name), text_value(description)],
            }
        }
        ResourceKind::Users => return Err(RemoteError::method_not_allowed("POST").into()),
    };

    validator.finish()?;
    Ok(write)
}

pub fn create_row(db_path: &Path, kind: ResourceKind, payload: &Value) -> Result<Value> {
    reject_read_only(kind, "POST")?;
    let conn = open_connection(db_path)?;
    let write = validate_payload(&conn, kind, payload, None)?;

    let table = table(kind);
    let placeholders = vec!["?"; write.columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {}({}) VALUES ({placeholders})",
        table.name,
        write.columns.join(", ")
    );
    conn.execute(&sql, params_from_iter(write.values.iter()))
        .with_context(|| format!("failed to insert {} row", table.name))?;
    let id = conn.last_insert_rowid();

    fetch_row(&conn, kind, id)?
        .ok_or_else(|| anyhow::anyhow!("inserted {} row {id} not found", table.name))
}

pub fn update_row(db_path: &Path, kind: ResourceKind, id: i64, payload: &Value) -> Result<Value> {
    reject_read_only(kind, "PUT")?;
    let conn = open_connection(db_path)?;
    if fetch_row(&conn, kind, id)?.is_none() {
        return Err(RemoteError::not_found().into());
    }
    let write = validate_payload(&conn, kind, payload, Some(id))?;

    let table = table(kind);
    let mut assignments: Vec<String> = write
        .columns
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect();
    if kind == ResourceKind::Tasks {
        assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        table.name,
        assignments.join(", ")
    );
    let mut bind = write.values;
    bind.push(SqlValue::Integer(id));
    conn.execute(&sql, params_from_iter(bind.iter()))
        .with_context(|| format!("failed to update {} row {id}", table.name))?;

    fetch_row(&conn, kind, id)?
        .ok_or_else(|| anyhow::anyhow!("updated {} row {id} not found", table.name))
}

/// Deletes one row. Tasks pointing at it keep existing with the reference nulled.
pub fn delete_row(db_path: &Path, kind: ResourceKind, id: i64) -> Result<()> {
    reject_read_only(kind, "DELETE")?;
    let conn = open_connection(db_path)?;
    let table = table(kind);
    let deleted = conn
        .execute(&format!("DELETE FROM {} WHERE id = ?1", table.name), params![id])
        .with_context(|| format!("failed to delete {} row {id}", table.name))?;
    if deleted == 0 {
        return Err(RemoteError::not_found().into());
    }
    Ok(())
}

/// Inserts a read-only account; there is no write path for users through the
/// adapter.
pub fn insert_user(db_path: &Path, username: &str, first_name: &str, last_name: &str) -> Result<i64> {
    let conn = open_connection(db_path)?;
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM app_user WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up user")?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO app_user(username, first_name, last_name) VALUES (?1, ?2, ?3)",
        params![username, first_name, last_name],
    )
    .context("failed to insert user")?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_split_on_whitespace_and_commas() {
        assert_eq!(search_terms(" ada, lovelace  eng "), vec!["ada", "lovelace", "eng"]);
        assert!(search_terms(" , ").is_empty());
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(escape_like("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn ordering_keeps_known_fields_and_falls_back_to_default() {
        assert_eq!(
            order_clause(&EMPLOYEES, Some("-hire_date, salary,last_name")),
            "e.hire_date DESC, e.last_name ASC, e.id ASC"
        );
        assert_eq!(
            order_clause(&EMPLOYEES, Some("department")),
            "e.first_name ASC, e.id ASC"
        );
        assert_eq!(order_clause(&TASKS, None), "t.due_date ASC, t.id ASC");
        assert_eq!(order_clause(&TASKS, Some("-status__name")), "s.name DESC, t.id ASC");
    }
}
