use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub const DEFAULT_STATUSES: [&str; 4] = ["To Do", "In Progress", "Completed", "Blocked"];

pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open db: {}", db_path.display()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign key enforcement")?;
    Ok(conn)
}

pub fn init_db(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir: {}", parent.display()))?;
    }

    let conn = open_connection(db_path)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS employee (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name   TEXT NOT NULL,
            last_name    TEXT NOT NULL,
            email        TEXT NOT NULL UNIQUE,
            phone_number TEXT,
            hire_date    TEXT NOT NULL,
            position     TEXT NOT NULL,
            department   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_status (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS app_user (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            username   TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name  TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS task (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT,
            status      INTEGER REFERENCES task_status(id) ON DELETE SET NULL,
            assigned_to INTEGER REFERENCES employee(id) ON DELETE SET NULL,
            assigned_by INTEGER REFERENCES app_user(id) ON DELETE SET NULL,
            due_date    TEXT,
            created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_task_assigned_to
            ON task(assigned_to);

        CREATE INDEX IF NOT EXISTS idx_task_status
            ON task(status);
        ",
    )
    .context("failed to initialize schema")?;

    for name in DEFAULT_STATUSES {
        conn.execute(
            "INSERT OR IGNORE INTO task_status(name) VALUES (?1)",
            params![name],
        )
        .with_context(|| format!("failed to seed task status: {name}"))?;
    }

    Ok(())
}
