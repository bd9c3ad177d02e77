use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::errors::{AvmError, Result};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Thread-local connections, one per database path.
thread_local! {
    static DB_CONNS: RefCell<HashMap<String, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Clone)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides a mutable connection to the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut conns = cell.borrow_mut();
                let conn = match conns.entry(self.path.clone()) {
                    std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                    std::collections::hash_map::Entry::Vacant(e) => {
                        let conn = Connection::open(&self.path)
                            .map_err(|e| AvmError::DbError(format!("Open DB failed: {e}")))?;
                        conn.execute_batch("PRAGMA foreign_keys = ON;")
                            .map_err(|e| AvmError::DbError(e.to_string()))?;
                        e.insert(conn)
                    }
                };
                f(conn)
            })
            .map_err(|e| AvmError::DbError(format!("Connection cache unavailable: {e}")))?
    }
}

/// Create the database file's directory and apply the embedded schema.
pub fn init_db(db: &Database) -> Result<()> {
    if let Some(parent) = Path::new(db.path()).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| AvmError::DbError(format!("Failed to apply schema: {e}")))?;
        Ok(())
    })?;

    info!("Database initialized at {}", db.path());
    Ok(())
}
