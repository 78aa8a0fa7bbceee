//! Knowledge store database migrations
//!
//! SQL migrations are embedded as strings and executed when a store is opened.

use rusqlite::Connection;

use crate::error::Result;

/// Knowledge tables SQL (001)
pub const KNOWLEDGE_TABLES_SQL: &str = include_str!("001_knowledge_tables.sql");

/// Run all knowledge store migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(KNOWLEDGE_TABLES_SQL)?;
    Ok(())
}
