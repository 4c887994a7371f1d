//! Database operations for SQLite.
//!
//! This module handles database connections, schema creation, and migrations.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_new = !path.exists();

        debug!(path = %path.display(), "Opening database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let mut db = Self { conn };

        if is_new {
            info!("Creating new database schema");
            db.create_schema()?;
        } else {
            debug!("Database already exists");
            db.run_migrations()?;
        }

        Ok(db)
    }

    /// Open an in-memory database (used by tests and one-off runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mut db = Self { conn };
        db.create_schema()?;
        Ok(db)
    }

    /// Create the database schema
    fn create_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(include_str!("../schema.sql"))
            .context("Failed to create database schema")?;

        info!("Database schema created successfully");
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Check if a table exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get the database version (from user_version pragma)
    pub fn get_version(&self) -> Result<i32> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Set the database version
    pub fn set_version(&self, version: i32) -> Result<()> {
        self.conn
            .execute(&format!("PRAGMA user_version = {}", version), [])?;
        Ok(())
    }

    /// Run migrations for existing databases
    fn run_migrations(&mut self) -> Result<()> {
        // Databases created before sitemap caching landed lack that table
        if !self.table_exists("sitemap_cache")? {
            info!("Running migration: creating sitemap_cache table");
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS sitemap_cache (
                        key TEXT PRIMARY KEY,
                        payload TEXT NOT NULL,
                        cached_at TIMESTAMP NOT NULL,
                        expires_at TIMESTAMP NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_sitemap_cache_expires
                    ON sitemap_cache(expires_at);",
                )
                .context("Failed to create sitemap_cache table")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_database() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open(&db_path)?;
        assert!(db_path.exists());

        // Check that cache tables were created
        assert!(db.table_exists("website_analysis")?);
        assert!(db.table_exists("robots_cache")?);
        assert!(db.table_exists("sitemap_cache")?);

        Ok(())
    }

    #[test]
    fn test_version() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open(&db_path)?;

        let version = db.get_version()?;
        assert_eq!(version, 0); // Default version

        db.set_version(1)?;
        assert_eq!(db.get_version()?, 1);

        Ok(())
    }

    #[test]
    fn test_in_memory_database() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert!(db.table_exists("website_analysis")?);
        Ok(())
    }
}
