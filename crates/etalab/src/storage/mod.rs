//! Storage layer for etalab.
//!
//! A small namespaced key-value store on top of `SQLite`. Every key holds one
//! whole JSON document (the order list, the training log list) that is read
//! and replaced as a unit; there is no indexing and the last write wins.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Key holding the JSON array of orders.
pub const ORDERS_KEY: &str = "delivery_orders";

/// Key holding the JSON array of ML training logs.
pub const ML_LOGS_KEY: &str = "ml_training_logs";

/// Key-value storage engine.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Store `value` under `key`, replacing whatever was there.
    ///
    /// Returns `false` when the stored value was already identical and
    /// nothing was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<bool> {
        let hash = blake3::hash(value.as_bytes()).to_hex().to_string();

        let existing: Option<String> = self
            .conn
            .query_row("SELECT value_hash FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.as_deref() == Some(hash.as_str()) {
            debug!(key, "Value unchanged, skipping write");
            return Ok(false);
        }

        self.conn.execute(
            r"
            INSERT INTO kv (key, value, value_hash, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                value_hash = excluded.value_hash,
                updated_at = excluded.updated_at
            ",
            params![key, value, hash, Utc::now().to_rfc3339()],
        )?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(true)
    }

    /// Delete `key`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }

    /// List stored keys in lexical order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Decode the JSON document under `key`.
    ///
    /// A missing key yields `default`. So does a value that no longer
    /// decodes; that case is logged and the stored value is left untouched.
    /// Callers that write the value back use [`load_json`](Self::load_json).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.load_json(key) {
            Ok(value) => Ok(value.unwrap_or(default)),
            Err(err @ Error::CorruptRecord { .. }) => {
                warn!("{err}; using default");
                Ok(default)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode the JSON document under `key`, or `None` when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRecord`] if the stored value does not decode,
    /// or an error if the database operation fails.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::CorruptRecord {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }
}
