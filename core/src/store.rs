use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Item collection: keyed by item id.
pub const ITEMS: &str = "items";
/// Day-log collection: keyed by ISO date.
pub const LOGS: &str = "logs";
/// Key/value metadata (decay stamp, app flags).
pub const META: &str = "meta";

const COLLECTIONS: &[&str] = &[ITEMS, LOGS, META];

/// Produces an opaque unique id. The prefix is purely a debugging aid.
#[must_use]
pub fn uid(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Persistent store of named collections. Each collection is a SQLite
/// table of `(id, body)` rows with JSON bodies; the engine never relies
/// on transactional atomicity across calls.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store: {}", path.display()))?;
        let store = Store { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS items (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS logs (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meta (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Collection names map to fixed table names; anything else is a bug
    /// in the caller, not data.
    fn table(collection: &str) -> Result<&'static str> {
        match COLLECTIONS.iter().find(|c| **c == collection) {
            Some(name) => Ok(name),
            None => bail!("Unknown collection '{collection}'"),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let table = Self::table(collection)?;
        let body: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT body FROM {table} WHERE id = ?1"),
                params![id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json).with_context(|| {
                format!("Corrupt record '{id}' in collection '{collection}'")
            })?)),
            None => Ok(None),
        }
    }

    pub fn get_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let table = Self::table(collection)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT body FROM {table} ORDER BY id"))?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|json| {
                serde_json::from_str(json)
                    .with_context(|| format!("Corrupt record in collection '{collection}'"))
            })
            .collect()
    }

    pub fn put<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<()> {
        let table = Self::table(collection)?;
        let body = serde_json::to_string(value)?;
        self.conn.execute(
            &format!("INSERT OR REPLACE INTO {table} (id, body) VALUES (?1, ?2)"),
            params![id, body],
        )?;
        Ok(())
    }

    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let table = Self::table(collection)?;
        let n = self.conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?1"),
            params![id],
        )?;
        Ok(n > 0)
    }

    pub fn bulk_put<T: Serialize>(&self, collection: &str, rows: &[(String, T)]) -> Result<()> {
        for (id, value) in rows {
            self.put(collection, id, value)?;
        }
        Ok(())
    }

    pub fn clear(&self, collection: &str) -> Result<()> {
        let table = Self::table(collection)?;
        self.conn.execute(&format!("DELETE FROM {table}"), [])?;
        Ok(())
    }

    // --- meta convenience (string values) ---

    pub fn meta_get(&self, key: &str) -> Result<Option<String>> {
        self.get::<String>(META, key)
    }

    pub fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.put(META, key, &value.to_string())
    }
}
