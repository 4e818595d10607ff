//! Durable key/value state.
//!
//! Everything the trackers remember between polls lives in one `state`
//! table. Keys are updated independently; there are no cross-key
//! transactions, and every reader treats an absent key as an empty baseline.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::WatchError;

/// Store keys used by the trackers. Fixed names, string values,
/// JSON-encoded where structured.
pub mod keys {
    pub const LAST_ORDERS: &str = "last_orders_json";
    pub const LAST_KNOWN_ORDERS: &str = "last_known_orders_json";
    pub const LAST_NEWS_TS: &str = "last_news_ts";
    pub const LAST_EVENT_IDS: &str = "last_event_ids_json";
    pub const LAST_CAMPAIGN_IDS: &str = "last_campaign_ids_json";
    pub const LAST_PLANET_OWNERS: &str = "last_planet_owners_json";
    pub const LAST_PLANET_ALERTS: &str = "last_planet_alert_json";
    pub const LAST_PLANETS: &str = "last_planets_json";
    pub const PROGRESS_SNAPSHOT: &str = "progress_snapshot_json";
    pub const PROGRESS_SNAPSHOT_TS: &str = "progress_snapshot_ts";
    pub const PROGRESS_SNAPSHOT_PREV: &str = "progress_snapshot_prev_json";
    pub const PROGRESS_SNAPSHOT_PREV_TS: &str = "progress_snapshot_prev_ts";
}

pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (and if needed create) the store. Failure here is fatal to the
    /// caller; nothing in the poll cycle can run without state.
    pub fn open(db_path: &Path) -> Result<Self, WatchError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).map_err(|source| WatchError::StoreOpen {
            path: db_path.to_path_buf(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at INTEGER
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, WatchError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at INTEGER
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, WatchError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM state WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), WatchError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Parse-or-none JSON read: an absent key or an unparseable value both
    /// come back as `None` (empty baseline). SQL failures still propagate.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, WatchError> {
        match self.get(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WatchError> {
        self.set(key, &serde_json::to_string(value)?)
    }

    /// Parse an integer-valued key, defaulting to zero.
    pub fn get_i64(&self, key: &str) -> Result<i64, WatchError> {
        Ok(self
            .get(key)?
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0))
    }
}
