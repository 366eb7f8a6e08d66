//! SQLite device store

use crate::core::sync::handle_mutex_poison;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::record::{DeviceCategory, DeviceRecord, RssiSample};
use crate::registry::store::DeviceStore;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS devices (
        address TEXT PRIMARY KEY,
        name TEXT,
        vendor TEXT,
        first_seen TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        rssi_history TEXT NOT NULL DEFAULT '[]',
        category TEXT NOT NULL DEFAULT 'Unknown',
        zone TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_devices_last_seen ON devices(last_seen);
";

/// How long a statement waits on another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "address, name, vendor, first_seen, last_seen, rssi_history, category, zone";

/// Fixed-width UTC text so that string order equals time order
fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(address: &str, text: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RegistryError::Corrupt {
            address: address.to_string(),
            message: format!("bad timestamp {:?}: {}", text, e),
        })
}

struct RawRow {
    address: String,
    name: Option<String>,
    vendor: Option<String>,
    first_seen: String,
    last_seen: String,
    rssi_history: String,
    category: String,
    zone: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            address: row.get(0)?,
            name: row.get(1)?,
            vendor: row.get(2)?,
            first_seen: row.get(3)?,
            last_seen: row.get(4)?,
            rssi_history: row.get(5)?,
            category: row.get(6)?,
            zone: row.get(7)?,
        })
    }

    fn into_record(self) -> RegistryResult<DeviceRecord> {
        let first_seen = decode_time(&self.address, &self.first_seen)?;
        let last_seen = decode_time(&self.address, &self.last_seen)?;
        let history: Vec<RssiSample> =
            serde_json::from_str(&self.rssi_history).map_err(|e| RegistryError::Corrupt {
                address: self.address.clone(),
                message: format!("bad rssi_history: {}", e),
            })?;

        DeviceRecord::from_parts(
            self.address,
            self.name,
            self.vendor,
            first_seen,
            last_seen,
            history,
            DeviceCategory::from_name(&self.category),
            self.zone,
        )
    }
}

pub struct SqliteDeviceStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteDeviceStore {
    /// Open or create the database file, creating parent directories
    pub fn open(path: &Path) -> RegistryResult<Self> {
        let open_error = |message: String| RegistryError::Open {
            path: path.display().to_string(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                open_error(format!(
                    "cannot create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            open_error(format!("cannot open database '{}': {}", path.display(), e))
        })?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    pub fn in_memory() -> RegistryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> RegistryResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        log::debug!(
            "Device store ready at {}",
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> RegistryResult<std::sync::MutexGuard<'_, Connection>> {
        handle_mutex_poison(self.conn.lock(), |message| RegistryError::Storage {
            message,
        })
    }
}

impl DeviceStore for SqliteDeviceStore {
    fn load(&self, address: &str) -> RegistryResult<Option<DeviceRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE address = ?1", SELECT_COLUMNS),
                params![address],
                RawRow::from_row,
            )
            .optional()?;
        row.map(RawRow::into_record).transpose()
    }

    fn save(&self, record: &DeviceRecord) -> RegistryResult<()> {
        let history = serde_json::to_string(record.rssi_history()).map_err(|e| {
            RegistryError::Storage {
                message: format!("cannot encode rssi history: {}", e),
            }
        })?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO devices
                (address, name, vendor, first_seen, last_seen, rssi_history, category, zone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(address) DO UPDATE SET
                name = excluded.name,
                vendor = excluded.vendor,
                first_seen = excluded.first_seen,
                last_seen = excluded.last_seen,
                rssi_history = excluded.rssi_history,
                category = excluded.category,
                zone = excluded.zone",
            params![
                record.address(),
                record.name(),
                record.vendor(),
                encode_time(record.first_seen()),
                encode_time(record.last_seen()),
                history,
                record.category().name(),
                record.zone(),
            ],
        )?;
        Ok(())
    }

    fn list(&self, limit: usize, offset: usize) -> RegistryResult<Vec<DeviceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM devices ORDER BY last_seen DESC, address ASC LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit, offset], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawRow::into_record).collect()
    }

    fn count(&self) -> RegistryResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn delete_seen_before(&self, cutoff: DateTime<Utc>) -> RegistryResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM devices WHERE last_seen < ?1",
            params![encode_time(cutoff)],
        )?;
        Ok(removed)
    }

    fn size_bytes(&self) -> RegistryResult<u64> {
        let conn = self.conn()?;
        let pages: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((pages.max(0) as u64) * (page_size.max(0) as u64))
    }

    fn compact(&self) -> RegistryResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("VACUUM")?;
        Ok(())
    }
}
