use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::backend::StateBackend;
use super::models::ResourceState;
use super::schema;

const RESOURCE_COLUMNS: &str = "id, resource_type, resource_name, address, provider_id, status,
    attributes_json, schema_version, created_at, updated_at";

/// SQLite-backed state store for local, single-user workflows.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create the SQLite state database.
    pub fn open(db_path: &str) -> Result<Self> {
        let parent = Path::new(db_path).parent();
        if let Some(dir) = parent {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[async_trait]
impl StateBackend for SqliteBackend {
    async fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(schema::CREATE_TABLES_SQL)?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)?;

        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![schema::SCHEMA_VERSION, Self::now(), "Initial schema"],
        )?;
        Ok(())
    }

    async fn get_resource(&self, address: &str) -> Result<Option<ResourceState>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM resources WHERE address = ?1", RESOURCE_COLUMNS);
        let result = conn
            .query_row(&sql, params![address], resource_from_row)
            .optional()?;
        Ok(result)
    }

    async fn upsert_resource(&self, resource: &ResourceState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO resources (id, resource_type, resource_name, address, provider_id,
                status, attributes_json, schema_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                provider_id = excluded.provider_id,
                status = excluded.status,
                attributes_json = excluded.attributes_json,
                schema_version = excluded.schema_version,
                updated_at = excluded.updated_at",
            params![
                resource.id,
                resource.resource_type,
                resource.resource_name,
                resource.address,
                resource.provider_id,
                resource.status,
                resource.attributes_json,
                resource.schema_version,
                resource.created_at,
                resource.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn delete_resource(&self, address: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM resources WHERE address = ?1", params![address])?;
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceState>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {} FROM resources ORDER BY address", RESOURCE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn count_resources(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn resource_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourceState> {
    Ok(ResourceState {
        id: row.get(0)?,
        resource_type: row.get(1)?,
        resource_name: row.get(2)?,
        address: row.get(3)?,
        provider_id: row.get(4)?,
        status: row.get(5)?,
        attributes_json: row.get(6)?,
        schema_version: row.get::<_, Option<i32>>(7)?.unwrap_or_default(),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
