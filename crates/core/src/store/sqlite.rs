//! SQLite-backed store implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ReleaseFilter, Store, StoreError};
use crate::agent::Agent;
use crate::intake::SourceRecord;
use crate::release::{MetaFile, Release, ReleaseState};

const RELEASE_COLUMNS: &str = "id, hash, name, name_raw, size, state, category, category_raw, published_at, discovered_at, uploaded_at, source_id, agent_id";
const META_FILE_COLUMNS: &str = "id, release_id, idx, kind, state, file_name, info";
const AGENT_COLUMNS: &str = "id, name, url, enabled, statistics_interval_secs, list_interval_secs, min_free_disk_space, files_submitted, last_statistics_at, created_at";
const SOURCE_COLUMNS: &str =
    "id, name, url, enabled, interval_secs, last_check, times_checked, releases_found, created_at";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database file, creating it and its tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS releases (
                id TEXT PRIMARY KEY,
                hash TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                name_raw TEXT NOT NULL,
                size INTEGER NOT NULL,
                state TEXT NOT NULL,
                category TEXT NOT NULL,
                category_raw TEXT NOT NULL DEFAULT '',
                published_at TEXT,
                discovered_at TEXT NOT NULL,
                uploaded_at TEXT,
                source_id TEXT,
                agent_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_releases_state ON releases(state);
            CREATE INDEX IF NOT EXISTS idx_releases_name ON releases(name);
            CREATE INDEX IF NOT EXISTS idx_releases_agent ON releases(agent_id);

            CREATE TABLE IF NOT EXISTS meta_files (
                id TEXT PRIMARY KEY,
                release_id TEXT NOT NULL,
                idx INTEGER NOT NULL,
                kind TEXT NOT NULL,
                state TEXT NOT NULL,
                file_name TEXT NOT NULL,
                info TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_meta_files_release ON meta_files(release_id);

            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                statistics_interval_secs INTEGER NOT NULL,
                list_interval_secs INTEGER NOT NULL,
                min_free_disk_space INTEGER NOT NULL,
                files_submitted INTEGER NOT NULL DEFAULT 0,
                last_statistics_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                interval_secs INTEGER NOT NULL,
                last_check TEXT,
                times_checked INTEGER NOT NULL DEFAULT 0,
                releases_found INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_error)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_release(row: &rusqlite::Row) -> rusqlite::Result<Release> {
        let published_at: Option<String> = row.get(8)?;
        let discovered_at: String = row.get(9)?;
        let uploaded_at: Option<String> = row.get(10)?;

        Ok(Release {
            id: row.get(0)?,
            hash: row.get(1)?,
            name: row.get(2)?,
            name_raw: row.get(3)?,
            size: row.get(4)?,
            state: parse_column(5, row.get(5)?)?,
            category: row.get::<_, String>(6)?.parse().unwrap_or_default(),
            category_raw: row.get(7)?,
            published_at: published_at.as_deref().and_then(parse_timestamp),
            discovered_at: parse_timestamp(&discovered_at).unwrap_or_else(Utc::now),
            uploaded_at: uploaded_at.as_deref().and_then(parse_timestamp),
            source_id: row.get(11)?,
            agent_id: row.get(12)?,
            meta_files: Vec::new(),
        })
    }

    fn row_to_meta_file(row: &rusqlite::Row) -> rusqlite::Result<MetaFile> {
        let info_json: String = row.get(6)?;
        Ok(MetaFile {
            id: row.get(0)?,
            release_id: row.get(1)?,
            index: row.get(2)?,
            kind: parse_column(3, row.get(3)?)?,
            state: parse_column(4, row.get(4)?)?,
            file_name: row.get(5)?,
            info: serde_json::from_str(&info_json).unwrap_or_default(),
        })
    }

    fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
        let last_statistics_at: Option<String> = row.get(8)?;
        let created_at: String = row.get(9)?;
        Ok(Agent {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            enabled: row.get(3)?,
            statistics_interval_secs: row.get::<_, i64>(4)?.max(0) as u64,
            list_interval_secs: row.get::<_, i64>(5)?.max(0) as u64,
            min_free_disk_space: row.get(6)?,
            files_submitted: row.get(7)?,
            last_statistics_at: last_statistics_at.as_deref().and_then(parse_timestamp),
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<SourceRecord> {
        let last_check: Option<String> = row.get(5)?;
        let created_at: String = row.get(8)?;
        Ok(SourceRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            url: row.get(2)?,
            enabled: row.get(3)?,
            interval_secs: row.get::<_, i64>(4)?.max(0) as u64,
            last_check: last_check.as_deref().and_then(parse_timestamp),
            times_checked: row.get(6)?,
            releases_found: row.get(7)?,
            created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        })
    }

    fn load_meta_files(conn: &Connection, release_id: &str) -> Result<Vec<MetaFile>, StoreError> {
        let sql = format!(
            "SELECT {} FROM meta_files WHERE release_id = ? ORDER BY idx ASC, rowid ASC",
            META_FILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params![release_id], Self::row_to_meta_file)
            .map_err(db_error)?;

        let mut meta_files = Vec::new();
        for row in rows {
            meta_files.push(row.map_err(db_error)?);
        }
        Ok(meta_files)
    }

    fn query_release(
        conn: &Connection,
        condition: &str,
        value: &str,
    ) -> Result<Option<Release>, StoreError> {
        let sql = format!("SELECT {} FROM releases WHERE {}", RELEASE_COLUMNS, condition);
        let release = conn
            .query_row(&sql, params![value], Self::row_to_release)
            .optional()
            .map_err(db_error)?;

        match release {
            Some(mut release) => {
                release.meta_files = Self::load_meta_files(conn, &release.id)?;
                Ok(Some(release))
            }
            None => Ok(None),
        }
    }

    /// Insert or update a meta file row. Rows of releases that no longer
    /// exist are refused with `NotFound`.
    fn upsert_meta_file(conn: &Connection, meta_file: &MetaFile) -> Result<(), StoreError> {
        let info_json =
            serde_json::to_string(&meta_file.info).map_err(|e| StoreError::Database(e.to_string()))?;
        let changed = conn
            .execute(
                "INSERT INTO meta_files (id, release_id, idx, kind, state, file_name, info)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
                 WHERE EXISTS (SELECT 1 FROM releases WHERE id = ?2)
                 ON CONFLICT(id) DO UPDATE SET idx = excluded.idx, kind = excluded.kind, state = excluded.state,
                    file_name = excluded.file_name, info = excluded.info",
                params![
                    meta_file.id,
                    meta_file.release_id,
                    meta_file.index,
                    meta_file.kind.as_str(),
                    meta_file.state.as_str(),
                    meta_file.file_name,
                    info_json,
                ],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(meta_file.release_id.clone()));
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn insert_release(&self, release: &Release) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error)?;

        tx.execute(
            &format!(
                "INSERT INTO releases ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                RELEASE_COLUMNS
            ),
            params![
                release.id,
                release.hash.to_ascii_lowercase(),
                release.name,
                release.name_raw,
                release.size,
                release.state.as_str(),
                release.category.as_str(),
                release.category_raw,
                release.published_at.map(|t| t.to_rfc3339()),
                release.discovered_at.to_rfc3339(),
                release.uploaded_at.map(|t| t.to_rfc3339()),
                release.source_id,
                release.agent_id,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!("release with hash {} already stored", release.hash))
            } else {
                db_error(e)
            }
        })?;

        for meta_file in &release.meta_files {
            Self::upsert_meta_file(&tx, meta_file)?;
        }

        tx.commit().map_err(db_error)
    }

    fn get_release(&self, id: &str) -> Result<Option<Release>, StoreError> {
        let conn = self.conn()?;
        Self::query_release(&conn, "id = ?", id)
    }

    fn find_release_by_hash(&self, hash: &str) -> Result<Option<Release>, StoreError> {
        let conn = self.conn()?;
        Self::query_release(&conn, "hash = ?", &hash.to_ascii_lowercase())
    }

    fn release_exists(&self, hash: &str, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM releases WHERE hash = ? OR name = ?",
                params![hash.to_ascii_lowercase(), name],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        Ok(count > 0)
    }

    fn list_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>, StoreError> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if !filter.states.is_empty() {
            let placeholders = vec!["?"; filter.states.len()].join(", ");
            conditions.push(format!("state IN ({})", placeholders));
            values.extend(filter.states.iter().map(|s| s.as_str().to_string()));
        }
        if let Some(agent_id) = &filter.agent_id {
            conditions.push("agent_id = ?".to_string());
            values.push(agent_id.clone());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = if filter.limit > 0 {
            format!("LIMIT {}", filter.limit)
        } else {
            String::new()
        };

        let sql = format!(
            "SELECT {} FROM releases {} ORDER BY discovered_at ASC {}",
            RELEASE_COLUMNS, where_clause, limit_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), Self::row_to_release)
            .map_err(db_error)?;

        let mut releases = Vec::new();
        for row in rows {
            releases.push(row.map_err(db_error)?);
        }
        for release in &mut releases {
            release.meta_files = Self::load_meta_files(&conn, &release.id)?;
        }

        Ok(releases)
    }

    fn count_releases_by_state(&self) -> Result<Vec<(ReleaseState, i64)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT state, COUNT(*) FROM releases GROUP BY state")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    parse_column::<ReleaseState>(0, row.get(0)?)?,
                    row.get::<_, i64>(1)?,
                ))
            })
            .map_err(db_error)?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row.map_err(db_error)?);
        }
        counts.sort_by_key(|(state, _)| ReleaseState::ALL.iter().position(|s| s == state));
        Ok(counts)
    }

    fn update_release_state(
        &self,
        id: &str,
        state: ReleaseState,
        uploaded_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE releases SET state = ?, uploaded_at = COALESCE(?, uploaded_at) WHERE id = ?",
                params![state.as_str(), uploaded_at.map(|t| t.to_rfc3339()), id],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn assign_agent(&self, id: &str, agent_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE releases SET agent_id = ? WHERE id = ?",
                params![agent_id, id],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_release(&self, id: &str) -> Result<Release, StoreError> {
        let mut conn = self.conn()?;
        let release = Self::query_release(&conn, "id = ?", id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let tx = conn.transaction().map_err(db_error)?;
        tx.execute("DELETE FROM meta_files WHERE release_id = ?", params![id])
            .map_err(db_error)?;
        tx.execute("DELETE FROM releases WHERE id = ?", params![id])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;

        Ok(release)
    }

    fn save_meta_file(&self, meta_file: &MetaFile) -> Result<(), StoreError> {
        let conn = self.conn()?;
        Self::upsert_meta_file(&conn, meta_file)
    }

    fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO agents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                AGENT_COLUMNS
            ),
            params![
                agent.id,
                agent.name,
                agent.url,
                agent.enabled,
                agent.statistics_interval_secs as i64,
                agent.list_interval_secs as i64,
                agent.min_free_disk_space,
                agent.files_submitted,
                agent.last_statistics_at.map(|t| t.to_rfc3339()),
                agent.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!("agent {} already exists", agent.name))
            } else {
                db_error(e)
            }
        })?;
        Ok(())
    }

    fn update_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE agents SET name = ?, url = ?, enabled = ?, statistics_interval_secs = ?,
                    list_interval_secs = ?, min_free_disk_space = ?, files_submitted = ?,
                    last_statistics_at = ?
                 WHERE id = ?",
                params![
                    agent.name,
                    agent.url,
                    agent.enabled,
                    agent.statistics_interval_secs as i64,
                    agent.list_interval_secs as i64,
                    agent.min_free_disk_space,
                    agent.files_submitted,
                    agent.last_statistics_at.map(|t| t.to_rfc3339()),
                    agent.id,
                ],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(agent.id.clone()));
        }
        Ok(())
    }

    fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM agents WHERE id = ?", AGENT_COLUMNS),
            params![id],
            Self::row_to_agent,
        )
        .optional()
        .map_err(db_error)
    }

    fn find_agent_by_name(&self, name: &str) -> Result<Option<Agent>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM agents WHERE name = ?", AGENT_COLUMNS),
            params![name],
            Self::row_to_agent,
        )
        .optional()
        .map_err(db_error)
    }

    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM agents ORDER BY name ASC", AGENT_COLUMNS))
            .map_err(db_error)?;
        let rows = stmt.query_map([], Self::row_to_agent).map_err(db_error)?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row.map_err(db_error)?);
        }
        Ok(agents)
    }

    fn delete_agent(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM agents WHERE id = ?", params![id])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn insert_source(&self, source: &SourceRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sources ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SOURCE_COLUMNS
            ),
            params![
                source.id,
                source.name,
                source.url,
                source.enabled,
                source.interval_secs as i64,
                source.last_check.map(|t| t.to_rfc3339()),
                source.times_checked,
                source.releases_found,
                source.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!("source {} already exists", source.name))
            } else {
                db_error(e)
            }
        })?;
        Ok(())
    }

    fn update_source(&self, source: &SourceRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE sources SET name = ?, url = ?, enabled = ?, interval_secs = ?,
                    last_check = ?, times_checked = ?
                 WHERE id = ?",
                params![
                    source.name,
                    source.url,
                    source.enabled,
                    source.interval_secs as i64,
                    source.last_check.map(|t| t.to_rfc3339()),
                    source.times_checked,
                    source.id,
                ],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(source.id.clone()));
        }
        Ok(())
    }

    fn get_source(&self, id: &str) -> Result<Option<SourceRecord>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS),
            params![id],
            Self::row_to_source,
        )
        .optional()
        .map_err(db_error)
    }

    fn find_source_by_name(&self, name: &str) -> Result<Option<SourceRecord>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM sources WHERE name = ?", SOURCE_COLUMNS),
            params![name],
            Self::row_to_source,
        )
        .optional()
        .map_err(db_error)
    }

    fn list_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM sources ORDER BY name ASC", SOURCE_COLUMNS))
            .map_err(db_error)?;
        let rows = stmt.query_map([], Self::row_to_source).map_err(db_error)?;

        let mut sources = Vec::new();
        for row in rows {
            sources.push(row.map_err(db_error)?);
        }
        Ok(sources)
    }

    fn delete_source(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM sources WHERE id = ?", params![id])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn increment_source_releases(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE sources SET releases_found = releases_found + 1 WHERE id = ?",
                params![id],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(db_error)?;
        Ok(())
    }
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_column<T: FromStr<Err = String>>(index: usize, value: String) -> rusqlite::Result<T> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{Category, MetaFileKind, MetaFileState, NO_INDEX};
    use crate::testing::fixtures;

    fn create_test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get_release_with_meta_files() {
        let store = create_test_store();
        let release = fixtures::release("Some.Release-GRP", "ABCDEF0123");

        store.insert_release(&release).unwrap();

        let loaded = store.get_release(&release.id).unwrap().unwrap();
        assert_eq!(loaded.hash, "abcdef0123");
        assert_eq!(loaded.name, "Some.Release-GRP");
        assert_eq!(loaded.state, ReleaseState::New);
        assert_eq!(loaded.meta_files.len(), release.meta_files.len());
        assert_eq!(loaded.meta_files[0].index, NO_INDEX);
        assert_eq!(loaded.meta_files[0].kind, MetaFileKind::Torrent);
    }

    #[test]
    fn test_duplicate_hash_is_conflict() {
        let store = create_test_store();
        let first = fixtures::release("First", "aaaa");
        let second = fixtures::release("Second", "AAAA");

        store.insert_release(&first).unwrap();
        let err = store.insert_release(&second).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Nothing of the rejected release was written.
        assert!(store.get_release(&second.id).unwrap().is_none());
    }

    #[test]
    fn test_release_exists_by_hash_or_name() {
        let store = create_test_store();
        store
            .insert_release(&fixtures::release("Name.One", "1111"))
            .unwrap();

        assert!(store.release_exists("1111", "other").unwrap());
        assert!(store.release_exists("2222", "Name.One").unwrap());
        assert!(!store.release_exists("2222", "Name.Two").unwrap());
    }

    #[test]
    fn test_find_by_hash_is_case_insensitive() {
        let store = create_test_store();
        let release = fixtures::release("Name", "abcd");
        store.insert_release(&release).unwrap();

        let found = store.find_release_by_hash("ABCD").unwrap().unwrap();
        assert_eq!(found.id, release.id);
    }

    #[test]
    fn test_update_state_and_uploaded_at() {
        let store = create_test_store();
        let release = fixtures::release("Name", "abcd");
        store.insert_release(&release).unwrap();

        store
            .update_release_state(&release.id, ReleaseState::DownloadInit, None)
            .unwrap();
        let now = Utc::now();
        store
            .update_release_state(&release.id, ReleaseState::Uploaded, Some(now))
            .unwrap();

        let loaded = store.get_release(&release.id).unwrap().unwrap();
        assert_eq!(loaded.state, ReleaseState::Uploaded);
        assert_eq!(loaded.uploaded_at.unwrap().timestamp(), now.timestamp());

        let err = store
            .update_release_state("missing", ReleaseState::New, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_releases_by_state_and_agent() {
        let store = create_test_store();
        let a = fixtures::release("A", "aa");
        let b = fixtures::release("B", "bb");
        let c = fixtures::release("C", "cc");
        for r in [&a, &b, &c] {
            store.insert_release(r).unwrap();
        }
        store.assign_agent(&b.id, "agent-1").unwrap();
        store
            .update_release_state(&b.id, ReleaseState::Downloading, None)
            .unwrap();
        store
            .update_release_state(&c.id, ReleaseState::GeneralError, None)
            .unwrap();

        let live = store.list_releases(&ReleaseFilter::live()).unwrap();
        assert_eq!(live.len(), 2);

        let on_agent = store
            .list_releases(
                &ReleaseFilter::new()
                    .with_agent("agent-1")
                    .with_states(&[ReleaseState::Downloading]),
            )
            .unwrap();
        assert_eq!(on_agent.len(), 1);
        assert_eq!(on_agent[0].id, b.id);

        let counts = store.count_releases_by_state().unwrap();
        assert!(counts.contains(&(ReleaseState::New, 1)));
        assert!(counts.contains(&(ReleaseState::GeneralError, 1)));
    }

    #[test]
    fn test_save_meta_file_updates_in_place() {
        let store = create_test_store();
        let release = fixtures::release("Name", "abcd");
        store.insert_release(&release).unwrap();

        let mut nfo = release
            .meta_files
            .iter()
            .find(|m| m.kind == MetaFileKind::Nfo)
            .cloned()
            .unwrap();
        nfo.state = MetaFileState::Processed;
        nfo.info.insert("size".to_string(), "42".to_string());
        store.save_meta_file(&nfo).unwrap();

        let loaded = store.get_release(&release.id).unwrap().unwrap();
        let loaded_nfo = loaded.meta_file(MetaFileKind::Nfo).unwrap();
        assert_eq!(loaded_nfo.state, MetaFileState::Processed);
        assert_eq!(loaded_nfo.info.get("size").map(String::as_str), Some("42"));
        assert_eq!(loaded.meta_files.len(), release.meta_files.len());
    }

    #[test]
    fn test_save_meta_file_of_deleted_release_is_refused() {
        let store = create_test_store();
        let release = fixtures::release("Name", "abcd");
        store.insert_release(&release).unwrap();
        store.delete_release(&release.id).unwrap();

        let mut nfo = release.meta_file(MetaFileKind::Nfo).cloned().unwrap();
        nfo.state = MetaFileState::Processed;
        assert!(matches!(
            store.save_meta_file(&nfo),
            Err(StoreError::NotFound(_))
        ));

        let conn = store.conn().unwrap();
        let rows = SqliteStore::load_meta_files(&conn, &release.id).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_delete_release_removes_meta_files() {
        let store = create_test_store();
        let release = fixtures::release("Name", "abcd");
        store.insert_release(&release).unwrap();

        let deleted = store.delete_release(&release.id).unwrap();
        assert_eq!(deleted.id, release.id);
        assert!(store.get_release(&release.id).unwrap().is_none());
        assert!(matches!(
            store.delete_release(&release.id),
            Err(StoreError::NotFound(_))
        ));

        // The hash is free again.
        store.insert_release(&release).unwrap();
    }

    #[test]
    fn test_agent_crud() {
        let store = create_test_store();
        let mut agent = fixtures::agent("a1");
        store.insert_agent(&agent).unwrap();
        assert!(matches!(
            store.insert_agent(&agent),
            Err(StoreError::Conflict(_))
        ));

        agent.enabled = false;
        agent.files_submitted = 3;
        agent.last_statistics_at = Some(Utc::now());
        store.update_agent(&agent).unwrap();

        let loaded = store.get_agent("a1").unwrap().unwrap();
        assert!(!loaded.enabled);
        assert_eq!(loaded.files_submitted, 3);
        assert!(loaded.last_statistics_at.is_some());
        assert_eq!(
            store.find_agent_by_name(&agent.name).unwrap().unwrap().id,
            "a1"
        );

        store.delete_agent("a1").unwrap();
        assert!(store.list_agents().unwrap().is_empty());
    }

    #[test]
    fn test_source_counters() {
        let store = create_test_store();
        let mut source = fixtures::source("s1");
        store.insert_source(&source).unwrap();

        source.times_checked = 5;
        source.last_check = Some(Utc::now());
        store.update_source(&source).unwrap();
        store.increment_source_releases("s1").unwrap();
        store.increment_source_releases("s1").unwrap();

        let loaded = store.get_source("s1").unwrap().unwrap();
        assert_eq!(loaded.times_checked, 5);
        assert_eq!(loaded.releases_found, 2);
        assert!(loaded.last_check.is_some());
    }

    #[test]
    fn test_settings() {
        let store = create_test_store();
        assert_eq!(store.get_setting("k").unwrap(), None);
        store.set_setting("k", "one").unwrap();
        store.set_setting("k", "two").unwrap();
        assert_eq!(store.get_setting("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atus.db");
        let release = fixtures::release("Name", "abcd");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert_release(&release).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        let loaded = store.get_release(&release.id).unwrap().unwrap();
        assert_eq!(loaded.category, Category::Unknown);
    }
}
