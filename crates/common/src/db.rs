//! SQLite database for V&V state persistence

use crate::config::DatabaseLocation;
use crate::types::*;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;

        // WAL keeps readers unblocked while a run records results
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self::from_connection(conn)?;
        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open whatever the configuration points at
    pub fn open_location(location: &DatabaseLocation) -> Result<Self> {
        match location {
            DatabaseLocation::File(path) => Self::open(path),
            DatabaseLocation::Memory => Self::open_memory(),
        }
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Create tables and indices if they don't exist
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS srs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                content TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS ix_srs_title ON srs(title);

            CREATE TABLE IF NOT EXISTS test_case (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                srs_id INTEGER NOT NULL
                    REFERENCES srs(id) ON DELETE CASCADE ON UPDATE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                priority TEXT,
                tags TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CONSTRAINT uq_test_case_srs_name UNIQUE (srs_id, name)
            );
            CREATE INDEX IF NOT EXISTS ix_test_case_srs_id ON test_case(srs_id);
            CREATE INDEX IF NOT EXISTS ix_test_case_name ON test_case(name);

            CREATE TABLE IF NOT EXISTS script (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_case_id INTEGER NOT NULL
                    REFERENCES test_case(id) ON DELETE CASCADE ON UPDATE CASCADE,
                language TEXT NOT NULL DEFAULT 'python',
                framework TEXT NOT NULL DEFAULT 'pytest-playwright',
                content TEXT,
                file_path TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS ix_script_test_case_id ON script(test_case_id);
            CREATE INDEX IF NOT EXISTS ix_script_framework ON script(framework);

            CREATE TABLE IF NOT EXISTS run (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                started_at INTEGER,
                finished_at INTEGER,
                triggered_by TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS ix_run_status ON run(status);
            CREATE INDEX IF NOT EXISTS ix_run_label ON run(label);

            CREATE TABLE IF NOT EXISTS test_result (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL
                    REFERENCES run(id) ON DELETE CASCADE ON UPDATE CASCADE,
                script_id INTEGER NOT NULL
                    REFERENCES script(id) ON DELETE CASCADE ON UPDATE CASCADE,
                outcome TEXT NOT NULL DEFAULT 'pending',
                duration_ms INTEGER,
                message TEXT,
                artifacts_path TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CONSTRAINT uq_test_result_run_script UNIQUE (run_id, script_id)
            );
            CREATE INDEX IF NOT EXISTS ix_test_result_run_id ON test_result(run_id);
            CREATE INDEX IF NOT EXISTS ix_test_result_script_id ON test_result(script_id);
            CREATE INDEX IF NOT EXISTS ix_test_result_outcome ON test_result(outcome);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // SRS
    // ========================================================================

    pub fn create_srs(&self, new: &NewSrs) -> Result<Srs> {
        if new.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO srs (title, description, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.title, new.description, new.content, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Inserted srs with id {}", id);
        fetch_srs(&conn, id)?.ok_or_else(|| Error::not_found("SRS", id))
    }

    pub fn get_srs(&self, id: i64) -> Result<Option<Srs>> {
        let conn = self.conn.lock();
        fetch_srs(&conn, id)
    }

    pub fn list_srs(&self) -> Result<Vec<Srs>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM srs ORDER BY id", SRS_COLUMNS))?;
        let rows = stmt.query_map([], srs_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete an SRS together with its test cases, scripts and results
    pub fn delete_srs(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM srs WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted srs with id {}", id);
        }
        Ok(rows > 0)
    }

    // ========================================================================
    // Test cases
    // ========================================================================

    /// Insert a test case, or refresh the existing one with the same name
    /// under the same SRS.
    pub fn upsert_test_case(&self, srs_id: i64, draft: &TestCaseDraft) -> Result<TestCase> {
        let conn = self.conn.lock();
        let now = now_millis();
        let id: i64 = conn.query_row(
            "INSERT INTO test_case (srs_id, name, description, priority, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(srs_id, name) DO UPDATE SET
                description = excluded.description,
                priority = excluded.priority,
                tags = excluded.tags,
                updated_at = excluded.updated_at
             RETURNING id",
            params![srs_id, draft.name, draft.description, draft.priority, draft.tags, now],
            |row| row.get(0),
        )?;
        fetch_test_case(&conn, id)?.ok_or_else(|| Error::not_found("TestCase", id))
    }

    pub fn get_test_case(&self, id: i64) -> Result<Option<TestCase>> {
        let conn = self.conn.lock();
        fetch_test_case(&conn, id)
    }

    pub fn list_test_cases(&self, srs_id: Option<i64>) -> Result<Vec<TestCase>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM test_case WHERE (?1 IS NULL OR srs_id = ?1) ORDER BY id",
            TEST_CASE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![srs_id], test_case_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // Scripts
    // ========================================================================

    pub fn create_script(&self, new: &NewScript) -> Result<Script> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO script (test_case_id, language, framework, content, file_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                new.test_case_id,
                new.language,
                new.framework,
                new.content,
                new.file_path,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Inserted script with id {}", id);
        fetch_script(&conn, id)?.ok_or_else(|| Error::not_found("Script", id))
    }

    pub fn get_script(&self, id: i64) -> Result<Option<Script>> {
        let conn = self.conn.lock();
        fetch_script(&conn, id)
    }

    pub fn list_scripts(&self, test_case_id: Option<i64>) -> Result<Vec<Script>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM script WHERE (?1 IS NULL OR test_case_id = ?1) ORDER BY id",
            SCRIPT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![test_case_id], script_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Scripts whose ids appear in `ids`; unknown ids are ignored
    pub fn scripts_by_ids(&self, ids: &[i64]) -> Result<Vec<Script>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM script WHERE id IN ({}) ORDER BY id",
            SCRIPT_COLUMNS, placeholders
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), script_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Record a run that is starting now
    pub fn create_run(&self, label: Option<&str>, triggered_by: Option<&str>) -> Result<Run> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO run (label, status, started_at, triggered_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?3, ?3)",
            params![label, RunStatus::Running.to_string(), now, triggered_by],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Inserted run with id {}", id);
        fetch_run(&conn, id)?.ok_or_else(|| Error::not_found("Run", id))
    }

    /// Set the terminal status and finish time
    pub fn finish_run(&self, id: i64, status: RunStatus) -> Result<Run> {
        let conn = self.conn.lock();
        let now = now_millis();
        let rows = conn.execute(
            "UPDATE run SET status = ?1, finished_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), now, id],
        )?;
        if rows == 0 {
            return Err(Error::not_found("Run", id));
        }
        fetch_run(&conn, id)?.ok_or_else(|| Error::not_found("Run", id))
    }

    pub fn get_run(&self, id: i64) -> Result<Option<Run>> {
        let conn = self.conn.lock();
        fetch_run(&conn, id)
    }

    /// All runs, newest first
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM run ORDER BY created_at DESC, id DESC",
            RUN_COLUMNS
        ))?;
        let rows = stmt.query_map([], run_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn latest_run(&self) -> Result<Option<Run>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM run ORDER BY created_at DESC, id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                [],
                run_from_row,
            )
            .optional()?)
    }

    // ========================================================================
    // Results
    // ========================================================================

    pub fn insert_result(&self, new: &NewTestResult) -> Result<TestResult> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO test_result (run_id, script_id, outcome, duration_ms, message, artifacts_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                new.run_id,
                new.script_id,
                new.outcome.to_string(),
                new.duration_ms,
                new.message,
                new.artifacts_path,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {} FROM test_result WHERE id = ?1", RESULT_COLUMNS),
            params![id],
            result_from_row,
        )?)
    }

    pub fn results_for_run(&self, run_id: i64) -> Result<Vec<TestResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM test_result WHERE run_id = ?1 ORDER BY id",
            RESULT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![run_id], result_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn summarize_run(&self, run_id: i64) -> Result<RunSummary> {
        Ok(RunSummary::from_results(&self.results_for_run(run_id)?))
    }
}

// ============================================================================
// Row mapping
// ============================================================================

const SRS_COLUMNS: &str = "id, title, description, content, created_at, updated_at";
const TEST_CASE_COLUMNS: &str =
    "id, srs_id, name, description, priority, tags, created_at, updated_at";
const SCRIPT_COLUMNS: &str =
    "id, test_case_id, language, framework, content, file_path, created_at, updated_at";
const RUN_COLUMNS: &str =
    "id, label, status, started_at, finished_at, triggered_by, created_at, updated_at";
const RESULT_COLUMNS: &str =
    "id, run_id, script_id, outcome, duration_ms, message, artifacts_path, created_at, updated_at";

fn fetch_srs(conn: &Connection, id: i64) -> Result<Option<Srs>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM srs WHERE id = ?1", SRS_COLUMNS),
            params![id],
            srs_from_row,
        )
        .optional()?)
}

fn fetch_test_case(conn: &Connection, id: i64) -> Result<Option<TestCase>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM test_case WHERE id = ?1", TEST_CASE_COLUMNS),
            params![id],
            test_case_from_row,
        )
        .optional()?)
}

fn fetch_script(conn: &Connection, id: i64) -> Result<Option<Script>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM script WHERE id = ?1", SCRIPT_COLUMNS),
            params![id],
            script_from_row,
        )
        .optional()?)
}

fn fetch_run(conn: &Connection, id: i64) -> Result<Option<Run>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM run WHERE id = ?1", RUN_COLUMNS),
            params![id],
            run_from_row,
        )
        .optional()?)
}

fn srs_from_row(row: &Row<'_>) -> rusqlite::Result<Srs> {
    Ok(Srs {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        created_at: from_millis(row.get(4)?),
        updated_at: from_millis(row.get(5)?),
    })
}

fn test_case_from_row(row: &Row<'_>) -> rusqlite::Result<TestCase> {
    Ok(TestCase {
        id: row.get(0)?,
        srs_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        priority: row.get(4)?,
        tags: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}

fn script_from_row(row: &Row<'_>) -> rusqlite::Result<Script> {
    Ok(Script {
        id: row.get(0)?,
        test_case_id: row.get(1)?,
        language: row.get(2)?,
        framework: row.get(3)?,
        content: row.get(4)?,
        file_path: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        label: row.get(1)?,
        status: row.get::<_, String>(2)?.parse().unwrap_or_default(),
        started_at: row.get::<_, Option<i64>>(3)?.map(from_millis),
        finished_at: row.get::<_, Option<i64>>(4)?.map(from_millis),
        triggered_by: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        id: row.get(0)?,
        run_id: row.get(1)?,
        script_id: row.get(2)?,
        outcome: row.get::<_, String>(3)?.parse().unwrap_or_default(),
        duration_ms: row.get(4)?,
        message: row.get(5)?,
        artifacts_path: row.get(6)?,
        created_at: from_millis(row.get(7)?),
        updated_at: from_millis(row.get(8)?),
    })
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
