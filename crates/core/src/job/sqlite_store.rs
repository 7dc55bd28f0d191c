//! SQLite-backed job store implementation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{JobError, JobFilter, JobStore};
use super::types::{ErrorStage, JobStatus, JobUpdate, NewJob, ScriptJob};

const SELECT_COLUMNS: &str = "id, source_path, file_name, channel, status, error_stage, \
     error_message, audio_path, subtitle_path, video_path, voice_task_id, video_task_id, \
     created_at, updated_at, started_at, completed_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                error_stage TEXT,
                error_message TEXT,
                audio_path TEXT,
                subtitle_path TEXT,
                video_path TEXT,
                voice_task_id TEXT,
                video_task_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_channel ON jobs(channel);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_active_source
                ON jobs(source_path) WHERE status NOT IN ('COMPLETED', 'ERROR');
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref channel) = filter.channel {
            conditions.push("channel = ?");
            params.push(Box::new(channel.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ScriptJob> {
        let status_str: String = row.get(4)?;
        let error_stage_str: Option<String> = row.get(5)?;

        Ok(ScriptJob {
            id: row.get(0)?,
            source_path: PathBuf::from(row.get::<_, String>(1)?),
            file_name: row.get(2)?,
            channel: row.get(3)?,
            // Only this module writes the column, so an unknown value means a corrupt row.
            status: status_str.parse().unwrap_or(JobStatus::Error),
            error_stage: error_stage_str.and_then(|s| s.parse::<ErrorStage>().ok()),
            error_message: row.get(6)?,
            audio_path: row.get::<_, Option<String>>(7)?.map(PathBuf::from),
            subtitle_path: row.get::<_, Option<String>>(8)?.map(PathBuf::from),
            video_path: row.get::<_, Option<String>>(9)?.map(PathBuf::from),
            voice_task_id: row.get(10)?,
            video_task_id: row.get(11)?,
            created_at: parse_timestamp(&row.get::<_, String>(12)?),
            updated_at: parse_timestamp(&row.get::<_, String>(13)?),
            started_at: row.get::<_, Option<String>>(14)?.map(|s| parse_timestamp(&s)),
            completed_at: row.get::<_, Option<String>>(15)?.map(|s| parse_timestamp(&s)),
        })
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<ScriptJob>, JobError> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    fn load_active_by_source(
        conn: &Connection,
        path: &Path,
    ) -> Result<Option<ScriptJob>, JobError> {
        conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE source_path = ? AND status NOT IN ('COMPLETED', 'ERROR') LIMIT 1",
                SELECT_COLUMNS
            ),
            params![path_str(path)],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: NewJob) -> Result<ScriptJob, JobError> {
        let conn = self.conn()?;

        if let Some(active) = Self::load_active_by_source(&conn, &request.source_path)? {
            return Err(JobError::DuplicateActive {
                path: request.source_path,
                job_id: active.id,
            });
        }

        let now = Utc::now();
        let file_name = request
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let job = ScriptJob {
            id: uuid::Uuid::new_v4().to_string(),
            source_path: request.source_path,
            file_name,
            channel: request.channel,
            status: JobStatus::Pending,
            error_stage: None,
            error_message: None,
            audio_path: None,
            subtitle_path: None,
            video_path: None,
            voice_task_id: None,
            video_task_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };

        conn.execute(
            "INSERT INTO jobs (id, source_path, file_name, channel, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                job.id,
                path_str(&job.source_path),
                job.file_name,
                job.channel,
                job.status.as_str(),
                format_timestamp(&now),
                format_timestamp(&now),
            ],
        )
        .map_err(db_err)?;

        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Option<ScriptJob>, JobError> {
        let conn = self.conn()?;
        Self::load(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<ScriptJob>, JobError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(db_err)?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(db_err)?);
        }

        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn update(&self, id: &str, update: JobUpdate) -> Result<ScriptJob, JobError> {
        let conn = self.conn()?;

        let mut job = Self::load(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if let Some(to) = update.status {
            if !job.status.can_transition_to(to) {
                return Err(JobError::InvalidTransition {
                    job_id: id.to_string(),
                    from: job.status,
                    to,
                });
            }
        }

        if job.status.is_terminal() {
            let mut changed = job.clone();
            update.apply_to(&mut changed);
            if changed != job {
                return Err(JobError::Finished {
                    job_id: id.to_string(),
                    status: job.status,
                });
            }
            return Ok(job);
        }

        update.apply_to(&mut job);
        job.updated_at = Utc::now();

        conn.execute(
            "UPDATE jobs SET status = ?, error_stage = ?, error_message = ?, audio_path = ?, \
             subtitle_path = ?, video_path = ?, voice_task_id = ?, video_task_id = ?, \
             updated_at = ?, started_at = ?, completed_at = ? WHERE id = ?",
            params![
                job.status.as_str(),
                job.error_stage.map(|s| s.as_str()),
                job.error_message,
                job.audio_path.as_deref().map(path_str),
                job.subtitle_path.as_deref().map(path_str),
                job.video_path.as_deref().map(path_str),
                job.voice_task_id,
                job.video_task_id,
                format_timestamp(&job.updated_at),
                job.started_at.map(|t| format_timestamp(&t)),
                job.completed_at.map(|t| format_timestamp(&t)),
                id,
            ],
        )
        .map_err(db_err)?;

        Ok(job)
    }

    fn find_active_by_source(&self, path: &Path) -> Result<Option<ScriptJob>, JobError> {
        let conn = self.conn()?;
        Self::load_active_by_source(&conn, path)
    }
}

fn db_err(e: rusqlite::Error) -> JobError {
    JobError::Database(e.to_string())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

// Fixed width so text ordering matches time ordering.
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
