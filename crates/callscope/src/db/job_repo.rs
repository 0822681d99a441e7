//! Job repository — atomic single-row operations on the `jobs` table.
//!
//! The job row is the authoritative record of a pipeline run. Every
//! write is keyed by job id and fails hard (`JobNotFound`) when the id
//! does not exist.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{now_rfc3339, Database, DatabaseError};

/// Job lifecycle states. The only legal transitions are
/// `PENDING -> PROCESSING -> {COMPLETED | FAILED}`; a failed job is
/// terminal and must be resubmitted as a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stereo channel of the source recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
        }
    }

    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub left_channel_url: Option<String>,
    pub right_channel_url: Option<String>,
    pub left_transcript_path: Option<String>,
    pub right_transcript_path: Option<String>,
    /// Ordered competitor names from the detection stage.
    pub competitors_found: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_text: String = row.get("status")?;
        let status = JobStatus::parse(&status_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown job status '{}'", status_text).into(),
            )
        })?;

        let competitors_json: Option<String> = row.get("competitors_found")?;
        let competitors_found = match competitors_json {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("invalid competitors_found JSON: {}", e).into(),
                )
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            status,
            error_message: row.get("error_message")?,
            left_channel_url: row.get("left_channel_url")?,
            right_channel_url: row.get("right_channel_url")?,
            left_transcript_path: row.get("left_transcript_path")?,
            right_transcript_path: row.get("right_transcript_path")?,
            competitors_found,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    /// Audio URL for the given channel, if the split step recorded it.
    pub fn channel_url(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Left => self.left_channel_url.as_deref(),
            Channel::Right => self.right_channel_url.as_deref(),
        }
    }

    /// Transcript blob path for the given channel, if transcribed.
    pub fn transcript_path(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Left => self.left_transcript_path.as_deref(),
            Channel::Right => self.right_transcript_path.as_deref(),
        }
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Creates a new PENDING job for an uploaded recording.
pub fn create(db: &Database, filename: &str) -> Result<JobRow, DatabaseError> {
    let now = now_rfc3339();
    let job = JobRow {
        id: uuid::Uuid::new_v4().to_string(),
        filename: filename.to_string(),
        status: JobStatus::Pending,
        error_message: None,
        left_channel_url: None,
        right_channel_url: None,
        left_transcript_path: None,
        right_transcript_path: None,
        competitors_found: Vec::new(),
        created_at: now.clone(),
        updated_at: now,
        completed_at: None,
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, filename, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.id,
                job.filename,
                job.status.as_str(),
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })?;

    Ok(job)
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Updates the job status. Setting COMPLETED stamps `completed_at`
/// (first completion only); an error message is recorded alongside a
/// FAILED transition. Re-setting the same status is a no-op apart from
/// the `updated_at` refresh.
pub fn update_status(
    db: &Database,
    id: &str,
    status: JobStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    let completed_at = (status == JobStatus::Completed).then(|| now.clone());

    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = ?2, updated_at = ?3,
             error_message = COALESCE(?4, error_message),
             completed_at = COALESCE(completed_at, ?5)
             WHERE id = ?1",
            params![id, status.as_str(), now, error_message, completed_at],
        )?;
        if affected == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Records the per-channel audio URLs produced by the split step.
pub fn set_channel_urls(
    db: &Database,
    id: &str,
    left: &str,
    right: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET left_channel_url = ?2, right_channel_url = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, left, right, now_rfc3339()],
        )?;
        if affected == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Records the transcript blob path for one channel. The two channels
/// are written independently as their transcription units complete.
pub fn set_transcript_path(
    db: &Database,
    id: &str,
    channel: Channel,
    path: &str,
) -> Result<(), DatabaseError> {
    let sql = match channel {
        Channel::Left => {
            "UPDATE jobs SET left_transcript_path = ?2, updated_at = ?3 WHERE id = ?1"
        }
        Channel::Right => {
            "UPDATE jobs SET right_transcript_path = ?2, updated_at = ?3 WHERE id = ?1"
        }
    };

    db.with_conn(|conn| {
        let affected = conn.execute(sql, params![id, path, now_rfc3339()])?;
        if affected == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Records the ordered competitor list from the detection stage.
pub fn set_competitors(db: &Database, id: &str, names: &[String]) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(names).map_err(|e| {
        DatabaseError::Sqlite(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    })?;

    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET competitors_found = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, json, now_rfc3339()],
        )?;
        if affected == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Queries jobs with filters, newest first, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let (where_clause, status_param) = match filter.status {
            Some(status) => ("WHERE status = ?1", Some(status.as_str())),
            None => ("", None),
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let total: u64 = match status_param {
            Some(status) => conn.query_row(&count_sql, params![status], |r| r.get(0))?,
            None => conn.query_row(&count_sql, [], |r| r.get(0))?,
        };

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            if status_param.is_some() { 2 } else { 1 },
            if status_param.is_some() { 3 } else { 2 },
        );

        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = match status_param {
            Some(status) => stmt
                .query_map(params![status, limit, offset], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit, offset], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok((rows, total))
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes a job. Sentiment rows cascade with it.
pub fn delete(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}
