//! Sentiment result repository — append-only rows per scored segment.
//!
//! Rows are only ever inserted (one per (competitor, segment) pair, or
//! one synthetic row when a competitor's scoring permanently fails)
//! and removed only by the job cascade.

use rusqlite::{params, Row};

use super::{now_rfc3339, Database, DatabaseError};

/// A sentiment result row.
#[derive(Debug, Clone)]
pub struct SentimentRow {
    pub id: String,
    pub job_id: String,
    pub competitor_name: String,
    pub segment_text: String,
    /// positive | negative | neutral | error
    pub sentiment: String,
    /// rule-based | llm-based | none (synthetic rows)
    pub detection_method: String,
    pub detection_details: Option<String>,
    /// Provenance back to the source transcript segment; absent for
    /// synthetic rows.
    pub segment_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: String,
}

impl SentimentRow {
    /// Builds a new row for insertion; id and created_at are assigned.
    pub fn new(job_id: &str, competitor_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            competitor_name: competitor_name.to_string(),
            segment_text: String::new(),
            sentiment: String::new(),
            detection_method: String::new(),
            detection_details: None,
            segment_id: None,
            start_time: None,
            end_time: None,
            created_at: now_rfc3339(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            competitor_name: row.get("competitor_name")?,
            segment_text: row.get("segment_text")?,
            sentiment: row.get("sentiment")?,
            detection_method: row.get("detection_method")?,
            detection_details: row.get("detection_details")?,
            segment_id: row.get("segment_id")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a sentiment result. Returns `false` when the row was
/// dropped by the (job_id, competitor_name, segment_id) dedupe index,
/// which happens when a scoring unit re-executes after a partial
/// completion. A missing job id is a hard foreign-key error.
pub fn insert(db: &Database, row: &SentimentRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "INSERT OR IGNORE INTO sentiment_results
             (id, job_id, competitor_name, segment_text, sentiment, detection_method,
              detection_details, segment_id, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.job_id,
                row.competitor_name,
                row.segment_text,
                row.sentiment,
                row.detection_method,
                row.detection_details,
                row.segment_id,
                row.start_time,
                row.end_time,
                row.created_at,
            ],
        )?;
        Ok(affected > 0)
    })
}

/// All sentiment rows for a job, insertion-ordered.
pub fn find_by_job(db: &Database, job_id: &str) -> Result<Vec<SentimentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM sentiment_results WHERE job_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![job_id], SentimentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of sentiment rows for a job.
pub fn count_by_job(db: &Database, job_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM sentiment_results WHERE job_id = ?1",
            params![job_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_row(job_id: &str, competitor: &str, segment_id: Option<&str>) -> SentimentRow {
        SentimentRow {
            segment_text: "They mentioned the competitor favourably".to_string(),
            sentiment: "positive".to_string(),
            detection_method: "llm-based".to_string(),
            detection_details: Some("explicit praise".to_string()),
            segment_id: segment_id.map(str::to_string),
            start_time: Some("12.4".to_string()),
            end_time: Some("18.9".to_string()),
            ..SentimentRow::new(job_id, competitor)
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let job = job_repo::create(&db, "a.mp3").unwrap();

        let inserted = insert(&db, &sample_row(&job.id, "Acme", Some("seg-1"))).unwrap();
        assert!(inserted);

        let rows = find_by_job(&db, &job.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].competitor_name, "Acme");
        assert_eq!(rows[0].sentiment, "positive");
        assert_eq!(rows[0].segment_id.as_deref(), Some("seg-1"));
    }

    #[test]
    fn test_insert_missing_job_is_hard_error() {
        let db = test_db();
        let err = insert(&db, &sample_row("ghost", "Acme", Some("seg-1"))).unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }

    #[test]
    fn test_duplicate_segment_insert_is_ignored() {
        let db = test_db();
        let job = job_repo::create(&db, "a.mp3").unwrap();

        assert!(insert(&db, &sample_row(&job.id, "Acme", Some("seg-1"))).unwrap());
        // A re-executed unit inserts the same natural key with a new row id.
        assert!(!insert(&db, &sample_row(&job.id, "Acme", Some("seg-1"))).unwrap());

        assert_eq!(count_by_job(&db, &job.id).unwrap(), 1);
    }

    #[test]
    fn test_same_segment_different_competitor_is_kept() {
        let db = test_db();
        let job = job_repo::create(&db, "a.mp3").unwrap();

        assert!(insert(&db, &sample_row(&job.id, "Acme", Some("seg-1"))).unwrap());
        assert!(insert(&db, &sample_row(&job.id, "Globex", Some("seg-1"))).unwrap());

        assert_eq!(count_by_job(&db, &job.id).unwrap(), 2);
    }

    #[test]
    fn test_synthetic_rows_are_not_deduplicated() {
        let db = test_db();
        let job = job_repo::create(&db, "a.mp3").unwrap();

        let error_row = SentimentRow {
            sentiment: "error".to_string(),
            detection_method: "none".to_string(),
            detection_details: Some("scoring failed after 3 attempts".to_string()),
            ..SentimentRow::new(&job.id, "Acme")
        };

        assert!(insert(&db, &error_row).unwrap());
        let again = SentimentRow {
            id: uuid::Uuid::new_v4().to_string(),
            ..error_row
        };
        assert!(insert(&db, &again).unwrap());
        assert_eq!(count_by_job(&db, &job.id).unwrap(), 2);
    }

    #[test]
    fn test_cascade_delete_with_job() {
        let db = test_db();
        let job = job_repo::create(&db, "a.mp3").unwrap();
        insert(&db, &sample_row(&job.id, "Acme", Some("seg-1"))).unwrap();
        insert(&db, &sample_row(&job.id, "Globex", Some("seg-2"))).unwrap();
        assert_eq!(count_by_job(&db, &job.id).unwrap(), 2);

        job_repo::delete(&db, &job.id).unwrap();
        assert_eq!(count_by_job(&db, &job.id).unwrap(), 0);
    }
}
