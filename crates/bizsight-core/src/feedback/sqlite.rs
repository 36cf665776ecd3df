//! SQLite feedback store with connection pooling

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::{validate_actual, FeedbackRecord, FeedbackStatus, FeedbackStore, NewFeedback};
use crate::error::{Error, Result};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

const SELECT_COLUMNS: &str = r#"
    SELECT insight_id, predicted_value, prediction_type, predicted_at,
           tracking_period_weeks, status, actual_value, accuracy_pct, resolved_at, id
    FROM insight_feedback
"#;

/// Feedback records in a SQLite database
#[derive(Clone)]
pub struct SqliteFeedbackStore {
    pool: DbPool,
}

impl SqliteFeedbackStore {
    /// Open (or create) a feedback database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder().max_size(10).build(manager)?;

        let store = Self { pool };
        store.run_migrations()?;
        info!("Opened feedback store at {}", path.display());
        Ok(store)
    }

    /// In-memory database (for testing)
    ///
    /// Every connection to `:memory:` is a separate database, so the pool
    /// holds exactly one.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.run_migrations()?;
        Ok(store)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS insight_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                insight_id TEXT NOT NULL,
                predicted_value REAL NOT NULL,
                prediction_type TEXT NOT NULL,
                predicted_at TEXT NOT NULL,
                tracking_period_weeks INTEGER NOT NULL CHECK (tracking_period_weeks >= 1),
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'resolved')),
                actual_value REAL,
                accuracy_pct REAL,
                resolved_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_insight_feedback_status
                ON insight_feedback(status);

            -- At most one open prediction per insight
            CREATE UNIQUE INDEX IF NOT EXISTS idx_insight_feedback_pending
                ON insight_feedback(insight_id) WHERE status = 'pending';

            CREATE INDEX IF NOT EXISTS idx_insight_feedback_insight
                ON insight_feedback(insight_id, predicted_at);
            "#,
        )?;
        debug!("Feedback migrations applied");
        Ok(())
    }
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackRecord> {
    let predicted_at: String = row.get(3)?;
    let status: String = row.get(5)?;
    let resolved_at: Option<String> = row.get(8)?;

    Ok(FeedbackRecord {
        insight_id: row.get(0)?,
        predicted_value: row.get(1)?,
        prediction_type: row.get(2)?,
        predicted_at: parse_timestamp(3, &predicted_at)?,
        tracking_period_weeks: row.get(4)?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
        })?,
        actual_value: row.get(6)?,
        accuracy_pct: row.get(7)?,
        resolved_at: resolved_at
            .map(|s| parse_timestamp(8, &s))
            .transpose()?,
    })
}

impl FeedbackStore for SqliteFeedbackStore {
    fn insert(&self, feedback: &NewFeedback) -> Result<FeedbackRecord> {
        feedback.validate()?;
        let conn = self.conn()?;

        // The pending-only unique index decides; resolved rows never block
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO insight_feedback
                (insight_id, predicted_value, prediction_type, predicted_at,
                 tracking_period_weeks, status)
            VALUES (?, ?, ?, ?, ?, 'pending')
            "#,
            params![
                feedback.insight_id,
                feedback.predicted_value,
                feedback.prediction_type,
                feedback.predicted_at.to_rfc3339(),
                feedback.tracking_period_weeks,
            ],
        )?;
        if inserted == 0 {
            return Err(Error::FeedbackAlreadyTracked(feedback.insight_id.clone()));
        }
        Ok(feedback.clone().into_record())
    }

    fn resolve(
        &self,
        insight_id: &str,
        actual: f64,
        resolved_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        validate_actual(actual)?;
        let conn = self.conn()?;
        let pending = conn
            .query_row(
                &format!("{} WHERE insight_id = ? AND status = 'pending'", SELECT_COLUMNS),
                params![insight_id],
                |row| Ok((row.get::<_, i64>(9)?, record_from_row(row)?)),
            )
            .optional()?;
        let (row_id, current) = match pending {
            Some(record) => record,
            None => {
                let tracked: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM insight_feedback WHERE insight_id = ?)",
                    params![insight_id],
                    |row| row.get(0),
                )?;
                return Err(if tracked {
                    Error::FeedbackAlreadyResolved(insight_id.to_string())
                } else {
                    Error::FeedbackNotFound(insight_id.to_string())
                });
            }
        };

        let resolved = current.resolved(actual, resolved_at);
        // Only this row while still pending, so a racing resolve loses here
        let updated = conn.execute(
            r#"
            UPDATE insight_feedback
            SET status = 'resolved', actual_value = ?, accuracy_pct = ?, resolved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
            params![
                actual,
                resolved.accuracy_pct,
                resolved_at.to_rfc3339(),
                row_id,
            ],
        )?;
        if updated != 1 {
            return Err(Error::FeedbackAlreadyResolved(insight_id.to_string()));
        }
        Ok(resolved)
    }

    fn get(&self, insight_id: &str) -> Result<Option<FeedbackRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "{} WHERE insight_id = ? ORDER BY predicted_at DESC, id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![insight_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn list(&self, status: Option<FeedbackStatus>) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR status = ?1) ORDER BY predicted_at, insight_id, id",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![status.map(|s| s.as_str())], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn pending(id: &str, weeks_ago: i64) -> NewFeedback {
        let mut feedback = NewFeedback::new(id, 1000.0, "annual_revenue_increase", 12);
        feedback.predicted_at = Utc::now() - ChronoDuration::weeks(weeks_ago);
        feedback
    }

    #[test]
    fn test_insert_and_get() {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        let feedback = pending("revenue_decline", 1);
        store.insert(&feedback).unwrap();

        let record = store.get("revenue_decline").unwrap().unwrap();
        assert_eq!(record.status, FeedbackStatus::Pending);
        assert_eq!(record.predicted_value, 1000.0);
        assert_eq!(record.tracking_period_weeks, 12);
        assert_eq!(
            record.predicted_at.timestamp_micros(),
            feedback.predicted_at.timestamp_micros()
        );
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        store.insert(&pending("margin_spread", 1)).unwrap();
        let mut again = pending("margin_spread", 0);
        again.predicted_value = 5.0;

        assert!(matches!(
            store.insert(&again),
            Err(Error::FeedbackAlreadyTracked(_))
        ));
        assert_eq!(
            store.get("margin_spread").unwrap().unwrap().predicted_value,
            1000.0
        );
    }

    #[test]
    fn test_resolve_once() {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        store.insert(&pending("revenue_decline", 13)).unwrap();

        let resolved = store.resolve("revenue_decline", 800.0, Utc::now()).unwrap();
        assert_eq!(resolved.status, FeedbackStatus::Resolved);
        assert!((resolved.accuracy_pct.unwrap() - 80.0).abs() < 1e-9);

        assert!(matches!(
            store.resolve("revenue_decline", 1000.0, Utc::now()),
            Err(Error::FeedbackAlreadyResolved(_))
        ));
        assert!(matches!(
            store.resolve("unknown", 1.0, Utc::now()),
            Err(Error::FeedbackNotFound(_))
        ));

        let stored = store.get("revenue_decline").unwrap().unwrap();
        assert_eq!(stored.actual_value, Some(800.0));
        assert!(stored.resolved_at.is_some());
    }

    #[test]
    fn test_resolved_insight_can_be_tracked_again() {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        store.insert(&pending("revenue_decline", 14)).unwrap();
        store.resolve("revenue_decline", 800.0, Utc::now()).unwrap();

        let mut next = pending("revenue_decline", 0);
        next.predicted_value = 2000.0;
        store.insert(&next).unwrap();
        assert!(matches!(
            store.insert(&pending("revenue_decline", 0)),
            Err(Error::FeedbackAlreadyTracked(_))
        ));

        let latest = store.get("revenue_decline").unwrap().unwrap();
        assert_eq!(latest.status, FeedbackStatus::Pending);
        assert_eq!(latest.predicted_value, 2000.0);

        let resolved = store.resolve("revenue_decline", 1500.0, Utc::now()).unwrap();
        assert_eq!(resolved.predicted_value, 2000.0);
        assert_eq!(resolved.accuracy_pct, Some(75.0));

        let history = store.history("revenue_decline").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].actual_value, Some(800.0));
        assert_eq!(history[1].actual_value, Some(1500.0));
        assert!(matches!(
            store.resolve("revenue_decline", 1.0, Utc::now()),
            Err(Error::FeedbackAlreadyResolved(_))
        ));
    }

    #[test]
    fn test_list_due_and_summary() {
        let store = SqliteFeedbackStore::in_memory().unwrap();
        store.insert(&pending("a_overdue", 20)).unwrap();
        store.insert(&pending("b_recent", 1)).unwrap();
        store.insert(&pending("c_resolved", 30)).unwrap();
        store.resolve("c_resolved", 500.0, Utc::now()).unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(
            all.iter().map(|r| r.insight_id.as_str()).collect::<Vec<_>>(),
            vec!["c_resolved", "a_overdue", "b_recent"]
        );
        assert_eq!(store.list(Some(FeedbackStatus::Pending)).unwrap().len(), 2);

        let due = store.due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].insight_id, "a_overdue");

        let summary = store.summary(Utc::now()).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.due, 1);
        assert_eq!(summary.mean_accuracy_pct, Some(50.0));
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("feedback.db");
        {
            let store = SqliteFeedbackStore::open(&path).unwrap();
            store.insert(&pending("location_concentration", 2)).unwrap();
        }
        let store = SqliteFeedbackStore::open(&path).unwrap();
        assert!(store.get("location_concentration").unwrap().is_some());
    }

    #[test]
    fn test_concurrent_resolution_succeeds_once() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteFeedbackStore::open(dir.path().join("feedback.db")).unwrap());
        store.insert(&pending("seasonal_volatility", 13)).unwrap();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.resolve("seasonal_volatility", 900.0 + i as f64, Utc::now())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().all(|r| matches!(
            r,
            Ok(_) | Err(Error::FeedbackAlreadyResolved(_))
        )));
    }
}
