//! libSQL storage layer for applicant records.
//!
//! The [`RecordStore`] struct wraps a local libSQL database holding one row
//! per dedup key plus scheduler tick history. Every mutation is committed
//! before the call returns, so a crash between ticks never loses state that
//! a stage handler already wrote back.
//!
//! The store is the dedup authority: [`RecordStore::upsert`] merges into any
//! existing row via [`Record::merge_update`], which is where the forward-only
//! stage guarantees live.

mod migrations;

use std::path::Path;

use chrono::Utc;
use hireflow_shared::{HireflowError, Record, RecordFilter, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct RecordStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl RecordStore {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HireflowError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    HireflowError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Record operations
    // -----------------------------------------------------------------------

    /// Insert the record, or merge it into the existing row for its dedup key.
    ///
    /// Fails with a validation error when `dedup_key` is empty — the caller
    /// logs and drops the record without aborting its batch.
    pub async fn upsert(&self, record: &Record) -> Result<()> {
        if record.dedup_key.is_empty() {
            return Err(HireflowError::validation(
                "record has an empty dedup_key; dropping it",
            ));
        }

        let now = Utc::now().to_rfc3339();

        let merged = match self.get(&record.dedup_key).await? {
            Some(mut existing) => {
                existing.merge_update(record.clone());
                existing
            }
            None => record.clone(),
        };

        let body = serde_json::to_string(&merged)
            .map_err(|e| HireflowError::Storage(format!("record serialization: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO records (dedup_key, submitted_at, record_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(dedup_key) DO UPDATE SET
                   submitted_at = excluded.submitted_at,
                   record_json = excluded.record_json,
                   updated_at = excluded.updated_at",
                params![
                    merged.dedup_key.as_str(),
                    merged.submitted_at.as_str(),
                    body.as_str(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Whether a record with this exact key and submission timestamp exists.
    pub async fn exists_duplicate(&self, dedup_key: &str, submitted_at: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM records WHERE dedup_key = ?1 AND submitted_at = ?2",
                params![dedup_key, submitted_at],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(HireflowError::Storage(e.to_string())),
        }
    }

    /// Get a record by dedup key.
    pub async fn get(&self, dedup_key: &str) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT record_json FROM records WHERE dedup_key = ?1",
                params![dedup_key],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(HireflowError::Storage(e.to_string())),
        }
    }

    /// All records matching `filter`, in stable dedup-key order.
    pub async fn find(&self, filter: RecordFilter) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT record_json FROM records ORDER BY dedup_key",
                params![],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let record = row_to_record(&row)?;
            if filter.matches(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Number of records matching `filter`.
    pub async fn count(&self, filter: RecordFilter) -> Result<usize> {
        Ok(self.find(filter).await?.len())
    }

    // -----------------------------------------------------------------------
    // Tick history
    // -----------------------------------------------------------------------

    /// Record the start of a scheduler tick. Returns the generated tick ID.
    pub async fn insert_tick(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ticks (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a tick finished with its stats JSON.
    pub async fn finish_tick(&self, tick_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ticks SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, tick_id],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Number of finished ticks on record.
    pub async fn finished_tick_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM ticks WHERE finished_at IS NOT NULL",
                params![],
            )
            .await
            .map_err(|e| HireflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| HireflowError::Storage(e.to_string()))?;
                Ok(count as usize)
            }
            _ => Ok(0),
        }
    }
}

/// Deserialize a stored record body.
fn row_to_record(row: &libsql::Row) -> Result<Record> {
    let body: String = row
        .get(0)
        .map_err(|e| HireflowError::Storage(e.to_string()))?;
    serde_json::from_str(&body)
        .map_err(|e| HireflowError::Storage(format!("corrupt record body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireflow_shared::{Attachment, Evaluation};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_store() -> RecordStore {
        let tmp = std::env::temp_dir().join(format!("hf_test_{}.db", Uuid::now_v7()));
        RecordStore::open(&tmp).await.expect("open test db")
    }

    fn record_with_text(key: &str, submitted_at: &str) -> Record {
        let mut record = Record::new(key, submitted_at);
        record.attachment = Some(Attachment {
            source_reference: "https://drive.google.com/file/d/abc/view".into(),
            local_reference: None,
            extracted_text: Some("resume text".into()),
            error: None,
        });
        record
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("hf_test_{}.db", Uuid::now_v7()));
        let s1 = RecordStore::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = RecordStore::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_empty_key() {
        let store = test_store().await;
        let record = Record::new("", "T1");
        let result = store.upsert(&record).await;
        assert!(matches!(
            result,
            Err(HireflowError::Validation { .. })
        ));
        assert_eq!(store.count(RecordFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_and_get() {
        let store = test_store().await;
        let mut record = Record::new("0811", "2025/01/01 10:00:00");
        record
            .profile_fields
            .insert("full_name".into(), "Test Applicant".into());

        store.upsert(&record).await.expect("upsert");

        let found = store.get("0811").await.expect("get").expect("present");
        assert_eq!(found.submitted_at, "2025/01/01 10:00:00");
        assert_eq!(
            found.profile_fields.get("full_name").map(String::as_str),
            Some("Test Applicant")
        );
        assert!(store
            .exists_duplicate("0811", "2025/01/01 10:00:00")
            .await
            .unwrap());
        assert!(!store.exists_duplicate("0811", "other").await.unwrap());
        assert!(!store.exists_duplicate("0812", "2025/01/01 10:00:00").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_same_key_merges_instead_of_duplicating() {
        let store = test_store().await;
        store
            .upsert(&Record::new("0811", "T1"))
            .await
            .expect("first upsert");
        store
            .upsert(&Record::new("0811", "T2"))
            .await
            .expect("second upsert");

        assert_eq!(store.count(RecordFilter::All).await.unwrap(), 1);
        let found = store.get("0811").await.unwrap().unwrap();
        assert_eq!(found.submitted_at, "T2");
    }

    #[tokio::test]
    async fn upsert_never_rewinds_stage_fields() {
        let store = test_store().await;

        let mut record = record_with_text("0811", "T1");
        record.questions = vec!["Q1".into(), "Q2".into()];
        record.evaluation = Some(Evaluation {
            commentary: "fine".into(),
            score: 75.0,
        });
        store.upsert(&record).await.expect("seed");

        // A later submission carries no stage fields
        let update = record_with_text("0811", "T2");
        store.upsert(&update).await.expect("update");

        let found = store.get("0811").await.unwrap().unwrap();
        assert_eq!(found.submitted_at, "T2");
        assert_eq!(found.questions, vec!["Q1".to_string(), "Q2".to_string()]);
        assert!(found.evaluation.is_some());
    }

    #[tokio::test]
    async fn find_awaiting_questions() {
        let store = test_store().await;

        // Eligible: extracted text, no questions
        store
            .upsert(&record_with_text("0811", "T1"))
            .await
            .unwrap();

        // Not eligible: questions already populated
        let mut done = record_with_text("0812", "T1");
        done.questions = vec!["Q1".into()];
        store.upsert(&done).await.unwrap();

        // Not eligible: no extracted text
        store.upsert(&Record::new("0813", "T1")).await.unwrap();

        let awaiting = store.find(RecordFilter::AwaitingQuestions).await.unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].dedup_key, "0811");
        assert!(awaiting.iter().all(|r| r.questions.is_empty()));
    }

    #[tokio::test]
    async fn find_awaiting_evaluation() {
        let store = test_store().await;

        let mut ready = record_with_text("0811", "T1");
        ready.questions = vec!["Q1".into()];
        ready.answers = vec!["A1".into()];
        store.upsert(&ready).await.unwrap();

        let mut unanswered = record_with_text("0812", "T1");
        unanswered.questions = vec!["Q1".into()];
        store.upsert(&unanswered).await.unwrap();

        let awaiting = store.find(RecordFilter::AwaitingEvaluation).await.unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].dedup_key, "0811");
        assert!(awaiting.iter().all(|r| !r.answers.is_empty()));
    }

    #[tokio::test]
    async fn find_order_is_stable() {
        let store = test_store().await;
        for key in ["0813", "0811", "0812"] {
            store.upsert(&Record::new(key, "T1")).await.unwrap();
        }

        let all = store.find(RecordFilter::All).await.unwrap();
        let keys: Vec<_> = all.iter().map(|r| r.dedup_key.as_str()).collect();
        assert_eq!(keys, vec!["0811", "0812", "0813"]);
    }

    #[tokio::test]
    async fn tick_lifecycle() {
        let store = test_store().await;

        let tick_id = store.insert_tick().await.expect("insert tick");
        assert!(!tick_id.is_empty());
        assert_eq!(store.finished_tick_count().await.unwrap(), 0);

        store
            .finish_tick(&tick_id, r#"{"processed": 3, "duplicates": 1}"#)
            .await
            .expect("finish tick");
        assert_eq!(store.finished_tick_count().await.unwrap(), 1);
    }
}
