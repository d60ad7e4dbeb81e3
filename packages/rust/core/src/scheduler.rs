//! Fixed-interval scheduler driving the full stage-scan sequence.
//!
//! One tick = ingestion, then a scan per downstream stage. Everything runs
//! sequentially on a single task, so there are no intra-tick races on the
//! store. Per-record and per-collaborator failures are logged and skipped;
//! nothing short of a storage corruption aborts a tick.

use std::sync::Arc;

use hireflow_attach::AttachmentStore;
use hireflow_llm::ChatClient;
use hireflow_shared::{PipelineConfig, RecordFilter};
use hireflow_source::RecordSource;
use hireflow_storage::RecordStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{ingest, stages};

/// Counters from one scheduler tick, persisted to the tick history table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TickStats {
    /// Ingestion counters, absent when the source fetch itself failed.
    pub ingest: Option<ingest::IngestReport>,
    /// Records whose questions were generated this tick.
    pub questions_generated: usize,
    /// Records whose evaluation completed this tick.
    pub evaluations_completed: usize,
}

/// Drives the record lifecycle: poll, scan, advance.
pub struct Scheduler {
    store: RecordStore,
    source: Arc<dyn RecordSource>,
    attachments: Arc<dyn AttachmentStore>,
    llm: Arc<dyn ChatClient>,
    config: PipelineConfig,
}

impl Scheduler {
    pub fn new(
        store: RecordStore,
        source: Arc<dyn RecordSource>,
        attachments: Arc<dyn AttachmentStore>,
        llm: Arc<dyn ChatClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            source,
            attachments,
            llm,
            config,
        }
    }

    /// The record store this scheduler writes to.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run one full stage-scan sequence.
    #[instrument(skip_all)]
    pub async fn tick(&self) -> TickStats {
        let tick_id = match self.store.insert_tick().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not record tick start");
                None
            }
        };

        let mut stats = TickStats::default();

        // --- Stage 1: ingestion ---
        match ingest::run_ingest(
            self.source.as_ref(),
            self.attachments.as_ref(),
            &self.store,
            &self.config,
        )
        .await
        {
            Ok(report) => stats.ingest = Some(report),
            Err(e) => warn!(error = %e, "ingestion failed, will retry next tick"),
        }

        // --- Stage 2: question generation ---
        match self.store.find(RecordFilter::AwaitingQuestions).await {
            Ok(records) => {
                for record in records {
                    let Some(questions) = stages::generate_questions(
                        self.llm.as_ref(),
                        &record,
                        &self.config.position_field,
                    )
                    .await
                    else {
                        continue;
                    };

                    let mut updated = record;
                    updated.questions = questions;
                    match self.store.upsert(&updated).await {
                        Ok(()) => stats.questions_generated += 1,
                        Err(e) => {
                            warn!(dedup_key = %updated.dedup_key, error = %e, "question write-back failed")
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "question eligibility scan failed"),
        }

        // --- Stage 3: answer evaluation ---
        match self.store.find(RecordFilter::AwaitingEvaluation).await {
            Ok(records) => {
                for record in records {
                    let Some(evaluation) =
                        stages::evaluate_answers(self.llm.as_ref(), &record).await
                    else {
                        continue;
                    };

                    let mut updated = record;
                    updated.evaluation = Some(evaluation);
                    match self.store.upsert(&updated).await {
                        Ok(()) => stats.evaluations_completed += 1,
                        Err(e) => {
                            warn!(dedup_key = %updated.dedup_key, error = %e, "evaluation write-back failed")
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "evaluation eligibility scan failed"),
        }

        if let Some(tick_id) = tick_id {
            let stats_json = serde_json::to_string(&stats).unwrap_or_default();
            if let Err(e) = self.store.finish_tick(&tick_id, &stats_json).await {
                warn!(error = %e, "could not record tick finish");
            }
        }

        stats
    }

    /// Tick forever, sleeping the configured interval in between.
    ///
    /// Cancellation is observed only at the sleep, so an in-flight tick
    /// always completes before this returns.
    pub async fn run(&self, token: CancellationToken) {
        info!(interval = ?self.config.tick_interval, "scheduler loop started");
        loop {
            let stats = self.tick().await;
            info!(
                questions_generated = stats.questions_generated,
                evaluations_completed = stats.evaluations_completed,
                "tick complete"
            );

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }
        info!("scheduler loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hireflow_llm::Message;
    use hireflow_shared::{FieldPolicy, RawRecord};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            tick_interval: std::time::Duration::from_millis(10),
            key_field: "Phone Number".into(),
            timestamp_field: "Timestamp".into(),
            position_field: "desired_position".into(),
            attachment_fields: BTreeMap::from([(
                "Resume/CV".to_string(),
                FieldPolicy {
                    format: "pdf".into(),
                    extract_text: true,
                },
            )]),
            attachments_dir: std::env::temp_dir()
                .join(format!("hf_sched_{}", uuid::Uuid::now_v7())),
        }
    }

    async fn test_store() -> RecordStore {
        let tmp = std::env::temp_dir().join(format!("hf_sched_{}.db", uuid::Uuid::now_v7()));
        RecordStore::open(&tmp).await.expect("open test db")
    }

    fn applicant_row(phone: &str, timestamp: &str) -> RawRecord {
        let mut row = RawRecord::new();
        row.insert("Phone Number".into(), phone.into());
        row.insert("Timestamp".into(), timestamp.into());
        row.insert("Desired Position".into(), "Backend Engineer".into());
        row.insert(
            "Resume/CV".into(),
            "https://drive.google.com/file/d/abc/view".into(),
        );
        row
    }

    struct StaticSource(Vec<RawRecord>);

    #[async_trait]
    impl RecordSource for StaticSource {
        async fn fetch_all(&self) -> hireflow_shared::Result<Vec<RawRecord>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn fetch_all(&self) -> hireflow_shared::Result<Vec<RawRecord>> {
            Err(hireflow_shared::HireflowError::Source("HTTP 502".into()))
        }
    }

    struct TextAttachments;

    #[async_trait]
    impl AttachmentStore for TextAttachments {
        fn resolve_reference(&self, _reference: &str) -> hireflow_shared::Result<String> {
            Ok("file-id".into())
        }

        async fn fetch_binary(
            &self,
            _id: &str,
            _expected_mime: &str,
        ) -> hireflow_shared::Result<Vec<u8>> {
            Ok(b"%PDF-1.4 fake".to_vec())
        }

        fn extract_text(&self, _bytes: &[u8]) -> hireflow_shared::Result<String> {
            Ok("five years of Go".into())
        }
    }

    struct ScriptedChat {
        replies: Mutex<VecDeque<Option<String>>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Option<&str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
            }
        }

        fn remaining(&self) -> usize {
            self.replies.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, _messages: &[Message]) -> Option<String> {
            self.replies.lock().unwrap().pop_front().unwrap_or(None)
        }
    }

    const FIVE_QUESTIONS: &str =
        "[1. Q one?]\n[2. Q two?]\n[3. Q three?]\n[4. Q four?]\n[5. Q five?]";

    #[tokio::test]
    async fn tick_ingests_and_generates_questions() {
        let chat = Arc::new(ScriptedChat::new(vec![
            Some("commentary"),
            Some(FIVE_QUESTIONS),
        ]));
        let scheduler = Scheduler::new(
            test_store().await,
            Arc::new(StaticSource(vec![applicant_row("0811", "T1")])),
            Arc::new(TextAttachments),
            chat.clone(),
            test_config(),
        );

        let stats = scheduler.tick().await;
        assert_eq!(stats.ingest.unwrap().processed, 1);
        assert_eq!(stats.questions_generated, 1);
        assert_eq!(stats.evaluations_completed, 0);

        let record = scheduler.store().get("0811").await.unwrap().unwrap();
        assert_eq!(record.questions.len(), 5);
        assert_eq!(chat.remaining(), 0);
    }

    #[tokio::test]
    async fn second_tick_does_not_regenerate_questions() {
        let chat = Arc::new(ScriptedChat::new(vec![
            Some("commentary"),
            Some(FIVE_QUESTIONS),
        ]));
        let scheduler = Scheduler::new(
            test_store().await,
            Arc::new(StaticSource(vec![applicant_row("0811", "T1")])),
            Arc::new(TextAttachments),
            chat.clone(),
            test_config(),
        );

        scheduler.tick().await;
        let questions_before = scheduler
            .store()
            .get("0811")
            .await
            .unwrap()
            .unwrap()
            .questions;

        // The script is exhausted: any further model call would yield None,
        // and a populated record must not produce one anyway.
        let stats = scheduler.tick().await;
        assert_eq!(stats.questions_generated, 0);

        let questions_after = scheduler
            .store()
            .get("0811")
            .await
            .unwrap()
            .unwrap()
            .questions;
        assert_eq!(questions_before, questions_after);
    }

    #[tokio::test]
    async fn evaluation_runs_once_answers_arrive() {
        let chat = Arc::new(ScriptedChat::new(vec![
            // tick 1: questions
            Some("commentary"),
            Some("[1. Q one?]\n[2. Q two?]"),
            // tick 2: evaluation of two pairs
            Some("judgement one"),
            Some("[Score: 80]"),
            Some("judgement two"),
            Some("[Score: 90]"),
        ]));
        let scheduler = Scheduler::new(
            test_store().await,
            Arc::new(StaticSource(vec![applicant_row("0811", "T1")])),
            Arc::new(TextAttachments),
            chat.clone(),
            test_config(),
        );

        scheduler.tick().await;

        // Answers arrive from the external collection step
        let mut record = scheduler.store().get("0811").await.unwrap().unwrap();
        record.answers = vec!["A1".into(), "A2".into()];
        scheduler.store().upsert(&record).await.unwrap();

        let stats = scheduler.tick().await;
        assert_eq!(stats.evaluations_completed, 1);

        let record = scheduler.store().get("0811").await.unwrap().unwrap();
        let evaluation = record.evaluation.expect("evaluation set");
        assert_eq!(evaluation.score, 85.0);
        assert_eq!(chat.remaining(), 0);
        assert_eq!(
            scheduler
                .store()
                .count(RecordFilter::AwaitingEvaluation)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn failed_llm_leaves_record_eligible_for_retry() {
        let chat = Arc::new(ScriptedChat::new(vec![
            None, // tick 1 commentary call fails
            Some("commentary"),
            Some(FIVE_QUESTIONS),
        ]));
        let scheduler = Scheduler::new(
            test_store().await,
            Arc::new(StaticSource(vec![applicant_row("0811", "T1")])),
            Arc::new(TextAttachments),
            chat.clone(),
            test_config(),
        );

        let stats = scheduler.tick().await;
        assert_eq!(stats.questions_generated, 0);
        assert_eq!(
            scheduler
                .store()
                .count(RecordFilter::AwaitingQuestions)
                .await
                .unwrap(),
            1
        );

        let stats = scheduler.tick().await;
        assert_eq!(stats.questions_generated, 1);
    }

    #[tokio::test]
    async fn source_failure_does_not_abort_the_tick() {
        let store = test_store().await;

        // Seed a record that is already awaiting questions
        let mut seeded = hireflow_shared::Record::new("0811", "T1");
        seeded.attachment = Some(hireflow_shared::Attachment {
            source_reference: "ref".into(),
            local_reference: None,
            extracted_text: Some("resume".into()),
            error: None,
        });
        seeded
            .profile_fields
            .insert("desired_position".into(), "Backend Engineer".into());
        store.upsert(&seeded).await.unwrap();

        let chat = Arc::new(ScriptedChat::new(vec![
            Some("commentary"),
            Some(FIVE_QUESTIONS),
        ]));
        let scheduler = Scheduler::new(
            store,
            Arc::new(FailingSource),
            Arc::new(TextAttachments),
            chat,
            test_config(),
        );

        let stats = scheduler.tick().await;
        assert!(stats.ingest.is_none());
        assert_eq!(stats.questions_generated, 1);
    }

    #[tokio::test]
    async fn ticks_are_recorded() {
        let scheduler = Scheduler::new(
            test_store().await,
            Arc::new(StaticSource(vec![])),
            Arc::new(TextAttachments),
            Arc::new(ScriptedChat::new(vec![])),
            test_config(),
        );

        scheduler.tick().await;
        scheduler.tick().await;
        assert_eq!(scheduler.store().finished_tick_count().await.unwrap(), 2);
    }
}
