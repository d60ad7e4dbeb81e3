//! Ingest-Normalize stage: pull source rows, dedup, normalize, enrich, store.

use hireflow_attach::AttachmentStore;
use hireflow_shared::{HireflowError, PipelineConfig, Record, Result};
use hireflow_source::RecordSource;
use hireflow_storage::RecordStore;
use tracing::{debug, info, instrument, warn};

/// Counters from one ingestion pass.
///
/// `skipped` counts rows dropped for a missing dedup key or failed
/// validation — separate from `duplicates`, which is expected control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    /// Rows the source returned.
    pub fetched: usize,
    /// Rows stored (new records or legitimate updates).
    pub processed: usize,
    /// Exact duplicates skipped before any enrichment work.
    pub duplicates: usize,
    /// Rows dropped: missing dedup key or rejected by the store.
    pub skipped: usize,
}

/// Convert a raw field label to its stored form: lowercase, spaces to
/// underscores.
pub fn normalize_field_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Run one ingestion pass over everything the source currently returns.
///
/// The duplicate check runs before attachment resolution, so re-ingesting a
/// batch never repeats a download. A failing row is logged and counted; it
/// never aborts the rest of the batch.
#[instrument(skip_all)]
pub async fn run_ingest(
    source: &dyn RecordSource,
    attachments: &dyn AttachmentStore,
    store: &RecordStore,
    config: &PipelineConfig,
) -> Result<IngestReport> {
    let rows = source.fetch_all().await?;
    let mut report = IngestReport {
        fetched: rows.len(),
        ..Default::default()
    };

    for raw in &rows {
        let dedup_key = raw
            .get(&config.key_field)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        if dedup_key.is_empty() {
            warn!(key_field = %config.key_field, "row missing dedup key, skipping");
            report.skipped += 1;
            continue;
        }

        let submitted_at = raw
            .get(&config.timestamp_field)
            .cloned()
            .unwrap_or_default();

        if store.exists_duplicate(&dedup_key, &submitted_at).await? {
            debug!(dedup_key, submitted_at, "duplicate submission, skipping");
            report.duplicates += 1;
            continue;
        }

        let mut record = Record::new(&dedup_key, &submitted_at);
        for (name, value) in raw {
            record
                .profile_fields
                .insert(normalize_field_name(name), value.clone());
        }

        // Attachment fields are resolved inline: ingestion latency is
        // deliberately coupled to attachment storage availability.
        for (field, policy) in &config.attachment_fields {
            let Some(reference) = raw.get(field).filter(|v| !v.is_empty()) else {
                continue;
            };
            record.profile_fields.remove(&normalize_field_name(field));
            record.attachment = Some(
                hireflow_attach::resolve_field(
                    attachments,
                    reference,
                    policy,
                    &config.attachments_dir,
                )
                .await,
            );
            break;
        }

        match store.upsert(&record).await {
            Ok(()) => report.processed += 1,
            Err(HireflowError::Validation { message }) => {
                warn!(dedup_key, %message, "store rejected row, skipping");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        fetched = report.fetched,
        processed = report.processed,
        duplicates = report.duplicates,
        skipped = report.skipped,
        "ingestion pass complete"
    );
    Ok(report)
}
