//! Attachment storage collaborator and the attachment-resolution stage.
//!
//! [`AttachmentStore`] is the seam to wherever submitted files actually live;
//! the production implementation resolves Drive-style share URLs and downloads
//! through a configurable URL template. [`resolve_field`] is the stage
//! handler: it runs every step (resolve → download → persist → extract) and
//! captures any failure into the resulting [`Attachment`]'s `error` field
//! instead of returning it, so one bad file never aborts an ingest batch.

use std::path::Path;

use async_trait::async_trait;
use hireflow_shared::{Attachment, FieldPolicy, HireflowError, Result};
use regex::Regex;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

/// Default timeout in seconds for attachment downloads.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("Hireflow/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// AttachmentStore
// ---------------------------------------------------------------------------

/// Trait for the external system holding submitted attachments.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Resolve a submitted reference (share URL) to a file identifier.
    fn resolve_reference(&self, reference: &str) -> Result<String>;

    /// Download the binary for `id`, verifying the declared content type.
    async fn fetch_binary(&self, id: &str, expected_mime: &str) -> Result<Vec<u8>>;

    /// Extract text content from the binary. Best-effort; the stage handler
    /// captures failures rather than propagating them.
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

// ---------------------------------------------------------------------------
// DriveStore
// ---------------------------------------------------------------------------

/// Options for the Drive-style attachment store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Timeout for download requests in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Attachment store for Drive-style share links.
///
/// Downloads go through `download_url_template`, which must contain an
/// `{id}` placeholder for the resolved file identifier.
pub struct DriveStore {
    client: Client,
    download_url_template: String,
    id_patterns: Vec<Regex>,
}

impl DriveStore {
    /// Create a store downloading through the given URL template.
    pub fn new(download_url_template: impl Into<String>, opts: &StoreOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| HireflowError::Attachment(format!("client build: {e}")))?;

        // The share-URL shapes Drive hands out: /file/d/<id>/..., ?id=<id>,
        // and the legacy open?id=<id> form.
        let id_patterns = ["/file/d/([^/?]+)", "id=([^&]+)", r"open\?id=([^&]+)"]
            .iter()
            .map(|p| Regex::new(p).expect("static pattern"))
            .collect();

        Ok(Self {
            client,
            download_url_template: download_url_template.into(),
            id_patterns,
        })
    }
}

#[async_trait]
impl AttachmentStore for DriveStore {
    fn resolve_reference(&self, reference: &str) -> Result<String> {
        for pattern in &self.id_patterns {
            if let Some(captures) = pattern.captures(reference) {
                return Ok(captures[1].to_string());
            }
        }
        Err(HireflowError::Attachment(format!(
            "could not extract a file id from reference: {reference}"
        )))
    }

    #[instrument(skip(self, expected_mime))]
    async fn fetch_binary(&self, id: &str, expected_mime: &str) -> Result<Vec<u8>> {
        let url = self.download_url_template.replace("{id}", id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HireflowError::Attachment(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HireflowError::Attachment(format!("{url}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.starts_with(expected_mime) {
            return Err(HireflowError::Attachment(format!(
                "type mismatch for {id}: expected {expected_mime}, got {content_type}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HireflowError::Attachment(format!("{url}: {e}")))?;

        debug!(len = bytes.len(), "downloaded attachment");
        Ok(bytes.to_vec())
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| HireflowError::Attachment(format!("pdf extraction: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Stage handler
// ---------------------------------------------------------------------------

/// Resolve one attachment-typed field value into an [`Attachment`].
///
/// Never fails: any error from any step lands in the returned attachment's
/// `error` field and the record keeps its place in the pipeline.
pub async fn resolve_field(
    store: &dyn AttachmentStore,
    reference: &str,
    policy: &FieldPolicy,
    attachments_dir: &Path,
) -> Attachment {
    let mut attachment = Attachment::new(reference);

    let id = match store.resolve_reference(reference) {
        Ok(id) => id,
        Err(e) => {
            warn!(reference, error = %e, "attachment reference did not resolve");
            attachment.error = Some(e.to_string());
            return attachment;
        }
    };

    let bytes = match store.fetch_binary(&id, &policy.expected_mime()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(id, error = %e, "attachment download failed");
            attachment.error = Some(e.to_string());
            return attachment;
        }
    };

    match persist_copy(&bytes, &policy.format, attachments_dir) {
        Ok(path) => attachment.local_reference = Some(path),
        Err(e) => {
            warn!(id, error = %e, "could not persist attachment copy");
            attachment.error = Some(e.to_string());
            return attachment;
        }
    }

    if policy.extract_text {
        match store.extract_text(&bytes) {
            Ok(text) => attachment.extracted_text = Some(text),
            Err(e) => {
                warn!(id, error = %e, "text extraction failed");
                attachment.error = Some(e.to_string());
            }
        }
    }

    attachment
}

/// Write the binary under `attachments_dir`, named by content hash.
fn persist_copy(bytes: &[u8], format: &str, attachments_dir: &Path) -> Result<String> {
    std::fs::create_dir_all(attachments_dir)
        .map_err(|e| HireflowError::io(attachments_dir, e))?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());

    let path = attachments_dir.join(format!("{}.{format}", &digest[..16]));
    std::fs::write(&path, bytes).map_err(|e| HireflowError::io(&path, e))?;

    Ok(path.to_string_lossy().into_owned())
}
