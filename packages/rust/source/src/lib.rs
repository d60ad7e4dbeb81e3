//! Data source collaborator: fetching raw applicant rows.
//!
//! The core treats the source as a black box behind [`RecordSource`]; the
//! production implementation polls a published-sheet JSON export over HTTP.
//! Schema drift in raw field names is absorbed downstream by ingest
//! normalization, so rows are delivered exactly as the sheet labels them.

use async_trait::async_trait;
use hireflow_shared::{HireflowError, RawRecord, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

/// Default timeout in seconds for source requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("Hireflow/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// RecordSource
// ---------------------------------------------------------------------------

/// Trait for the external data source the scheduler polls each tick.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every row currently visible at the source.
    async fn fetch_all(&self) -> Result<Vec<RawRecord>>;
}

// ---------------------------------------------------------------------------
// SheetSource
// ---------------------------------------------------------------------------

/// Options for the HTTP sheet source.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Fetches rows from a published-sheet JSON export (an array of objects,
/// one per form response).
pub struct SheetSource {
    client: Client,
    url: Url,
}

impl SheetSource {
    /// Create a sheet source for the given export URL.
    pub fn new(url: Url, opts: &SourceOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| HireflowError::Source(format!("client build: {e}")))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl RecordSource for SheetSource {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| HireflowError::Source(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HireflowError::Source(format!(
                "{}: HTTP {status}",
                self.url
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HireflowError::Source(format!("{}: invalid JSON: {e}", self.url)))?;

        let rows = body.as_array().ok_or_else(|| {
            HireflowError::Source(format!("{}: expected a JSON array of rows", self.url))
        })?;

        let records: Vec<RawRecord> = rows
            .iter()
            .filter_map(|row| {
                let obj = row.as_object()?;
                Some(
                    obj.iter()
                        .map(|(k, v)| (k.clone(), value_to_string(v)))
                        .collect::<RawRecord>(),
                )
            })
            .collect();

        if records.len() < rows.len() {
            debug!(
                dropped = rows.len() - records.len(),
                "ignored non-object entries in source response"
            );
        }

        info!(rows = records.len(), "fetched source rows");
        Ok(records)
    }
}

/// Stringify a scalar cell value the way the sheet export renders it.
/// Phone numbers arrive as JSON numbers from some exports; the dedup key
/// must not depend on which representation the export chose.
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> SheetSource {
        let url = Url::parse(&format!("{}/sheet.json", server.uri())).unwrap();
        SheetSource::new(url, &SourceOptions::default()).unwrap()
    }

    #[test]
    fn value_to_string_handles_scalars() {
        assert_eq!(value_to_string(&serde_json::json!("0811")), "0811");
        assert_eq!(value_to_string(&serde_json::json!(811223344)), "811223344");
        assert_eq!(value_to_string(&serde_json::json!(true)), "true");
        assert_eq!(value_to_string(&serde_json::Value::Null), "");
    }

    #[tokio::test]
    async fn fetch_all_returns_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"Phone Number": 811223344, "Timestamp": "2025/01/01 10:00:00", "Full Name": "Ayu"},
                {"Phone Number": "0812", "Timestamp": "2025/01/01 11:00:00", "Full Name": "Budi"}
            ])))
            .mount(&server)
            .await;

        let rows = source_for(&server).await.fetch_all().await.expect("fetch");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Phone Number").map(String::as_str), Some("811223344"));
        assert_eq!(rows[1].get("Full Name").map(String::as_str), Some("Budi"));
    }

    #[tokio::test]
    async fn fetch_all_empty_sheet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let rows = source_for(&server).await.fetch_all().await.expect("fetch");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn fetch_all_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = source_for(&server).await.fetch_all().await;
        assert!(matches!(result, Err(HireflowError::Source(_))));
    }

    #[tokio::test]
    async fn fetch_all_rejects_non_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"rows": []})),
            )
            .mount(&server)
            .await;

        let result = source_for(&server).await.fetch_all().await;
        assert!(matches!(result, Err(HireflowError::Source(_))));
    }
}
