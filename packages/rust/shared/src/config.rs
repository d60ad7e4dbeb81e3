//! Application configuration for Hireflow.
//!
//! User config lives at `~/.hireflow/hireflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HireflowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hireflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hireflow";

// ---------------------------------------------------------------------------
// Config structs (matching hireflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Attachment download and field policies.
    #[serde(default)]
    pub attachments: AttachmentsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for the database and downloaded attachments.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Normalized profile field holding the applicant's target position.
    #[serde(default = "default_position_field")]
    pub position_field: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_interval_secs: default_tick_interval_secs(),
            position_field: default_position_field(),
        }
    }
}

fn default_data_dir() -> String {
    "~/hireflow-data".into()
}
fn default_tick_interval_secs() -> u64 {
    180
}
fn default_position_field() -> String {
    "desired_position".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model for question generation and evaluation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Chat-completions API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-exp:free".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the published-sheet JSON export to poll.
    #[serde(default)]
    pub sheet_url: String,

    /// Raw field holding the applicant phone number (the dedup key).
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Raw field holding the submission timestamp.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_url: String::new(),
            key_field: default_key_field(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

fn default_key_field() -> String {
    "Phone Number".into()
}
fn default_timestamp_field() -> String {
    "Timestamp".into()
}

/// `[attachments]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    /// Download URL template with an `{id}` placeholder for the resolved
    /// file identifier.
    #[serde(default = "default_download_url_template")]
    pub download_url_template: String,

    /// Raw field name → handling policy for attachment-typed fields.
    #[serde(default = "default_attachment_fields")]
    pub fields: BTreeMap<String, FieldPolicy>,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            download_url_template: default_download_url_template(),
            fields: default_attachment_fields(),
        }
    }
}

fn default_download_url_template() -> String {
    "https://drive.google.com/uc?export=download&id={id}".into()
}

fn default_attachment_fields() -> BTreeMap<String, FieldPolicy> {
    BTreeMap::from([(
        "Resume/CV".to_string(),
        FieldPolicy {
            format: "pdf".into(),
            extract_text: true,
        },
    )])
}

/// Handling policy for one attachment-typed form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    /// Expected file format ("pdf"); also determines the expected MIME type.
    pub format: String,
    /// Whether to extract text from the downloaded binary.
    #[serde(default)]
    pub extract_text: bool,
}

impl FieldPolicy {
    /// MIME type the download must declare for this policy.
    pub fn expected_mime(&self) -> String {
        format!("application/{}", self.format)
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, derived from AppConfig)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration handed to the lifecycle controller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sleep between scheduler ticks.
    pub tick_interval: Duration,
    /// Raw field holding the dedup key.
    pub key_field: String,
    /// Raw field holding the submission timestamp.
    pub timestamp_field: String,
    /// Normalized profile field holding the target position description.
    pub position_field: String,
    /// Attachment field policies, keyed by raw field name.
    pub attachment_fields: BTreeMap<String, FieldPolicy>,
    /// Directory for locally persisted attachment copies.
    pub attachments_dir: PathBuf,
}

impl PipelineConfig {
    /// Build the runtime config from an [`AppConfig`] and a resolved data dir.
    pub fn from_app_config(config: &AppConfig, data_dir: &Path) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.defaults.tick_interval_secs),
            key_field: config.source.key_field.clone(),
            timestamp_field: config.source.timestamp_field.clone(),
            position_field: config.defaults.position_field.clone(),
            attachment_fields: config.attachments.fields.clone(),
            attachments_dir: data_dir.join("attachments"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hireflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HireflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hireflow/hireflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HireflowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HireflowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HireflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HireflowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HireflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand the configured data dir (`~/` prefix allowed) to an absolute path.
pub fn resolve_data_dir(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.data_dir;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| HireflowError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(HireflowError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
