use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::debtor::SheetsConfig;
use crate::events::EventKind;
use crate::normalizer::{NormalizerPolicy, Role};
use crate::openai::OpenAiConfig;

/// Environment variable holding the OpenAI API key (required by the server).
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the spreadsheet API key (optional).
pub const SHEETS_API_KEY_ENV: &str = "GOOGLE_SHEETS_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DunningConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub debtor_source: DebtorSourceConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiSection {
    pub base_url: String,
    pub realtime_model: String,
    pub voice: String,
    pub summary_model: String,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            voice: "verse".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DebtorSourceConfig {
    pub base_url: String,
    pub spreadsheet_id: Option<String>,
    pub range: String,
}

impl Default for DebtorSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            spreadsheet_id: None,
            range: "Sheet1!A:D".to_string(),
        }
    }
}

/// Which realtime event kinds reach the transcript, and who speaks the
/// model's audio transcripts.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NormalizerConfig {
    pub recognized_events: Vec<EventKind>,
    pub transcript_role: Role,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let policy = NormalizerPolicy::default();
        Self {
            recognized_events: policy.recognized,
            transcript_role: policy.transcript_role,
        }
    }
}

impl From<&NormalizerConfig> for NormalizerPolicy {
    fn from(config: &NormalizerConfig) -> Self {
        NormalizerPolicy {
            recognized: config.recognized_events.clone(),
            transcript_role: config.transcript_role,
        }
    }
}

impl OpenAiSection {
    pub fn client_config(&self, api_key: impl Into<String>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: api_key.into(),
            realtime_model: self.realtime_model.clone(),
            voice: self.voice.clone(),
            summary_model: self.summary_model.clone(),
        }
    }
}

impl DebtorSourceConfig {
    /// Source settings, or `None` when the sheet id or API key is missing.
    pub fn sheets_config(&self, api_key: Option<String>) -> Option<SheetsConfig> {
        Some(SheetsConfig {
            api_key: api_key?,
            spreadsheet_id: self.spreadsheet_id.clone()?,
            range: self.range.clone(),
        })
    }
}

impl DunningConfig {
    /// Load from an optional TOML file, then apply `DUNNING_<SECTION>__<KEY>`
    /// environment overrides. List keys take comma-separated values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DUNNING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("normalizer.recognized_events"),
            )
            .build()?;
        s.try_deserialize()
    }
}

/// Read a secret from the environment, treating an empty value as absent.
pub fn secret_from_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
