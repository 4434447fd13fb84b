use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LeaderboardError, Result};
use crate::repository::UpsertStrategy;

/// Google Sheets REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// OAuth token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Largest supported question count.
pub const MAX_QUESTIONS: usize = 64;

/// Application settings, read from a TOML file.
///
/// Every key is optional. The defaults run a 15-question board against an
/// in-memory table on `127.0.0.1:3000`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bind: String,
    pub question_count: usize,
    pub refresh_interval_secs: u64,
    pub show_rank_column: bool,
    pub upsert_strategy: UpsertStrategy,
    pub static_dir: PathBuf,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: "127.0.0.1:3000".to_string(),
            question_count: 15,
            refresh_interval_secs: 5,
            show_rank_column: true,
            upsert_strategy: UpsertStrategy::default(),
            static_dir: PathBuf::from("static"),
            store: StoreConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

/// Where the leaderboard table lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Sheets {
        spreadsheet_id: String,
        #[serde(default = "default_worksheet")]
        worksheet: String,
        #[serde(default = "default_api_base")]
        api_base: String,
    },
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

/// Where the service account key is found. Tried in order: `key_file` if it
/// exists, then the `[connections.gsheets]` table of `secrets_file`, then the
/// JSON in environment variable `env_var`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    pub key_file: Option<PathBuf>,
    pub secrets_file: Option<PathBuf>,
    pub env_var: String,
    /// Overrides the key's own `token_uri`.
    pub token_uri: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            key_file: None,
            secrets_file: Some(PathBuf::from(".streamlit/secrets.toml")),
            env_var: "GSHEETS_CREDENTIALS".to_string(),
            token_uri: None,
        }
    }
}

impl AppConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    /// * `Config` if the file cannot be read, parsed or fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LeaderboardError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    /// * `Config` on syntax errors, unknown keys or invalid values
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| LeaderboardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// * `Config` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.question_count == 0 || self.question_count > MAX_QUESTIONS {
            return Err(LeaderboardError::Config(format!(
                "question_count must be between 1 and {}",
                MAX_QUESTIONS
            )));
        }
        if self.refresh_interval_secs == 0 {
            return Err(LeaderboardError::Config(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }
        if let StoreConfig::Sheets {
            spreadsheet_id,
            worksheet,
            ..
        } = &self.store
        {
            if spreadsheet_id.trim().is_empty() {
                return Err(LeaderboardError::Config(
                    "store.spreadsheet_id is required for the sheets store".to_string(),
                ));
            }
            if worksheet.trim().is_empty() {
                return Err(LeaderboardError::Config(
                    "store.worksheet cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.question_count, 15);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn sixteen_question_variant() {
        let config = AppConfig::from_toml(
            r#"
            question_count = 16
            refresh_interval_secs = 10
            show_rank_column = false
            upsert_strategy = "full-rewrite"

            [store]
            kind = "sheets"
            spreadsheet_id = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.question_count, 16);
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.upsert_strategy, UpsertStrategy::FullRewrite);
        assert_eq!(
            config.store,
            StoreConfig::Sheets {
                spreadsheet_id: "abc".into(),
                worksheet: "Sheet1".into(),
                api_base: DEFAULT_API_BASE.into(),
            }
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(AppConfig::from_toml("question_count = 0").is_err());
        assert!(AppConfig::from_toml("refresh_interval_secs = 0").is_err());
        assert!(AppConfig::from_toml("unknown = 1").is_err());
        assert!(AppConfig::from_toml("[store]\nkind = \"sheets\"\nspreadsheet_id = \"\"").is_err());
    }
}
