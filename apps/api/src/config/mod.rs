use std::{env, path::PathBuf, time::Duration};

use config::{builder::DefaultState, ConfigBuilder, Environment};
use serde::Deserialize;

use crate::{
    error::{ApiError, Result},
    ml::ArtifactPaths,
};

const MAX_EXTRACTOR_ATTEMPTS: u32 = 10;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,https://harumnesia.web.id";

/// Runtime settings, read from `APP_*` environment variables over built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub model_dir: PathBuf,
    pub dataset_file: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_temperature: f32,
    pub extractor_timeout_secs: u64,
    pub extractor_connect_timeout_secs: u64,
    pub extractor_max_attempts: u32,
    pub cors_origins: String,
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Config {
    /// Loads `.env`, then layers `APP_*` variables over the defaults.
    ///
    /// `GEMINI_API_KEY` is honoured when `APP_GEMINI_API_KEY` is not set.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let builder = Self::defaults(env::var("GEMINI_API_KEY").ok())?
            .add_source(Environment::with_prefix("APP").try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn defaults(gemini_api_key: Option<String>) -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5050)?
            .set_default("debug", false)?
            .set_default("model_dir", ".")?
            .set_default("dataset_file", "Dataset_Harumnesia_clean.csv")?
            .set_default("gemini_api_key", gemini_api_key.unwrap_or_default())?
            .set_default("gemini_model", "gemini-1.5-flash")?
            .set_default(
                "gemini_base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default("gemini_temperature", 0.5)?
            .set_default("extractor_timeout_secs", 30)?
            .set_default("extractor_connect_timeout_secs", 15)?
            .set_default("extractor_max_attempts", 1)?
            .set_default("cors_origins", DEFAULT_CORS_ORIGINS)?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "GEMINI_API_KEY (or APP_GEMINI_API_KEY) must be set".to_string(),
            ));
        }
        if !(1..=MAX_EXTRACTOR_ATTEMPTS).contains(&self.extractor_max_attempts) {
            return Err(ApiError::ConfigError(format!(
                "extractor_max_attempts must be within [1, {}], got {}",
                MAX_EXTRACTOR_ATTEMPTS, self.extractor_max_attempts
            )));
        }
        if !(0.0..=2.0).contains(&self.gemini_temperature) {
            return Err(ApiError::ConfigError(format!(
                "gemini_temperature must be within [0, 2], got {}",
                self.gemini_temperature
            )));
        }
        if self.workers == Some(0) {
            return Err(ApiError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.model_dir, &self.dataset_file)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs)
    }

    pub fn extractor_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_connect_timeout_secs)
    }
}
