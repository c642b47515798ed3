use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default request body limit (20MB), matching the document upload cap.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;
const DEFAULT_MAX_NUM_HANDS: usize = 1;

#[derive(Debug, Clone)]
pub struct ReadingConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub openai: OpenAiConfig,
    pub landmarks: LandmarkConfig,
    pub limits: LimitsConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Absent key is not a startup failure; each reading request reports it.
    pub api_key: Option<Secret<String>>,
    pub api_base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LandmarkConfig {
    /// Hand pose engine endpoint. Extraction is skipped when unset.
    pub service_url: Option<String>,
    pub min_detection_confidence: f32,
    pub max_num_hands: usize,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
}

impl ReadingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = core_config::is_production();

        Ok(ReadingConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: Secret::new(mongodb_uri(is_prod)?),
                database: get_env("MONGODB_DATABASE", Some("readings_db"), is_prod)?,
            },
            openai: OpenAiConfig {
                api_key: optional_env("OPENAI_API_KEY").map(Secret::new),
                api_base_url: get_env(
                    "OPENAI_API_BASE_URL",
                    Some(DEFAULT_OPENAI_API_BASE),
                    is_prod,
                )?,
                model: get_env("OPENAI_MODEL", Some(DEFAULT_MODEL), is_prod)?,
            },
            landmarks: LandmarkConfig {
                service_url: optional_env("LANDMARK_SERVICE_URL"),
                min_detection_confidence: parse_env(
                    "LANDMARK_MIN_DETECTION_CONFIDENCE",
                    DEFAULT_MIN_DETECTION_CONFIDENCE,
                )?,
                max_num_hands: parse_env("LANDMARK_MAX_NUM_HANDS", DEFAULT_MAX_NUM_HANDS)?,
            },
            limits: LimitsConfig {
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.openai
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }
}

/// `MONGODB_URI` wins; otherwise the connection string is read from the
/// credential file named by `MONGODB_URI_FILE`.
fn mongodb_uri(is_prod: bool) -> Result<String, AppError> {
    if let Some(uri) = optional_env("MONGODB_URI") {
        return Ok(uri);
    }

    match optional_env("MONGODB_URI_FILE") {
        Some(path) => {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Failed to read MONGODB_URI_FILE {}: {}",
                    path,
                    e
                ))
            })?;
            let uri = contents.trim();
            if uri.is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MONGODB_URI_FILE {} is empty",
                    path
                )));
            }
            Ok(uri.to_string())
        }
        None => get_env("MONGODB_URI", None, is_prod),
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
