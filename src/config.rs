use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Source
    pub base_url: String,
    pub board_id: String,
    pub tz_offset_hours: i32,
    pub list_timeout: Duration,
    pub content_timeout: Duration,
    pub max_fetch_attempts: u32,

    // Listing scan policy
    pub pinned_cutoff_hours: i64,
    pub old_post_streak: u32,
    pub max_list_pages: u32,

    // Fetch stage
    pub worker_concurrency: usize,
    pub pacing_delay: Duration,
    pub pacing_jitter: Duration,

    // Scheduling / integrity
    pub failure_threshold: u32,
    pub resume_staleness_hours: i64,
    pub window_pause: Duration,

    // Artifact storage
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_prefix: String,
    pub spool_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Source
            base_url: required_env("GALLERY_BASE_URL")?,
            board_id: required_env("GALLERY_BOARD_ID")?,
            tz_offset_hours: parse_env_i32("SOURCE_TZ_OFFSET_HOURS", 9)?,
            list_timeout: Duration::from_secs(parse_env_u64("LIST_TIMEOUT_SECS", 10)?),
            content_timeout: Duration::from_secs(parse_env_u64("CONTENT_TIMEOUT_SECS", 30)?),
            max_fetch_attempts: parse_env_u32("MAX_FETCH_ATTEMPTS", 3)?,

            // Listing scan policy
            pinned_cutoff_hours: parse_env_i64("PINNED_CUTOFF_HOURS", 24)?,
            old_post_streak: parse_env_u32("OLD_POST_STREAK", 10)?,
            max_list_pages: parse_env_u32("MAX_LIST_PAGES", 500)?,

            // Fetch stage
            worker_concurrency: parse_env_usize("WORKER_CONCURRENCY", 4)?,
            pacing_delay: Duration::from_millis(parse_env_u64("PACING_DELAY_MS", 500)?),
            pacing_jitter: Duration::from_millis(parse_env_u64("PACING_JITTER_MS", 300)?),

            // Scheduling / integrity
            failure_threshold: parse_env_u32("FAILURE_THRESHOLD", 10)?,
            resume_staleness_hours: parse_env_i64("RESUME_STALENESS_HOURS", 24)?,
            window_pause: Duration::from_secs(parse_env_u64("WINDOW_PAUSE_SECS", 5)?),

            // Artifact storage
            s3_bucket: required_env("S3_BUCKET")?,
            s3_region: env_or_default("S3_REGION", "auto"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_prefix: env_or_default("S3_PREFIX", "activity/"),
            spool_dir: PathBuf::from(env_or_default("SPOOL_DIR", "./data/spool")),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                name: "GALLERY_BASE_URL".to_string(),
                message: "must be an http(s) URL".to_string(),
            });
        }
        if self.board_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "GALLERY_BOARD_ID".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !(-23..=23).contains(&self.tz_offset_hours) {
            return Err(ConfigError::InvalidValue {
                name: "SOURCE_TZ_OFFSET_HOURS".to_string(),
                message: "must be between -23 and 23".to_string(),
            });
        }
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_fetch_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_FETCH_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.old_post_streak == 0 {
            return Err(ConfigError::InvalidValue {
                name: "OLD_POST_STREAK".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_list_pages == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_LIST_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.s3_bucket.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "S3_BUCKET".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration for tests: localhost source, no pacing, tiny pauses.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_url: "http://127.0.0.1".to_string(),
            board_id: "testboard".to_string(),
            tz_offset_hours: 9,
            list_timeout: Duration::from_secs(5),
            content_timeout: Duration::from_secs(5),
            max_fetch_attempts: 3,
            pinned_cutoff_hours: 24,
            old_post_streak: 10,
            max_list_pages: 500,
            worker_concurrency: 2,
            pacing_delay: Duration::ZERO,
            pacing_jitter: Duration::ZERO,
            failure_threshold: 10,
            resume_staleness_hours: 24,
            window_pause: Duration::ZERO,
            s3_bucket: "test-bucket".to_string(),
            s3_region: "auto".to_string(),
            s3_endpoint: None,
            s3_prefix: "activity/".to_string(),
            spool_dir: PathBuf::from("./data/spool"),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_i32(name: &str, default: i32) -> Result<i32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_testing_validates() {
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            worker_concurrency: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let config = Config {
            base_url: "ftp://example.com".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_offset() {
        let config = Config {
            tz_offset_hours: 30,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_defaults_for_missing_vars() {
        assert_eq!(parse_env_u64("NONEXISTENT_COLLECTOR_VAR", 7).unwrap(), 7);
        assert_eq!(parse_env_i32("NONEXISTENT_COLLECTOR_VAR", -3).unwrap(), -3);
    }
}
