use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::scoring::service::default_concurrency;
use crate::scoring::{ScoringOptions, DEFAULT_MAX_SCORE, DEFAULT_MIN_SCORE};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring: ScoringConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Initial score bounds plus the knobs of the scoring service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub min_score: i32,
    pub max_score: i32,
    pub ai_assist: bool,
    pub ai_timeout: Duration,
    pub batch_concurrency: usize,
    /// Optional JSON rule set loaded at startup.
    pub rules_path: Option<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            max_score: DEFAULT_MAX_SCORE,
            ai_assist: false,
            ai_timeout: Duration::from_millis(2_000),
            batch_concurrency: default_concurrency(),
            rules_path: None,
        }
    }
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let min_score = parse_var("SCORING_MIN_SCORE")?.unwrap_or(defaults.min_score);
        let max_score = parse_var("SCORING_MAX_SCORE")?.unwrap_or(defaults.max_score);
        if min_score > max_score {
            return Err(ConfigError::InvalidBounds {
                min: min_score,
                max: max_score,
            });
        }

        let ai_assist = match env::var("SCORING_AI_ASSIST") {
            Ok(raw) => parse_flag("SCORING_AI_ASSIST", &raw)?,
            Err(_) => defaults.ai_assist,
        };
        let ai_timeout = parse_var::<u64>("SCORING_AI_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.ai_timeout);
        let batch_concurrency = match parse_var::<usize>("SCORING_BATCH_CONCURRENCY")? {
            Some(0) => return Err(ConfigError::ZeroConcurrency),
            Some(value) => value,
            None => defaults.batch_concurrency,
        };
        let rules_path = env::var("SCORING_RULES_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            min_score,
            max_score,
            ai_assist,
            ai_timeout,
            batch_concurrency,
            rules_path,
        })
    }

    pub fn options(&self) -> ScoringOptions {
        ScoringOptions {
            assist_timeout: self.ai_timeout,
            max_concurrency: self.batch_concurrency,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(None),
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidFlag { name: &'static str, value: String },
    InvalidBounds { min: i32, max: i32 },
    ZeroConcurrency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a valid number, got '{value}'")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
            ConfigError::InvalidBounds { min, max } => write!(
                f,
                "SCORING_MIN_SCORE ({min}) must not exceed SCORING_MAX_SCORE ({max})"
            ),
            ConfigError::ZeroConcurrency => {
                write!(f, "SCORING_BATCH_CONCURRENCY must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
