use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::workflows::hiring::guarantee::DEFAULT_GUARANTEE_DAYS;
use crate::workflows::hiring::invitation::DEFAULT_INVITATION_WINDOW_HOURS;
use crate::workflows::hiring::machine::DEFAULT_MATCH_THRESHOLD;
use crate::workflows::hiring::{
    FeeSchedule, GuaranteeTracker, InvitationWindow, PipelineSettings,
};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

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
    pub pipeline: PipelineConfig,
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
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            pipeline: PipelineConfig::load()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Business dials for the candidate pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub match_threshold: u8,
    pub invitation_window: Duration,
    pub guarantee_period: Duration,
    pub sweep_interval_secs: u64,
    pub fee_schedule: FeeSchedule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            invitation_window: Duration::hours(DEFAULT_INVITATION_WINDOW_HOURS),
            guarantee_period: Duration::days(DEFAULT_GUARANTEE_DAYS),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            fee_schedule: FeeSchedule::default(),
        }
    }
}

impl PipelineConfig {
    fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let match_threshold: u8 = parse_var("PIPELINE_MATCH_THRESHOLD", defaults.match_threshold)?;
        if match_threshold > 100 {
            return Err(ConfigError::ThresholdOutOfRange(match_threshold));
        }

        let fee_schedule = match env::var("PIPELINE_FEE_SCHEDULE_PATH") {
            Ok(path) if !path.trim().is_empty() => load_fee_schedule(PathBuf::from(path))?,
            _ => defaults.fee_schedule,
        };

        Ok(Self {
            match_threshold,
            invitation_window: parse_span(
                "PIPELINE_INVITATION_WINDOW_HOURS",
                DEFAULT_INVITATION_WINDOW_HOURS,
                Duration::try_hours,
            )?,
            guarantee_period: parse_span(
                "PIPELINE_GUARANTEE_DAYS",
                DEFAULT_GUARANTEE_DAYS,
                Duration::try_days,
            )?,
            sweep_interval_secs: parse_var(
                "PIPELINE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            fee_schedule,
        })
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            match_threshold: self.match_threshold,
            invitation_window: InvitationWindow::new(self.invitation_window),
            guarantee: GuaranteeTracker::new(self.guarantee_period, self.fee_schedule.clone()),
        }
    }

    /// `None` disables the background sweep.
    pub fn sweep_interval(&self) -> Option<StdDuration> {
        (self.sweep_interval_secs > 0).then(|| StdDuration::from_secs(self.sweep_interval_secs))
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        _ => Ok(default),
    }
}

/// Reads a whole number of `unit`s and rejects spans that are not positive or overflow.
fn parse_span(
    key: &'static str,
    default: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    let value: i64 = parse_var(key, default)?;
    if value <= 0 {
        return Err(ConfigError::SpanOutOfRange { key, value });
    }
    unit(value).ok_or(ConfigError::SpanOutOfRange { key, value })
}

fn load_fee_schedule(path: PathBuf) -> Result<FeeSchedule, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|err| ConfigError::FeeSchedule {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| ConfigError::FeeSchedule {
        path,
        reason: err.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    ThresholdOutOfRange(u8),
    SpanOutOfRange { key: &'static str, value: i64 },
    FeeSchedule { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be an integer")
            }
            ConfigError::ThresholdOutOfRange(value) => {
                write!(f, "PIPELINE_MATCH_THRESHOLD must be 0-100, found {value}")
            }
            ConfigError::SpanOutOfRange { key, value } => {
                write!(f, "{key} must be a positive, representable span, found {value}")
            }
            ConfigError::FeeSchedule { path, reason } => {
                write!(f, "fee schedule {} is unusable: {reason}", path.display())
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "PIPELINE_MATCH_THRESHOLD",
            "PIPELINE_INVITATION_WINDOW_HOURS",
            "PIPELINE_GUARANTEE_DAYS",
            "PIPELINE_SWEEP_INTERVAL_SECS",
            "PIPELINE_FEE_SCHEDULE_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline.match_threshold, 60);
        assert_eq!(config.pipeline.invitation_window, Duration::hours(48));
        assert_eq!(config.pipeline.guarantee_period, Duration::days(90));
        assert_eq!(
            config.pipeline.sweep_interval(),
            Some(StdDuration::from_secs(300))
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_MATCH_THRESHOLD", "140");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::ThresholdOutOfRange(140))
        ));
        env::set_var("PIPELINE_MATCH_THRESHOLD", "high");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "PIPELINE_MATCH_THRESHOLD"
            })
        ));
        reset_env();
    }

    #[test]
    fn zero_interval_disables_sweeper() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_SWEEP_INTERVAL_SECS", "0");
        env::set_var("PIPELINE_INVITATION_WINDOW_HOURS", "24");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.pipeline.sweep_interval(), None);
        assert_eq!(
            config.pipeline.settings().invitation_window.length(),
            Duration::hours(24)
        );
        reset_env();
    }

    #[test]
    fn rejects_non_positive_spans() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_INVITATION_WINDOW_HOURS", "-5");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::SpanOutOfRange {
                key: "PIPELINE_INVITATION_WINDOW_HOURS",
                value: -5
            })
        ));
        env::set_var("PIPELINE_INVITATION_WINDOW_HOURS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::SpanOutOfRange { value: 0, .. })
        ));
        reset_env();
    }

    #[test]
    fn rejects_spans_too_large_for_a_duration() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_GUARANTEE_DAYS", "200000000000000");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::SpanOutOfRange {
                key: "PIPELINE_GUARANTEE_DAYS",
                value: 200_000_000_000_000
            })
        ));
        env::remove_var("PIPELINE_GUARANTEE_DAYS");
        env::set_var("PIPELINE_INVITATION_WINDOW_HOURS", "200000000000000");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::SpanOutOfRange { .. })
        ));
        reset_env();
    }

    #[test]
    fn missing_fee_schedule_file_is_reported() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PIPELINE_FEE_SCHEDULE_PATH", "/nonexistent/fees.json");
        match AppConfig::load() {
            Err(ConfigError::FeeSchedule { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/fees.json"))
            }
            other => panic!("expected fee schedule error, got {other:?}"),
        }
        reset_env();
    }
}
