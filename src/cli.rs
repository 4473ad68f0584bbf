use std::{path::PathBuf, time::Duration};

use clap::Parser;
use ds::RetryPolicy;
use url::Url;

use crate::geolocation::Position;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the watch bridge
    #[arg(short = 'p', long, env = "PLACIDIAL_PEER", default_value = "ws://127.0.0.1:9000")]
    pub peer: String,

    /// Seconds to wait for the watch to acknowledge a message
    #[arg(long, env = "PLACIDIAL_ACK_TIMEOUT_SECS", default_value_t = 10)]
    pub ack_timeout_secs: u64,

    /// Resend failed messages right away instead of backing off
    #[arg(long, env = "PLACIDIAL_RETRY_IMMEDIATE")]
    pub retry_immediate: bool,

    #[arg(long, env = "PLACIDIAL_INITIAL_BACKOFF_MS", default_value_t = 250)]
    pub initial_backoff_ms: u64,

    #[arg(long, env = "PLACIDIAL_MAX_BACKOFF_MS", default_value_t = 30_000)]
    pub max_backoff_ms: u64,

    /// Give up on a message after this many transmissions (default: never)
    #[arg(
        long,
        env = "PLACIDIAL_MAX_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: Option<u32>,

    /// Where the last saved settings are kept
    #[arg(
        short = 's',
        long,
        env = "PLACIDIAL_SETTINGS",
        default_value = "placidial-settings.json"
    )]
    pub settings_path: PathBuf,

    /// Base URL of the configuration page
    #[arg(long, env = "PLACIDIAL_CONFIG_PAGE", default_value = "http://127.0.0.1:8080/")]
    pub config_page: Url,

    /// Fixed latitude reported to the watch
    #[arg(
        long,
        env = "PLACIDIAL_LATITUDE",
        requires = "longitude",
        allow_negative_numbers = true
    )]
    pub latitude: Option<f64>,

    /// Fixed longitude reported to the watch
    #[arg(
        long,
        env = "PLACIDIAL_LONGITUDE",
        requires = "latitude",
        allow_negative_numbers = true
    )]
    pub longitude: Option<f64>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "PLACIDIAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = if self.retry_immediate {
            RetryPolicy::immediate()
        } else {
            RetryPolicy {
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                max_attempts: None,
            }
        };
        match self.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    pub fn position(&self) -> Option<Position> {
        Some(Position::new(self.latitude?, self.longitude?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["placidial"]).unwrap();
        assert_eq!(args.retry_policy(), RetryPolicy::default());
        assert_eq!(args.ack_timeout(), Duration::from_secs(10));
        assert_eq!(args.position(), None);
    }

    #[test]
    fn test_retry_and_position_flags() {
        let args = Args::try_parse_from([
            "placidial",
            "--retry-immediate",
            "--max-attempts",
            "5",
            "--latitude",
            "-33.86",
            "--longitude",
            "151.2",
        ])
        .unwrap();
        assert_eq!(
            args.retry_policy(),
            RetryPolicy::immediate().with_max_attempts(5)
        );
        assert_eq!(args.position(), Some(Position::new(-33.86, 151.2)));
    }

    #[test]
    fn test_zero_max_attempts_is_rejected() {
        assert!(Args::try_parse_from(["placidial", "--max-attempts", "0"]).is_err());
        let args = Args::try_parse_from(["placidial", "--max-attempts", "1"]).unwrap();
        assert_eq!(args.max_attempts, Some(1));
    }

    #[test]
    fn test_env_fallback() {
        // Only this test reads the log level.
        std::env::set_var("PLACIDIAL_LOG_LEVEL", "debug");
        let from_env = Args::try_parse_from(["placidial"]).unwrap();
        let from_flag = Args::try_parse_from(["placidial", "--log-level", "warn"]).unwrap();
        std::env::remove_var("PLACIDIAL_LOG_LEVEL");

        assert_eq!(from_env.log_level, "debug");
        assert_eq!(from_flag.log_level, "warn");
    }

    #[test]
    fn test_latitude_requires_longitude() {
        assert!(Args::try_parse_from(["placidial", "--latitude", "1.0"]).is_err());
    }
}
