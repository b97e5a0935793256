//! Service configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use lw_core::task::TaskLimits;
use lw_scheduler::{RunnerConfig, SchedulerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api_enabled: bool,
    pub api_addr: SocketAddr,
    pub scheduler: SchedulerConfig,
    pub runner: RunnerConfig,
    pub fetcher_url: String,
    pub fetch_timeout: Duration,
    pub notify_timeout: Duration,
    pub telegram_api: String,
    pub telegram_token: String,
    pub limits: TaskLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };
        let defaults = TaskLimits::default();

        let fetch_timeout = env.seconds("LW_FETCH_TIMEOUT_SECS", 120)?;
        let notify_timeout = env.seconds("LW_NOTIFY_TIMEOUT_SECS", 10)?;
        let telegram_token = env
            .get("TELEGRAM_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))?;

        Ok(Self {
            data_dir: PathBuf::from(env.string("LW_DATA_DIR", ".lw-data")),
            api_enabled: env.flag("LW_API_ENABLED", true),
            api_addr: env.parse("LW_API_ADDR", SocketAddr::from(([0, 0, 0, 0], 8081)))?,
            scheduler: SchedulerConfig {
                poll_interval: env.seconds("LW_POLL_INTERVAL_SECS", 60)?,
                max_concurrent_runs: env.parse("LW_MAX_CONCURRENT_RUNS", 4)?,
            },
            runner: RunnerConfig {
                notify_cap: env.parse("LW_NOTIFY_CAP", 10)?,
                fetch_timeout,
                notify_timeout,
            },
            fetcher_url: env.string("LW_FETCHER_URL", "http://localhost:4000"),
            fetch_timeout,
            notify_timeout,
            telegram_api: env.string("LW_TELEGRAM_API", "https://api.telegram.org"),
            telegram_token,
            limits: TaskLimits {
                min_interval_minutes: env.parse("LW_MIN_INTERVAL_MINUTES", defaults.min_interval_minutes)?,
                max_active_tasks: env.parse("LW_MAX_ACTIVE_TASKS", defaults.max_active_tasks)?,
                max_tracking_days: env.parse("LW_MAX_TRACKING_DAYS", defaults.max_tracking_days)?,
                url_prefix: env.string("LW_URL_PREFIX", &defaults.url_prefix),
                ..defaults
            },
        })
    }

    /// Location of the store file
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("watch.json")
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            },
            None => default,
        }
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
            None => Ok(default),
        }
    }

    /// A non-zero number of seconds
    fn seconds(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        match self.parse(name, default)? {
            0 => Err(ConfigError::Invalid {
                name,
                value: "0".to_string(),
            }),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("TELEGRAM_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.store_path(), PathBuf::from(".lw-data").join("watch.json"));
        assert!(config.api_enabled);
        assert_eq!(config.api_addr.port(), 8081);
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler.max_concurrent_runs, 4);
        assert_eq!(config.runner.notify_cap, 10);
        assert_eq!(config.runner.fetch_timeout, Duration::from_secs(120));
        assert_eq!(config.runner.notify_timeout, Duration::from_secs(10));
        assert_eq!(config.notify_timeout, Duration::from_secs(10));
        assert_eq!(config.limits.min_interval_minutes, 10);
        assert_eq!(config.limits.max_active_tasks, 5);
    }

    #[test]
    fn test_token_required() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing("TELEGRAM_TOKEN"))
        ));
        assert!(config_from(&[("TELEGRAM_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TELEGRAM_TOKEN", "t"),
            ("LW_DATA_DIR", "/var/lib/lw"),
            ("LW_API_ENABLED", "off"),
            ("LW_POLL_INTERVAL_SECS", "15"),
            ("LW_FETCH_TIMEOUT_SECS", "30"),
            ("LW_NOTIFY_TIMEOUT_SECS", "3"),
            ("LW_NOTIFY_CAP", "3"),
            ("LW_URL_PREFIX", ""),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lw"));
        assert!(!config.api_enabled);
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(15));
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.runner.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.notify_timeout, Duration::from_secs(3));
        assert_eq!(config.runner.notify_timeout, Duration::from_secs(3));
        assert_eq!(config.runner.notify_cap, 3);
        assert_eq!(config.limits.url_prefix, "");
    }

    #[test]
    fn test_invalid_number() {
        match config_from(&[("TELEGRAM_TOKEN", "t"), ("LW_NOTIFY_CAP", "ten")]) {
            Err(ConfigError::Invalid { name, value }) => {
                assert_eq!(name, "LW_NOTIFY_CAP");
                assert_eq!(value, "ten");
            }
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            config_from(&[("TELEGRAM_TOKEN", "t"), ("LW_NOTIFY_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { name: "LW_NOTIFY_TIMEOUT_SECS", .. })
        ));
    }
}
