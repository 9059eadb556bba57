use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Verification gateway configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "censusgate")]
#[command(about = "Identity verification workflow and authorization gateway")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "CENSUSGATE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Base URL of the census registry API
    #[arg(
        long,
        default_value = "http://localhost:3001",
        env = "CENSUSGATE_CENSUS_URL"
    )]
    pub census_url: String,

    /// Census registry request timeout in seconds
    #[arg(long, default_value = "10", env = "CENSUSGATE_CENSUS_TIMEOUT_SECS")]
    pub census_timeout_secs: u64,

    /// Path to scope tree YAML file (optional, falls back to the local
    /// country root only)
    #[arg(long, env = "CENSUSGATE_SCOPES_PATH")]
    pub scopes_path: Option<PathBuf>,

    /// Scope code of the deployment's country
    #[arg(long, default_value = "ES", env = "CENSUSGATE_LOCAL_SCOPE")]
    pub local_scope: String,

    /// Minimum age accepted at registration, in whole years
    #[arg(long, default_value = "16", env = "CENSUSGATE_MINIMUM_AGE")]
    pub minimum_age: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "CENSUSGATE_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get census request timeout as Duration.
    pub fn census_timeout(&self) -> Duration {
        Duration::from_secs(self.census_timeout_secs)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            census_url: "http://localhost:3001".to_string(),
            census_timeout_secs: 10,
            scopes_path: None,
            local_scope: "ES".to_string(),
            minimum_age: 16,
            log_level: "info".to_string(),
            shutdown_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.local_scope, "ES");
        assert_eq!(config.minimum_age, 16);
        assert!(config.scopes_path.is_none());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config {
            census_timeout_secs: 5,
            shutdown_timeout_secs: 15,
            ..Default::default()
        };

        assert_eq!(config.census_timeout(), Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(15));
    }
}
