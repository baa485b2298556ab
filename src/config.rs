use crate::error::{FailoverError, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// One upstream RPC provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    pub label: String,
    /// Static rank, lower is preferred when success rates are close.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    10
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>, label: impl Into<String>, priority: u32) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            priority,
        }
    }
}

/// Public BNB Smart Chain mainnet endpoints used when nothing else is configured.
pub fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig::new("https://bsc-dataseed.binance.org", "Binance Dataseed", 1),
        EndpointConfig::new("https://bsc-dataseed1.defibit.io", "Defibit", 2),
        EndpointConfig::new("https://bsc-dataseed1.ninicoin.io", "Ninicoin", 3),
        EndpointConfig::new("https://bsc-dataseed2.binance.org", "Binance Dataseed 2", 4),
        EndpointConfig::new("https://rpc.ankr.com/bsc", "Ankr", 5),
        EndpointConfig::new("https://bsc-rpc.publicnode.com", "PublicNode", 6),
    ]
}

#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub max_attempts: u32,
    /// Cumulative errors after which an endpoint is marked unhealthy.
    pub error_threshold: u64,
    pub request_timeout: Duration,
    pub health_check_interval: Duration,
    /// How long an unhealthy endpoint rests after its last error before it is probed.
    pub recovery_cooldown: Duration,
    pub probe_timeout: Duration,
    /// Success rates closer than this are considered equal and fall back to priority.
    pub score_tolerance: f64,
    pub backoff_base: Duration,
    pub backoff_step: Duration,
    pub backoff_jitter: Duration,
    pub start_health_check_on_init: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            max_attempts: 3,
            error_threshold: 3,
            request_timeout: Duration::from_secs(12),
            health_check_interval: Duration::from_secs(60),
            recovery_cooldown: Duration::from_secs(5 * 60), // 5 minutes
            probe_timeout: Duration::from_secs(5),
            score_tolerance: 0.1,
            backoff_base: Duration::from_millis(1000),
            backoff_step: Duration::from_millis(500),
            backoff_jitter: Duration::from_millis(1000),
            start_health_check_on_init: true,
        }
    }
}

impl FailoverConfig {
    pub fn new(endpoints: Vec<EndpointConfig>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_error_threshold(mut self, threshold: u64) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_recovery_cooldown(mut self, cooldown: Duration) -> Self {
        self.recovery_cooldown = cooldown;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_score_tolerance(mut self, tolerance: f64) -> Self {
        self.score_tolerance = tolerance;
        self
    }

    pub fn with_backoff(mut self, base: Duration, step: Duration, jitter: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_step = step;
        self.backoff_jitter = jitter;
        self
    }

    pub fn with_start_health_check_on_init(mut self, start: bool) -> Self {
        self.start_health_check_on_init = start;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(FailoverError::InvalidConfig(
                "at least one RPC endpoint is required".into(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(FailoverError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }

        if self.error_threshold == 0 {
            return Err(FailoverError::InvalidConfig(
                "error_threshold must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.score_tolerance) {
            return Err(FailoverError::InvalidConfig(format!(
                "score_tolerance ({}) must be within [0, 1]",
                self.score_tolerance
            )));
        }

        if self.request_timeout.is_zero() || self.probe_timeout.is_zero() {
            return Err(FailoverError::InvalidConfig(
                "request and probe timeouts must be non-zero".into(),
            ));
        }

        if self.health_check_interval.is_zero() {
            return Err(FailoverError::InvalidConfig(
                "health_check_interval must be non-zero".into(),
            ));
        }

        let mut labels = HashSet::new();
        for endpoint in &self.endpoints {
            if !labels.insert(endpoint.label.as_str()) {
                return Err(FailoverError::InvalidConfig(format!(
                    "duplicate endpoint label: {}",
                    endpoint.label
                )));
            }
        }

        Ok(())
    }

    /// Parse an operator config document. Unset settings keep their defaults and an
    /// empty endpoint list falls back to [`default_endpoints`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(source)?;
        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    max_attempts: Option<u32>,
    error_threshold: Option<u64>,
    request_timeout_ms: Option<u64>,
    health_check_interval_secs: Option<u64>,
    recovery_cooldown_secs: Option<u64>,
    probe_timeout_ms: Option<u64>,
    score_tolerance: Option<f64>,
    backoff_base_ms: Option<u64>,
    backoff_step_ms: Option<u64>,
    backoff_jitter_ms: Option<u64>,
    start_health_check_on_init: Option<bool>,
}

impl ConfigFile {
    fn into_config(self) -> FailoverConfig {
        let mut config = FailoverConfig::default();
        if !self.endpoints.is_empty() {
            config.endpoints = self.endpoints;
        }

        let s = self.settings;
        if let Some(v) = s.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = s.error_threshold {
            config.error_threshold = v;
        }
        if let Some(v) = s.request_timeout_ms {
            config.request_timeout = Duration::from_millis(v);
        }
        if let Some(v) = s.health_check_interval_secs {
            config.health_check_interval = Duration::from_secs(v);
        }
        if let Some(v) = s.recovery_cooldown_secs {
            config.recovery_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = s.probe_timeout_ms {
            config.probe_timeout = Duration::from_millis(v);
        }
        if let Some(v) = s.score_tolerance {
            config.score_tolerance = v;
        }
        if let Some(v) = s.backoff_base_ms {
            config.backoff_base = Duration::from_millis(v);
        }
        if let Some(v) = s.backoff_step_ms {
            config.backoff_step = Duration::from_millis(v);
        }
        if let Some(v) = s.backoff_jitter_ms {
            config.backoff_jitter = Duration::from_millis(v);
        }
        if let Some(v) = s.start_health_check_on_init {
            config.start_health_check_on_init = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FailoverConfig::default();
        assert_eq!(config.endpoints.len(), 6);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.error_threshold, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.recovery_cooldown, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(FailoverConfig::new(Vec::new()).validate().is_err());
        assert!(FailoverConfig::default()
            .with_max_attempts(0)
            .validate()
            .is_err());
        assert!(FailoverConfig::default()
            .with_score_tolerance(1.5)
            .validate()
            .is_err());

        let dup = FailoverConfig::new(vec![
            EndpointConfig::new("https://a.example", "same", 1),
            EndpointConfig::new("https://b.example", "same", 2),
        ]);
        let err = dup.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate endpoint label"));
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = FailoverConfig::from_toml_str(
            r#"
            [settings]
            max_attempts = 5
            request_timeout_ms = 2500
            recovery_cooldown_secs = 30

            [[endpoints]]
            url = "https://rpc.one.example"
            label = "one"
            priority = 1

            [[endpoints]]
            url = "https://rpc.two.example"
            label = "two"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.recovery_cooldown, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[1].priority, 10);
    }

    #[test]
    fn test_from_toml_without_endpoints_uses_defaults() {
        let config = FailoverConfig::from_toml_str("").unwrap();
        assert_eq!(config.endpoints, default_endpoints());
    }

    #[test]
    fn test_from_toml_rejects_unknown_setting() {
        let result = FailoverConfig::from_toml_str("[settings]\nretries = 4\n");
        assert!(matches!(result, Err(FailoverError::ConfigFile(_))));
    }

    #[test]
    fn test_from_toml_rejects_unknown_table() {
        let result = FailoverConfig::from_toml_str("[setting]\nmax_attempts = 5\n");
        assert!(matches!(result, Err(FailoverError::ConfigFile(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc.toml");
        std::fs::write(&path, "[settings]\nerror_threshold = 7\n").unwrap();

        let config = FailoverConfig::from_file(&path).unwrap();
        assert_eq!(config.error_threshold, 7);

        let missing = FailoverConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(FailoverError::Io(_))));
    }
}
