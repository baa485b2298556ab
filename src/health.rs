use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Mutable health record of one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub is_healthy: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<Instant>,
    pub latency: Option<Duration>,
    pub success_count: u64,
    pub error_count: u64,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self {
            is_healthy: true,
            last_error: None,
            last_error_at: None,
            latency: None,
            success_count: 0,
            error_count: 0,
        }
    }
}

impl EndpointHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.success_count += 1;
        self.latency = Some(latency);
        self.last_error = None;
        self.last_error_at = None;
        self.is_healthy = true;
    }

    /// Returns `true` when this failure took the endpoint out of rotation.
    pub fn record_failure(&mut self, message: impl Into<String>, threshold: u64) -> bool {
        self.error_count += 1;
        self.last_error = Some(message.into());
        self.last_error_at = Some(Instant::now());

        if self.is_healthy && self.error_count >= threshold {
            self.is_healthy = false;
            return true;
        }
        false
    }

    /// Probe succeeded: back in rotation with one error forgiven.
    pub fn record_recovery(&mut self) {
        self.is_healthy = true;
        self.error_count = self.error_count.saturating_sub(1);
    }

    pub fn success_rate(&self) -> f64 {
        let total = (self.success_count + self.error_count).max(1);
        self.success_count as f64 / total as f64
    }

    pub fn is_due_for_probe(&self, now: Instant, cooldown: Duration) -> bool {
        if self.is_healthy {
            return false;
        }
        match self.last_error_at {
            Some(at) => now.saturating_duration_since(at) >= cooldown,
            None => true,
        }
    }
}

/// Per-endpoint entry of a [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatus {
    pub label: String,
    pub url: String,
    pub priority: u32,
    pub is_healthy: bool,
    pub last_latency_ms: Option<u64>,
    pub success_rate: f64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub healthy_count: usize,
    pub total_count: usize,
    pub healthy_percentage: f64,
    pub endpoints: Vec<EndpointStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut health = EndpointHealth::new();
        assert_eq!(health.success_rate(), 0.0);

        health.record_success(Duration::from_millis(40));
        health.record_success(Duration::from_millis(60));
        health.record_failure("boom", 3);
        assert!((health.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(health.latency, Some(Duration::from_millis(60)));
    }

    #[test]
    fn test_threshold_flips_health() {
        let mut health = EndpointHealth::new();
        assert!(!health.record_failure("one", 3));
        assert!(!health.record_failure("two", 3));
        assert!(health.is_healthy);
        assert!(health.record_failure("three", 3));
        assert!(!health.is_healthy);
        // already out of rotation
        assert!(!health.record_failure("four", 3));
        assert_eq!(health.error_count, 4);
        assert_eq!(health.last_error.as_deref(), Some("four"));
    }

    #[test]
    fn test_success_clears_error_but_keeps_count() {
        let mut health = EndpointHealth::new();
        for _ in 0..3 {
            health.record_failure("down", 3);
        }
        health.record_success(Duration::from_millis(10));
        assert!(health.is_healthy);
        assert!(health.last_error.is_none());
        assert!(health.last_error_at.is_none());
        assert_eq!(health.error_count, 3);
        assert_eq!(health.success_count, 1);
    }

    #[test]
    fn test_recovery_forgives_one_error() {
        let mut health = EndpointHealth::new();
        for _ in 0..3 {
            health.record_failure("down", 3);
        }
        health.record_recovery();
        assert!(health.is_healthy);
        assert_eq!(health.error_count, 2);

        let mut clean = EndpointHealth::new();
        clean.is_healthy = false;
        clean.record_recovery();
        assert_eq!(clean.error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_for_probe_after_cooldown() {
        let cooldown = Duration::from_secs(300);
        let mut health = EndpointHealth::new();
        assert!(!health.is_due_for_probe(Instant::now(), cooldown));

        health.record_failure("down", 1);
        assert!(!health.is_due_for_probe(Instant::now(), cooldown));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!health.is_due_for_probe(Instant::now(), cooldown));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(health.is_due_for_probe(Instant::now(), cooldown));
    }
}
