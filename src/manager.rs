//! The failover manager: runs caller work against the best available endpoint and
//! moves on to alternates when an attempt fails.

use crate::backoff::{backoff_delay, JitterSource, RandomJitter};
use crate::config::{EndpointConfig, FailoverConfig};
use crate::connector::{Connector, HttpConnector};
use crate::error::{FailoverError, Result};
use crate::health::StatusReport;
use crate::recovery::ShutdownSignal;
use crate::registry::Registry;

use parking_lot::RwLock;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A successful result together with where and how it was obtained.
#[derive(Debug, Clone)]
pub struct Execution<T> {
    pub result: T,
    pub endpoint_label: String,
    /// Duration of the attempt that succeeded.
    pub elapsed: Duration,
    pub attempts: u32,
}

impl<T> Execution<T> {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    pub fn into_result(self) -> T {
        self.result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Managed { label: String },
    /// The wallet provider handed in by the caller, used once every managed endpoint failed.
    Injected,
}

#[derive(Debug, Clone)]
pub struct ResolvedConnection<T> {
    pub connection: T,
    pub source: ConnectionSource,
}

/// Pool of RPC endpoints with health ranking, failover and background recovery.
///
/// Cloning is cheap and every clone shares the same registry and prober.
///
/// # Example
///
/// ```rust,no_run
/// use alloy_failover_strategy::{FailoverConfig, FailoverManager, Provider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = FailoverManager::new(FailoverConfig::default()).await?;
///
/// let block = manager
///     .execute("block_number", |provider| async move { provider.get_block_number().await })
///     .await?;
/// println!("block {} from {} in {}ms", block.result, block.endpoint_label, block.elapsed_ms());
///
/// manager.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct FailoverManager<C: Connector = HttpConnector> {
    pub(crate) state: Arc<RwLock<Registry>>,
    pub(crate) connector: Arc<C>,
    pub(crate) config: Arc<FailoverConfig>,
    pub(crate) jitter: Arc<dyn JitterSource>,
    pub(crate) shutdown: Arc<ShutdownSignal>,
}

impl<C: Connector> Clone for FailoverManager<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            connector: Arc::clone(&self.connector),
            config: Arc::clone(&self.config),
            jitter: Arc::clone(&self.jitter),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl FailoverManager<HttpConnector> {
    pub async fn new(config: FailoverConfig) -> Result<Self> {
        Self::with_connector(config, HttpConnector::new()).await
    }

    pub async fn from_endpoints(endpoints: Vec<EndpointConfig>) -> Result<Self> {
        Self::new(FailoverConfig::new(endpoints)).await
    }
}

impl<C: Connector> FailoverManager<C> {
    pub async fn with_connector(config: FailoverConfig, connector: C) -> Result<Self> {
        config.validate()?;
        let registry = Registry::new(&config.endpoints)?;
        let start_health_check = config.start_health_check_on_init;

        let manager = Self {
            state: Arc::new(RwLock::new(registry)),
            connector: Arc::new(connector),
            config: Arc::new(config),
            jitter: Arc::new(RandomJitter),
            shutdown: Arc::new(ShutdownSignal::new()),
        };

        info!(
            "Failover manager ready with {} endpoints",
            manager.endpoint_count()
        );

        if start_health_check {
            manager.start_health_check_task();
        }

        Ok(manager)
    }

    pub fn with_jitter_source(mut self, jitter: impl JitterSource) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn endpoint_count(&self) -> usize {
        self.state.read().len()
    }

    pub fn healthy_endpoint_count(&self) -> usize {
        self.state.read().healthy_count()
    }

    pub fn status(&self) -> StatusReport {
        self.state.read().status()
    }

    /// Run `operation` with the configured attempt budget. See [`Self::execute_with_attempts`].
    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<Execution<T>>
    where
        F: FnMut(C::Connection) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<FailoverError>,
    {
        self.execute_with_attempts(label, self.config.max_attempts, operation)
            .await
    }

    /// Run `operation` against a fresh connection to the best endpoint, failing over to
    /// others on timeout or transport errors.
    ///
    /// Attempts are sequential. An endpoint already tried in this call is not picked
    /// again while untried ones remain. A user rejection is returned straight away
    /// and is not held against the endpoint. When every attempt fails the last error
    /// is returned wrapped in [`FailoverError::Exhausted`].
    pub async fn execute_with_attempts<T, E, F, Fut>(
        &self,
        label: &str,
        max_attempts: u32,
        mut operation: F,
    ) -> Result<Execution<T>>
    where
        F: FnMut(C::Connection) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<FailoverError>,
    {
        let max_attempts = max_attempts.max(1);
        let mut tried: HashSet<usize> = HashSet::new();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let (index, endpoint_label, url) = {
                let s = self.state.read();
                let index = s
                    .select(&tried, self.config.score_tolerance)
                    .ok_or_else(|| FailoverError::InvalidConfig("no endpoints configured".into()))?;
                let endpoint = s
                    .get(index)
                    .ok_or_else(|| FailoverError::Other(format!("endpoint {index} missing")))?;
                (index, endpoint.label().to_string(), endpoint.url.clone())
            };
            tried.insert(index);

            debug!(
                "[{}] attempt {}/{} via {}",
                label, attempt, max_attempts, endpoint_label
            );

            let conn = self.connector.connect(&url);
            let start = Instant::now();
            let outcome = tokio::time::timeout(self.config.request_timeout, operation(conn)).await;
            let elapsed = start.elapsed();

            let err = match outcome {
                Ok(Ok(result)) => {
                    if let Some(endpoint) = self.state.write().get_mut(index) {
                        endpoint.health.record_success(elapsed);
                    }
                    debug!(
                        "[{}] served by {} in {:?} (attempt {})",
                        label, endpoint_label, elapsed, attempt
                    );
                    return Ok(Execution {
                        result,
                        endpoint_label,
                        elapsed,
                        attempts: attempt,
                    });
                }
                Ok(Err(err)) => {
                    let err: FailoverError = err.into();
                    if err.is_user_rejection() {
                        info!("[{}] rejected by user, not retrying", label);
                        return Err(err.into_user_rejected());
                    }
                    err
                }
                Err(_) => FailoverError::Timeout {
                    endpoint: endpoint_label.clone(),
                    timeout: self.config.request_timeout,
                },
            };

            warn!(
                "[{}] attempt {}/{} on {} failed: {}",
                label, attempt, max_attempts, endpoint_label, err
            );
            self.record_failure(index, &err);
            last_error = Some(err);

            if attempt < max_attempts {
                let delay = backoff_delay(&self.config, attempt, self.jitter.as_ref());
                debug!("[{}] backing off for {:?}", label, delay);
                tokio::time::sleep(delay).await;
            }
        }

        let last = last_error.unwrap_or_else(|| FailoverError::Other("no attempt was made".into()));
        error!(
            "[{}] all {} attempts failed across {} endpoints: {}",
            label,
            max_attempts,
            tried.len(),
            last
        );

        Err(FailoverError::Exhausted {
            attempts: max_attempts,
            endpoints_tried: tried.len(),
            last: Box::new(last),
        })
    }

    fn record_failure(&self, index: usize, err: &FailoverError) {
        let mut s = self.state.write();
        if let Some(endpoint) = s.get_mut(index) {
            let flipped = endpoint
                .health
                .record_failure(err.to_string(), self.config.error_threshold);
            if flipped {
                warn!(
                    "Endpoint {} marked unhealthy after {} errors",
                    endpoint.config.label, endpoint.health.error_count
                );
            }
        }
    }

    /// A verified connection to the best managed endpoint, or `injected` (typically a
    /// browser wallet provider) when every managed endpoint fails.
    pub async fn resolve_connection(
        &self,
        injected: Option<C::Connection>,
    ) -> Result<ResolvedConnection<C::Connection>> {
        let connector = Arc::clone(&self.connector);
        let attempts = self.endpoint_count() as u32;

        let outcome = self
            .execute_with_attempts("resolve_connection", attempts, |conn: C::Connection| {
                let probe = connector.probe(conn.clone());
                async move { probe.await.map(|_| conn) }
            })
            .await;

        match outcome {
            Ok(execution) => Ok(ResolvedConnection {
                connection: execution.result,
                source: ConnectionSource::Managed {
                    label: execution.endpoint_label,
                },
            }),
            Err(err) if err.is_user_rejection() => Err(err),
            Err(err) => match injected {
                Some(connection) => {
                    warn!("All managed endpoints failed ({}), using injected provider", err);
                    Ok(ResolvedConnection {
                        connection,
                        source: ConnectionSource::Injected,
                    })
                }
                None => Err(err),
            },
        }
    }
}
