//! Endpoint registry and the selection policy that picks which endpoint serves the
//! next attempt.

use crate::config::EndpointConfig;
use crate::error::{FailoverError, Result};
use crate::health::{EndpointHealth, EndpointStatus, StatusReport};

use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub config: EndpointConfig,
    pub url: Url,
    pub health: EndpointHealth,
}

impl Endpoint {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let url: Url = config.url.parse().map_err(|e: url::ParseError| {
            FailoverError::InitializationFailed {
                url: config.url.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            config,
            url,
            health: EndpointHealth::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    fn status(&self) -> EndpointStatus {
        EndpointStatus {
            label: self.config.label.clone(),
            url: self.config.url.clone(),
            priority: self.config.priority,
            is_healthy: self.health.is_healthy,
            last_latency_ms: self.health.latency.map(|l| l.as_millis() as u64),
            success_rate: self.health.success_rate(),
            success_count: self.health.success_count,
            error_count: self.health.error_count,
            last_error: self.health.last_error.clone(),
        }
    }
}

/// The fixed endpoint set. Records are mutated in place, never added or removed.
#[derive(Debug)]
pub struct Registry {
    endpoints: Vec<Endpoint>,
}

impl Registry {
    pub fn new(configs: &[EndpointConfig]) -> Result<Self> {
        let endpoints = configs
            .iter()
            .cloned()
            .map(Endpoint::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn healthy_count(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|e| e.health.is_healthy)
            .count()
    }

    /// Pick the endpoint for the next attempt.
    ///
    /// Endpoints in `excluded` are skipped unless that would leave nothing, in which
    /// case every endpoint is eligible again. Among healthy candidates the higher
    /// success rate wins, except that rates within `tolerance` of each other are
    /// decided by the lower priority number. With no healthy candidate the one with
    /// the fewest errors is returned so callers always make progress.
    pub fn select(&self, excluded: &HashSet<usize>, tolerance: f64) -> Option<usize> {
        let all_excluded = (0..self.endpoints.len()).all(|i| excluded.contains(&i));
        let candidates: Vec<usize> = (0..self.endpoints.len())
            .filter(|i| all_excluded || !excluded.contains(i))
            .collect();

        let healthy = candidates
            .iter()
            .copied()
            .filter(|&i| self.endpoints[i].health.is_healthy);

        let chosen = healthy
            .reduce(|best, next| {
                if self.prefer(next, best, tolerance) == Ordering::Less {
                    next
                } else {
                    best
                }
            })
            .or_else(|| {
                candidates.iter().copied().min_by(|&a, &b| {
                    let (ea, eb) = (&self.endpoints[a], &self.endpoints[b]);
                    ea.health
                        .error_count
                        .cmp(&eb.health.error_count)
                        .then(ea.config.priority.cmp(&eb.config.priority))
                })
            });

        if let Some(i) = chosen {
            let e = &self.endpoints[i];
            debug!(
                "Selected endpoint {} (healthy={}, success_rate={:.2}, excluded={})",
                e.config.label,
                e.health.is_healthy,
                e.health.success_rate(),
                excluded.len()
            );
        }
        chosen
    }

    /// `Less` means `a` should be tried before `b`.
    fn prefer(&self, a: usize, b: usize, tolerance: f64) -> Ordering {
        let (ea, eb) = (&self.endpoints[a], &self.endpoints[b]);
        let (ra, rb) = (ea.health.success_rate(), eb.health.success_rate());

        if (ra - rb).abs() < tolerance {
            ea.config.priority.cmp(&eb.config.priority)
        } else {
            rb.partial_cmp(&ra)
                .unwrap_or(Ordering::Equal)
                .then(ea.config.priority.cmp(&eb.config.priority))
        }
    }

    pub fn status(&self) -> StatusReport {
        let total_count = self.endpoints.len();
        let healthy_count = self.healthy_count();
        let healthy_percentage = if total_count == 0 {
            0.0
        } else {
            healthy_count as f64 * 100.0 / total_count as f64
        };

        StatusReport {
            healthy_count,
            total_count,
            healthy_percentage,
            endpoints: self.endpoints.iter().map(Endpoint::status).collect(),
        }
    }
}
