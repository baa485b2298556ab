//! Background recovery of unhealthy endpoints.
//!
//! Every `health_check_interval` the prober looks for endpoints that are out of
//! rotation and have rested for `recovery_cooldown` since their last error, and
//! sends each one probe. A probe that answers in time puts the endpoint back with
//! one error forgiven; a failed probe changes nothing.

use crate::config::FailoverConfig;
use crate::connector::Connector;
use crate::manager::FailoverManager;
use crate::registry::Registry;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

pub(crate) struct ShutdownSignal {
    notify: Notify,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl<C: Connector> FailoverManager<C> {
    /// Spawn the periodic prober. No-op when it is already running or after
    /// [`Self::shutdown`].
    pub fn start_health_check_task(&self) {
        let mut task = self.shutdown.task.lock();
        if self.shutdown.is_stopped() || task.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        let connector = Arc::clone(&self.connector);
        let config = Arc::clone(&self.config);
        let shutdown = Arc::clone(&self.shutdown);

        *task = Some(tokio::spawn(async move {
            let period = config.health_check_interval;
            let mut health_interval = interval_at(Instant::now() + period, period);
            info!("Health check task started, interval {:?}", period);

            loop {
                tokio::select! {
                    _ = health_interval.tick() => {
                        run_recovery_pass(&state, connector.as_ref(), &config).await;
                    }
                    _ = shutdown.notify.notified() => {
                        info!("Health check task shutting down");
                        break;
                    }
                }

                if shutdown.is_stopped() {
                    info!("Health check task shutting down");
                    break;
                }
            }
        }));
    }

    /// Run one recovery pass now. Returns how many endpoints came back.
    pub async fn run_health_check(&self) -> usize {
        run_recovery_pass(&self.state, self.connector.as_ref(), &self.config).await
    }

    pub fn is_health_check_running(&self) -> bool {
        self.shutdown
            .task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the prober. Safe to call any number of times, from any clone.
    pub fn shutdown(&self) {
        if self.shutdown.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // notify_one keeps a permit, so a task busy probing still sees it
        self.shutdown.notify.notify_one();
        self.shutdown.task.lock().take();
        info!("Failover manager shut down");
    }
}

pub(crate) async fn run_recovery_pass<C: Connector>(
    state: &RwLock<Registry>,
    connector: &C,
    config: &FailoverConfig,
) -> usize {
    let now = Instant::now();
    let due: Vec<(usize, String, C::Connection)> = {
        let s = state.read();
        s.iter()
            .enumerate()
            .filter(|(_, e)| e.health.is_due_for_probe(now, config.recovery_cooldown))
            .map(|(i, e)| (i, e.label().to_string(), connector.connect(&e.url)))
            .collect()
    };

    if due.is_empty() {
        debug!("No endpoints due for a recovery probe");
        return 0;
    }

    info!("Probing {} unhealthy endpoints", due.len());

    let futures: Vec<_> = due
        .into_iter()
        .map(|(idx, label, conn)| {
            let probe = connector.probe(conn);
            async move {
                let ok = match tokio::time::timeout(config.probe_timeout, probe).await {
                    Ok(Ok(block)) => {
                        debug!("Probe of {} answered with block {}", label, block);
                        true
                    }
                    Ok(Err(e)) => {
                        debug!("Probe of {} failed: {}", label, e);
                        false
                    }
                    Err(_) => {
                        debug!("Probe of {} timed out", label);
                        false
                    }
                };
                (idx, label, ok)
            }
        })
        .collect();

    let results = join_all(futures).await;

    let mut recovered = 0;
    let mut s = state.write();
    for (idx, label, ok) in results {
        if !ok {
            continue;
        }
        if let Some(endpoint) = s.get_mut(idx) {
            // a request may have succeeded on it while the probe was in flight
            if endpoint.health.is_healthy {
                continue;
            }
            endpoint.health.record_recovery();
            recovered += 1;
            info!(
                "Endpoint {} recovered, error count now {}",
                label, endpoint.health.error_count
            );
        }
    }

    recovered
}
