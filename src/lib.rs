//! # alloy-failover-strategy
//!
//! A health-ranked pool of RPC endpoints for [alloy](https://alloy.rs/) with
//! per-request failover and background recovery.
//!
//! ## Features
//!
//! - **Endpoint Pool**: A fixed set of labelled, prioritized JSON-RPC endpoints (BNB Smart Chain defaults)
//! - **Health Bookkeeping**: Success and error counts, last latency and last error per endpoint
//! - **Best-Endpoint Selection**: Highest success rate wins, close rates fall back to static priority
//! - **Failover**: Failed attempts move to an untried endpoint after a jittered backoff
//! - **User Rejections Pass Through**: A declined wallet action is never retried
//! - **Recovery Prober**: Background task that probes resting unhealthy endpoints and restores them
//! - **Status Snapshot**: Serializable health report for dashboards
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alloy_failover_strategy::{EndpointConfig, FailoverConfig, FailoverManager, Provider};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FailoverConfig::new(vec![
//!         EndpointConfig::new("https://bsc-dataseed.binance.org", "binance", 1),
//!         EndpointConfig::new("https://rpc.ankr.com/bsc", "ankr", 2),
//!     ])
//!     .with_request_timeout(Duration::from_secs(10))
//!     .with_max_attempts(4);
//!
//!     let manager = FailoverManager::new(config).await?;
//!
//!     let chain_id = manager
//!         .execute("chain_id", |provider| async move { provider.get_chain_id().await })
//!         .await?;
//!     println!("chain {} via {}", chain_id.result, chain_id.endpoint_label);
//!
//!     let status = manager.status();
//!     println!("{}/{} endpoints healthy", status.healthy_count, status.total_count);
//!
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connector;
pub mod error;
pub mod health;
pub mod manager;
pub mod recovery;
pub mod registry;

// Re-export main types at crate root
pub use backoff::{FixedJitter, JitterSource, RandomJitter};
pub use config::{default_endpoints, EndpointConfig, FailoverConfig};
pub use connector::{Connector, HttpConnector, InnerProvider};
pub use error::{FailoverError, Result};
pub use health::{EndpointHealth, EndpointStatus, StatusReport};
pub use manager::{ConnectionSource, Execution, FailoverManager, ResolvedConnection};

// Re-export commonly used alloy types for convenience
pub use alloy_network::Ethereum;
pub use alloy_primitives::{Address, U256};
pub use alloy_provider::{Provider, RootProvider};
pub use alloy_transport::{TransportError, TransportErrorKind, TransportResult};
