//! How a connection to one endpoint is built and probed.
//!
//! Every attempt gets a fresh connection; nothing is pooled across attempts.

use alloy_network::Ethereum;
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_transport::TransportResult;
use alloy_transport_http::Http;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use url::Url;

pub type InnerProvider = RootProvider<Ethereum>;

pub trait Connector: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    fn connect(&self, url: &Url) -> Self::Connection;

    /// Lightweight liveness check used for recovery, returning the current chain height.
    fn probe(&self, conn: Self::Connection) -> BoxFuture<'static, TransportResult<u64>>;
}

/// Plain JSON-RPC over HTTP, one alloy [`RootProvider`] per attempt.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Connector for HttpConnector {
    type Connection = InnerProvider;

    fn connect(&self, url: &Url) -> InnerProvider {
        let transport = Http::with_client(self.client.clone(), url.clone());
        RootProvider::new(RpcClient::new(transport, false))
    }

    fn probe(&self, conn: InnerProvider) -> BoxFuture<'static, TransportResult<u64>> {
        async move { conn.get_block_number().await }.boxed()
    }
}
