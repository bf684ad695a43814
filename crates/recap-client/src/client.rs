//! gRPC transport for the record server.
//!
//! The server multiplexes three services (Login, Search, Reports) over one
//! connection. [`GrpcTransport`] opens a single channel and shares it between
//! the three generated clients.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Channel;

use recap_proto::{
    log_in_response, login_client::LoginClient, reports_client::ReportsClient,
    search_client::SearchClient, BatchFetchResult, FetchBatchRequest, FetchRequest, FetchResult,
    InitRequest, LogInRequest, LogInResponse, LogOutRequest, SaveSummaryRequest,
};

use crate::aggregate::Summary;
use crate::connection::{AddressError, ServerAddress};
use crate::error::{ClientError, Result};
use crate::record::RecordKind;
use crate::transport::TaskTransport;

/// gRPC channel configuration for connection reliability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Connection timeout (how long to wait for initial connection)
    pub connect_timeout: Duration,
    /// Request timeout (default timeout for individual RPC calls)
    pub request_timeout: Duration,
    /// HTTP/2 keepalive interval (how often to send keepalive pings)
    pub keepalive_interval: Duration,
    /// Keepalive timeout (how long to wait for keepalive response)
    pub keepalive_timeout: Duration,
    /// Whether to send keepalive pings even when idle
    pub keepalive_while_idle: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(10),
            keepalive_timeout: Duration::from_secs(60),
            keepalive_while_idle: true,
        }
    }
}

/// The three service clients sharing one channel.
struct Services {
    login: LoginClient<Channel>,
    search: SearchClient<Channel>,
    reports: ReportsClient<Channel>,
}

/// [`TaskTransport`] over a tonic channel.
pub struct GrpcTransport {
    /// `None` once the connection has been released.
    services: Option<Services>,
    address: ServerAddress,
}

impl GrpcTransport {
    /// Connect to the server at the given address with default configuration.
    pub async fn connect(address: &ServerAddress) -> Result<Self> {
        Self::connect_with_config(address, ChannelConfig::default()).await
    }

    /// Connect with custom channel configuration.
    pub async fn connect_with_config(
        address: &ServerAddress,
        config: ChannelConfig,
    ) -> Result<Self> {
        // TODO: build a ClientTlsConfig for https:// addresses once the tonic
        // `tls` feature is enabled for this crate.
        if address.is_tls() {
            return Err(ClientError::InvalidConfig(format!(
                "TLS is not supported yet: {address}"
            )));
        }

        let endpoint = Channel::from_shared(address.as_str().to_string())
            .map_err(|e| AddressError::InvalidUrl(e.to_string()))?
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .http2_keep_alive_interval(config.keepalive_interval)
            .keep_alive_timeout(config.keepalive_timeout)
            .keep_alive_while_idle(config.keepalive_while_idle)
            .tcp_nodelay(true);

        tracing::info!(%address, "connecting to record server");
        let channel = endpoint.connect().await.map_err(|e| {
            tracing::warn!(error = %e, %address, "connection failed");
            e
        })?;

        Ok(Self {
            services: Some(Services {
                login: LoginClient::new(channel.clone()),
                search: SearchClient::new(channel.clone()),
                reports: ReportsClient::new(channel),
            }),
            address: address.clone(),
        })
    }

    /// Address this transport is connected to.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Returns `true` until [`close`](TaskTransport::close) has run.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.services.is_some()
    }

    fn services(&mut self) -> Result<&mut Services> {
        self.services.as_mut().ok_or(ClientError::ConnectionClosed)
    }
}

/// Map the login reply onto the session's error model.
fn login_outcome(response: LogInResponse) -> Result<()> {
    match response.outcome {
        Some(log_in_response::Outcome::Accepted(_)) => Ok(()),
        Some(log_in_response::Outcome::InvalidKey(invalid)) => {
            Err(ClientError::InvalidCredentialsKey {
                expected_key: invalid.expected_key,
            })
        }
        None => Err(tonic::Status::internal("login response carried no outcome").into()),
    }
}

#[async_trait]
impl TaskTransport for GrpcTransport {
    async fn login(&mut self, name: &str, key: i32) -> Result<()> {
        tracing::debug!(name, key, "GrpcTransport::login() - sending gRPC request");
        let response = self
            .services()?
            .login
            .log_in(LogInRequest {
                user_name: name.to_string(),
                key,
            })
            .await?
            .into_inner();
        login_outcome(response)
    }

    async fn negotiate_capabilities(
        &mut self,
        accepted: &[RecordKind],
        limit: i32,
    ) -> Result<bool> {
        let item_types = accepted.iter().map(|kind| kind.name().to_string()).collect();
        let response = self
            .services()?
            .search
            .init(InitRequest { item_types, limit })
            .await?;
        Ok(response.into_inner().accepted)
    }

    async fn fetch(&mut self) -> Result<FetchResult> {
        let response = self.services()?.search.fetch(FetchRequest {}).await?;
        Ok(response.into_inner())
    }

    async fn fetch_batch(&mut self, count: i32) -> Result<BatchFetchResult> {
        let response = self
            .services()?
            .search
            .fetch_batch(FetchBatchRequest { count })
            .await?;
        Ok(response.into_inner())
    }

    async fn save_summary(&mut self, summary: &Summary) -> Result<bool> {
        let request = SaveSummaryRequest::from(summary);
        let response = self
            .services()?
            .reports
            .save_summary(request)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "GrpcTransport::save_summary() - gRPC request failed");
                e
            })?;
        Ok(response.into_inner().accepted)
    }

    async fn logout(&mut self) -> Result<()> {
        self.services()?.login.log_out(LogOutRequest {}).await?;
        Ok(())
    }

    async fn close(&mut self) {
        // Dropping the clients drops the last handles to the channel.
        if self.services.take().is_some() {
            tracing::info!(address = %self.address, "connection released");
        }
    }
}
