//! Session orchestration: login → negotiate → fetch → aggregate → submit → logout.
//!
//! A [`Session`] owns its transport for exactly one run. [`Session::run`]
//! consumes the session and releases the connection once, after the
//! fallible steps have finished, whichever way they finished.

use serde::Serialize;

use crate::aggregate::{aggregate, Summary};
use crate::error::{ClientError, Result};
use crate::fetch::{FetchMode, FetchStats, PollFetcher};
use crate::record::RecordKind;
use crate::transport::TaskTransport;

/// Default total record limit negotiated in batch mode.
pub const DEFAULT_SEARCH_LIMIT: i32 = 50;

/// Default records per batch call.
pub const DEFAULT_BATCH_SIZE: i32 = 10;

/// Login name and initial key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub name: String,
    /// Key tried first.
    pub key: i32,
}

/// What to fetch and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    /// Record kinds requested from the server, duplicates removed.
    pub accepted_types: Vec<RecordKind>,
    /// Maximum records the server emits in batch mode.
    pub search_limit: i32,
    /// Envelopes per batch call.
    pub batch_size: i32,
}

impl Default for SessionPlan {
    fn default() -> Self {
        Self {
            accepted_types: vec![RecordKind::ItemA],
            search_limit: DEFAULT_SEARCH_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SessionPlan {
    /// Build a plan, dropping repeated kinds while keeping first-seen order.
    /// An empty type list means the default kind.
    #[must_use]
    pub fn new(accepted_types: Vec<RecordKind>, search_limit: i32, batch_size: i32) -> Self {
        let mut unique = Vec::with_capacity(accepted_types.len());
        for kind in accepted_types {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        if unique.is_empty() {
            unique.push(RecordKind::default());
        }
        Self {
            accepted_types: unique,
            search_limit,
            batch_size,
        }
    }

    /// Single-record mode when exactly the default kind is requested,
    /// batch mode otherwise.
    #[must_use]
    pub fn mode(&self) -> FetchMode {
        if self.accepted_types == [RecordKind::default()] {
            FetchMode::Single
        } else {
            FetchMode::Batch {
                size: self.batch_size,
            }
        }
    }
}

/// Result of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Fetch mode used.
    pub mode: FetchMode,
    /// Poll loop counters.
    pub fetch_stats: FetchStats,
    /// The accepted summary.
    pub summary: Summary,
    /// Logout failure, if any. Does not affect the accepted submission.
    pub logout_error: Option<String>,
}

/// One authenticated run against the server.
pub struct Session<T: TaskTransport> {
    transport: T,
    credentials: Credentials,
    plan: SessionPlan,
    fetcher: PollFetcher,
}

impl<T: TaskTransport> Session<T> {
    /// Create a session over an open transport.
    pub fn new(transport: T, credentials: Credentials, plan: SessionPlan) -> Self {
        Self {
            transport,
            credentials,
            plan,
            fetcher: PollFetcher::default(),
        }
    }

    /// Replace the poll loop used for fetching.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: PollFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Run every step, then release the connection.
    pub async fn run(mut self) -> Result<SessionReport> {
        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "session aborted");
        }
        self.transport.close().await;
        outcome
    }

    async fn drive(&mut self) -> Result<SessionReport> {
        self.login().await?;

        let mode = self.plan.mode();
        if let FetchMode::Batch { .. } = mode {
            self.negotiate().await?;
        } else {
            tracing::info!("requested default type only, using single-record fetch");
        }

        let fetched = self.fetcher.fetch_all(&mut self.transport, mode).await?;

        tracing::info!(records = fetched.records.len(), "forming summary");
        let summary = aggregate(&fetched.records);

        let accepted = self.transport.save_summary(&summary).await?;
        if accepted {
            tracing::info!(fields = summary.len(), "summary accepted");
        } else {
            tracing::warn!("server rejected the summary");
        }

        let logout_error = match self.transport.logout().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "logout failed");
                Some(e.to_string())
            }
        };

        if !accepted {
            return Err(ClientError::SummaryRejected);
        }

        Ok(SessionReport {
            mode,
            fetch_stats: fetched.stats,
            summary,
            logout_error,
        })
    }

    /// Log in, retrying exactly once with the key the server asks for.
    async fn login(&mut self) -> Result<()> {
        let Credentials { name, key } = &self.credentials;
        match self.transport.login(name, *key).await {
            Ok(()) => {
                tracing::info!(%name, "logged in");
                Ok(())
            }
            Err(ClientError::InvalidCredentialsKey { expected_key }) => {
                tracing::warn!(
                    %name,
                    rejected = *key,
                    expected_key,
                    "login key rejected, retrying with server-supplied key"
                );
                self.transport.login(name, expected_key).await?;
                tracing::info!(%name, "logged in");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn negotiate(&mut self) -> Result<()> {
        tracing::info!(
            types = ?self.plan.accepted_types,
            limit = self.plan.search_limit,
            batch_size = self.plan.batch_size,
            "requested multiple types, negotiating batch fetch"
        );
        let ack = self
            .transport
            .negotiate_capabilities(&self.plan.accepted_types, self.plan.search_limit)
            .await?;
        if ack {
            Ok(())
        } else {
            Err(ClientError::CapabilitiesRejected)
        }
    }
}
