//! Scripted in-memory transport.
//!
//! `MockTransport` answers each call from a queue of canned responses and
//! records every call it receives, so sessions and fetch loops can be driven
//! without a server. Exhausted queues fall back to benign defaults: logins are
//! accepted, fetches report `ENDED`, acknowledgements are `true`.
//!
//! ```
//! use recap_client::mock::{MockCall, MockTransport};
//! use recap_proto::FetchResult;
//!
//! let mock = MockTransport::new()
//!     .with_fetch(FetchResult::pending())
//!     .with_fetch(FetchResult::ended());
//! let handle = mock.handle();
//! assert!(handle.calls().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use recap_proto as proto;

use crate::aggregate::Summary;
use crate::error::{ClientError, Result};
use crate::record::RecordKind;
use crate::transport::TaskTransport;

/// Canned reply to a login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    /// Login succeeds.
    Accept,
    /// Wrong key; the server expects `expected_key`.
    InvalidKey {
        /// Key to retry with.
        expected_key: i32,
    },
    /// Any other failure, surfaced as an `UNAUTHENTICATED` status.
    Deny(String),
}

/// A call observed by the mock, in order of arrival.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum MockCall {
    Login { name: String, key: i32 },
    NegotiateCapabilities { accepted: Vec<RecordKind>, limit: i32 },
    Fetch,
    FetchBatch { count: i32 },
    SaveSummary(Summary),
    Logout,
    /// Connection released.
    Close,
}

#[derive(Debug)]
struct MockState {
    logins: VecDeque<LoginReply>,
    fetches: VecDeque<proto::FetchResult>,
    batches: VecDeque<proto::BatchFetchResult>,
    capabilities_ack: bool,
    summary_ack: bool,
    logout_failure: Option<String>,
    fetch_failure: Option<tonic::Status>,
    batch_failure: Option<tonic::Status>,
    capabilities_failure: Option<tonic::Status>,
    save_failure: Option<tonic::Status>,
    calls: Vec<MockCall>,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            logins: VecDeque::new(),
            fetches: VecDeque::new(),
            batches: VecDeque::new(),
            capabilities_ack: true,
            summary_ack: true,
            logout_failure: None,
            fetch_failure: None,
            batch_failure: None,
            capabilities_failure: None,
            save_failure: None,
            calls: Vec::new(),
            closed: false,
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport that replays scripted responses.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Read-only view of a [`MockTransport`] that outlives the session owning it.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a login reply.
    #[must_use]
    pub fn with_login(self, reply: LoginReply) -> Self {
        lock(&self.state).logins.push_back(reply);
        self
    }

    /// Queue a single-record fetch response.
    #[must_use]
    pub fn with_fetch(self, response: proto::FetchResult) -> Self {
        lock(&self.state).fetches.push_back(response);
        self
    }

    /// Queue several single-record fetch responses.
    #[must_use]
    pub fn with_fetches(self, responses: impl IntoIterator<Item = proto::FetchResult>) -> Self {
        lock(&self.state).fetches.extend(responses);
        self
    }

    /// Queue a batch fetch response.
    #[must_use]
    pub fn with_batch(self, response: proto::BatchFetchResult) -> Self {
        lock(&self.state).batches.push_back(response);
        self
    }

    /// Acknowledgement returned by capability negotiation.
    #[must_use]
    pub fn with_capabilities_ack(self, ack: bool) -> Self {
        lock(&self.state).capabilities_ack = ack;
        self
    }

    /// Acknowledgement returned by summary submission.
    #[must_use]
    pub fn with_summary_ack(self, ack: bool) -> Self {
        lock(&self.state).summary_ack = ack;
        self
    }

    /// Make logout fail with a `FAILED_PRECONDITION` status.
    #[must_use]
    pub fn with_logout_failure(self, message: impl Into<String>) -> Self {
        lock(&self.state).logout_failure = Some(message.into());
        self
    }

    /// Fail the next single-record fetch with `status`.
    #[must_use]
    pub fn with_fetch_failure(self, status: tonic::Status) -> Self {
        lock(&self.state).fetch_failure = Some(status);
        self
    }

    /// Fail the next batch fetch with `status`.
    #[must_use]
    pub fn with_batch_failure(self, status: tonic::Status) -> Self {
        lock(&self.state).batch_failure = Some(status);
        self
    }

    /// Fail capability negotiation with `status`.
    #[must_use]
    pub fn with_capabilities_failure(self, status: tonic::Status) -> Self {
        lock(&self.state).capabilities_failure = Some(status);
        self
    }

    /// Fail summary submission with `status`.
    #[must_use]
    pub fn with_save_failure(self, status: tonic::Status) -> Self {
        lock(&self.state).save_failure = Some(status);
        self
    }

    /// Handle for inspecting calls after the transport has been moved.
    #[must_use]
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Record `call` and fail if the connection was already released.
    fn record(&self, call: MockCall) -> Result<MutexGuard<'_, MockState>> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        if state.closed {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(state)
    }
}

impl MockHandle {
    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| predicate(*c)).count()
    }

    /// Keys used by login attempts, in order.
    #[must_use]
    pub fn login_keys(&self) -> Vec<i32> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Login { key, .. } => Some(*key),
                _ => None,
            })
            .collect()
    }

    /// Number of times the connection was released.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Close))
    }

    /// The last submitted summary, if any.
    #[must_use]
    pub fn submitted_summary(&self) -> Option<Summary> {
        lock(&self.state).calls.iter().rev().find_map(|call| match call {
            MockCall::SaveSummary(summary) => Some(summary.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl TaskTransport for MockTransport {
    async fn login(&mut self, name: &str, key: i32) -> Result<()> {
        let mut state = self.record(MockCall::Login {
            name: name.to_string(),
            key,
        })?;
        match state.logins.pop_front().unwrap_or(LoginReply::Accept) {
            LoginReply::Accept => Ok(()),
            LoginReply::InvalidKey { expected_key } => {
                Err(ClientError::InvalidCredentialsKey { expected_key })
            }
            LoginReply::Deny(message) => Err(tonic::Status::unauthenticated(message).into()),
        }
    }

    async fn negotiate_capabilities(
        &mut self,
        accepted: &[RecordKind],
        limit: i32,
    ) -> Result<bool> {
        let mut state = self.record(MockCall::NegotiateCapabilities {
            accepted: accepted.to_vec(),
            limit,
        })?;
        if let Some(status) = state.capabilities_failure.take() {
            return Err(status.into());
        }
        Ok(state.capabilities_ack)
    }

    async fn fetch(&mut self) -> Result<proto::FetchResult> {
        let mut state = self.record(MockCall::Fetch)?;
        if let Some(status) = state.fetch_failure.take() {
            return Err(status.into());
        }
        Ok(state
            .fetches
            .pop_front()
            .unwrap_or_else(proto::FetchResult::ended))
    }

    async fn fetch_batch(&mut self, count: i32) -> Result<proto::BatchFetchResult> {
        let mut state = self.record(MockCall::FetchBatch { count })?;
        if let Some(status) = state.batch_failure.take() {
            return Err(status.into());
        }
        Ok(state
            .batches
            .pop_front()
            .unwrap_or_else(proto::BatchFetchResult::ended))
    }

    async fn save_summary(&mut self, summary: &Summary) -> Result<bool> {
        let mut state = self.record(MockCall::SaveSummary(summary.clone()))?;
        if let Some(status) = state.save_failure.take() {
            return Err(status.into());
        }
        Ok(state.summary_ack)
    }

    async fn logout(&mut self) -> Result<()> {
        let state = self.record(MockCall::Logout)?;
        match &state.logout_failure {
            Some(message) => Err(tonic::Status::failed_precondition(message.clone()).into()),
            None => Ok(()),
        }
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(MockCall::Close);
        state.closed = true;
    }
}
