//! The remote calls a session depends on.
//!
//! [`GrpcTransport`](crate::client::GrpcTransport) implements this over the
//! Login, Search and Reports services sharing one channel;
//! [`MockTransport`](crate::mock::MockTransport) replays scripted responses.

use async_trait::async_trait;
use recap_proto as proto;

use crate::aggregate::Summary;
use crate::error::Result;
use crate::record::RecordKind;

/// One connection to the record server.
///
/// Calls are issued strictly one at a time, so every method takes `&mut self`.
#[async_trait]
pub trait TaskTransport: Send {
    /// Authenticate. A wrong key fails with
    /// [`ClientError::InvalidCredentialsKey`](crate::ClientError::InvalidCredentialsKey).
    async fn login(&mut self, name: &str, key: i32) -> Result<()>;

    /// Configure the record kinds the search emits and the total record limit.
    /// Returns the server's acknowledgement.
    async fn negotiate_capabilities(&mut self, accepted: &[RecordKind], limit: i32)
        -> Result<bool>;

    /// Single-record fetch.
    async fn fetch(&mut self) -> Result<proto::FetchResult>;

    /// Batch fetch of up to `count` envelopes.
    async fn fetch_batch(&mut self, count: i32) -> Result<proto::BatchFetchResult>;

    /// Submit the summary. Returns the server's acknowledgement.
    async fn save_summary(&mut self, summary: &Summary) -> Result<bool>;

    /// End the authenticated session.
    async fn logout(&mut self) -> Result<()>;

    /// Release the connection. Calls issued afterwards fail.
    async fn close(&mut self);
}
