//! Client error types.

use thiserror::Error;

use crate::connection::AddressError;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while running a fetch-and-report session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid server address.
    #[error("Invalid server address: {0}")]
    Address(#[from] AddressError),

    /// gRPC transport error (connection failed, TLS error, etc.).
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC status error (server returned an error).
    #[error("gRPC status error: {0}")]
    RpcStatus(#[from] tonic::Status),

    /// The server rejected the login key and told us which one it expects.
    #[error("Invalid credentials key, server expects {expected_key}")]
    InvalidCredentialsKey {
        /// Key the server will accept on the next attempt.
        expected_key: i32,
    },

    /// A batch envelope did not carry exactly one record.
    #[error("Malformed envelope at batch index {index}: {populated} variants populated, expected 1")]
    MalformedEnvelope {
        /// Position of the envelope within its batch.
        index: usize,
        /// Number of populated variant slots.
        populated: usize,
    },

    /// Fetch response carried a status outside ITEM/PENDING/ENDED.
    #[error("Unexpected fetch response status {0}")]
    UnexpectedResponseStatus(i32),

    /// Single-record ITEM response arrived without a record.
    #[error("ITEM response carried no record")]
    MissingItem,

    /// The poll loop hit its configured upper bound before ENDED.
    #[error("Fetch did not end after {polls} polls")]
    PollLimitExceeded {
        /// Number of fetch calls issued.
        polls: u64,
    },

    /// The server refused the accepted-types/limit configuration.
    #[error("Server rejected capability negotiation")]
    CapabilitiesRejected,

    /// The server answered the summary submission with `false`.
    #[error("Server rejected the summary")]
    SummaryRejected,

    /// A call was issued after the connection was released.
    #[error("Connection already closed")]
    ConnectionClosed,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<figment::Error> for ClientError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
