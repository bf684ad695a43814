//! Client library for the record search service.
//!
//! A session logs in, polls the search service until it reports the end of
//! the stream, folds every record into a [`Summary`] and submits it to the
//! reports service. The pieces are usable on their own:
//!
//! - [`decode`]: batch envelope → single [`Record`]
//! - [`fetch`]: the poll loop over single or batch fetch calls
//! - [`aggregate`]: records → [`Summary`]
//! - [`session`]: the full login-to-logout sequence
//!
//! All remote calls go through the [`TaskTransport`] trait, implemented by
//! [`GrpcTransport`] and by the scripted [`mock::MockTransport`].

pub mod aggregate;
pub mod client;
pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod mock;
pub mod record;
pub mod session;
pub mod transport;

pub use aggregate::{aggregate, Summary, SummaryEntry};
pub use client::{ChannelConfig, GrpcTransport};
pub use config::RecapConfig;
pub use connection::{AddressError, ServerAddress, DEFAULT_SERVER_PORT, DEFAULT_SERVER_URL};
pub use error::{ClientError, Result};
pub use fetch::{FetchMode, FetchOutcome, FetchStats, PollConfig, PollFetcher};
pub use record::{Record, RecordKind};
pub use session::{Credentials, Session, SessionPlan, SessionReport};
pub use transport::TaskTransport;
