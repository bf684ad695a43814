//! Poll-based fetch loop.
//!
//! The search service answers every fetch with one of three statuses:
//!
//! ```text
//!              ITEM (records appended)
//!               ┌────────┐
//!               ▼        │
//!  start ──> in progress ┤── PENDING (sleep, append nothing)
//!               │        ▲
//!               │        └────────┘
//!               ├── ENDED ─────────────> done (buffer returned)
//!               └── other / bad batch ─> aborted (error returned)
//! ```
//!
//! Exactly one call is in flight at a time. The only suspension besides the
//! outstanding call is the delay after a `PENDING` response.

use std::time::Duration;

use recap_proto as proto;
use serde::Serialize;

use crate::decode::decode_batch;
use crate::error::{ClientError, Result};
use crate::record::Record;
use crate::transport::TaskTransport;

/// Delay after a `PENDING` response before the next call.
pub const DEFAULT_PENDING_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on fetch calls for a single fetch.
pub const DEFAULT_MAX_POLLS: u64 = 100_000;

/// Which fetch call drives the loop. Fixed for the lifetime of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One `ItemA` per call.
    Single,
    /// Up to `size` envelopes of any negotiated kind per call.
    Batch {
        /// Requested envelopes per call.
        size: i32,
    },
}

/// Timing and bounds of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep after each `PENDING` response.
    pub pending_delay: Duration,
    /// Maximum number of fetch calls before giving up.
    pub max_polls: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            pending_delay: DEFAULT_PENDING_DELAY,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// What a single response tells the loop to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Records to append; poll again immediately.
    Items(Vec<Record>),
    /// Nothing yet; poll again after the pending delay.
    Pending,
    /// Stream exhausted.
    Ended,
}

/// Counters collected while polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Fetch calls issued.
    pub polls: u64,
    /// `PENDING` responses received.
    pub pending: u64,
    /// Records accumulated.
    pub records: usize,
}

/// Records returned by a completed fetch, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Every record received, in server order.
    pub records: Vec<Record>,
    /// Loop counters.
    pub stats: FetchStats,
}

/// The statuses a fetch loop acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Item,
    Pending,
    Ended,
}

fn status_of(raw: i32) -> Result<Status> {
    match proto::FetchStatus::try_from(raw) {
        Ok(proto::FetchStatus::Item) => Ok(Status::Item),
        Ok(proto::FetchStatus::Pending) => Ok(Status::Pending),
        Ok(proto::FetchStatus::Ended) => Ok(Status::Ended),
        Ok(proto::FetchStatus::Unspecified) | Err(_) => {
            Err(ClientError::UnexpectedResponseStatus(raw))
        }
    }
}

/// Interpret a single-record fetch response.
pub fn interpret_single(response: proto::FetchResult) -> Result<PollStep> {
    match status_of(response.status)? {
        Status::Item => {
            let item = response.item.ok_or(ClientError::MissingItem)?;
            Ok(PollStep::Items(vec![item.into()]))
        }
        Status::Pending => Ok(PollStep::Pending),
        Status::Ended => Ok(PollStep::Ended),
    }
}

/// Interpret a batch fetch response, decoding every envelope in order.
pub fn interpret_batch(response: proto::BatchFetchResult) -> Result<PollStep> {
    match status_of(response.status)? {
        Status::Item => Ok(PollStep::Items(decode_batch(response.items)?)),
        Status::Pending => Ok(PollStep::Pending),
        Status::Ended => Ok(PollStep::Ended),
    }
}

/// Drives fetch calls until the server reports `ENDED`.
#[derive(Debug, Clone, Default)]
pub struct PollFetcher {
    config: PollConfig,
}

impl PollFetcher {
    /// Create a fetcher with the given loop configuration.
    #[must_use]
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// The loop configuration.
    #[must_use]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Fetch every record the server yields, in order.
    ///
    /// Any unexpected status, malformed envelope or transport failure aborts
    /// the fetch; nothing is retried except `PENDING`.
    pub async fn fetch_all<T>(&self, transport: &mut T, mode: FetchMode) -> Result<FetchOutcome>
    where
        T: TaskTransport + ?Sized,
    {
        let mut buffer: Vec<Record> = Vec::new();
        let mut stats = FetchStats::default();

        loop {
            if stats.polls >= self.config.max_polls {
                tracing::warn!(polls = stats.polls, "fetch did not end within poll limit");
                return Err(ClientError::PollLimitExceeded { polls: stats.polls });
            }
            stats.polls += 1;

            tracing::debug!(fetched = buffer.len(), ?mode, "fetching next");
            let step = match mode {
                FetchMode::Single => interpret_single(transport.fetch().await?),
                FetchMode::Batch { size } => interpret_batch(transport.fetch_batch(size).await?),
            }
            .map_err(|e| {
                tracing::warn!(error = %e, poll = stats.polls, "fetch aborted");
                e
            })?;

            match step {
                PollStep::Items(records) => {
                    tracing::debug!(count = records.len(), "received ITEM response");
                    buffer.extend(records);
                }
                PollStep::Pending => {
                    stats.pending += 1;
                    tracing::debug!(
                        delay_ms = self.config.pending_delay.as_millis() as u64,
                        "received PENDING response, sleeping"
                    );
                    tokio::time::sleep(self.config.pending_delay).await;
                }
                PollStep::Ended => {
                    stats.records = buffer.len();
                    tracing::info!(
                        records = stats.records,
                        polls = stats.polls,
                        pending = stats.pending,
                        "received ENDED response, fetching finished"
                    );
                    return Ok(FetchOutcome {
                        records: buffer,
                        stats,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCall, MockTransport};
    use crate::record::{ItemC, RecordKind};
    use tokio::time::Instant;
    use tracing_test::traced_test;

    fn item_a(x: &str) -> proto::ItemA {
        proto::ItemA {
            field_x: x.to_string(),
            field_y: vec![1],
            field_z: None,
        }
    }

    fn field_x(record: &Record) -> String {
        match record {
            Record::A(a) => a.field_x.clone(),
            Record::B(b) => b.field_x.to_string(),
            Record::C(c) => c.field_x.to_string(),
        }
    }

    #[test]
    fn test_interpret_single_statuses() {
        assert_eq!(
            interpret_single(proto::FetchResult::pending()).unwrap(),
            PollStep::Pending
        );
        assert_eq!(
            interpret_single(proto::FetchResult::ended()).unwrap(),
            PollStep::Ended
        );
        assert!(matches!(
            interpret_single(proto::FetchResult::ready(item_a("x"))).unwrap(),
            PollStep::Items(records) if records.len() == 1
        ));
    }

    #[test]
    fn test_interpret_rejects_unknown_status() {
        let unspecified = proto::FetchResult {
            status: 0,
            item: None,
        };
        assert!(matches!(
            interpret_single(unspecified),
            Err(ClientError::UnexpectedResponseStatus(0))
        ));

        let unknown = proto::BatchFetchResult {
            status: 42,
            items: vec![],
        };
        assert!(matches!(
            interpret_batch(unknown),
            Err(ClientError::UnexpectedResponseStatus(42))
        ));

        assert!(matches!(
            interpret_batch(proto::BatchFetchResult::default()),
            Err(ClientError::UnexpectedResponseStatus(0))
        ));
    }

    #[test]
    fn test_item_without_payload_is_error() {
        let response = proto::FetchResult {
            status: proto::FetchStatus::Item as i32,
            item: None,
        };
        assert!(matches!(
            interpret_single(response),
            Err(ClientError::MissingItem)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_items_then_ended() {
        let mut transport = MockTransport::new().with_fetches([
            proto::FetchResult::pending(),
            proto::FetchResult::ready(item_a("A")),
            proto::FetchResult::ready(item_a("B")),
            proto::FetchResult::ended(),
        ]);
        let handle = transport.handle();

        let started = Instant::now();
        let outcome = PollFetcher::default()
            .fetch_all(&mut transport, FetchMode::Single)
            .await
            .unwrap();

        let names: Vec<_> = outcome.records.iter().map(field_x).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(
            outcome.stats,
            FetchStats {
                polls: 4,
                pending: 1,
                records: 2
            }
        );
        // Exactly one pending delay; item responses are followed immediately.
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_PENDING_DELAY);
        assert!(elapsed < DEFAULT_PENDING_DELAY * 2);
        assert_eq!(handle.count(|c| matches!(c, MockCall::Fetch)), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_pending_delay() {
        let mut transport = MockTransport::new().with_fetches([
            proto::FetchResult::pending(),
            proto::FetchResult::pending(),
            proto::FetchResult::ended(),
        ]);
        let fetcher = PollFetcher::new(PollConfig {
            pending_delay: Duration::from_millis(250),
            ..PollConfig::default()
        });

        let started = Instant::now();
        let outcome = fetcher
            .fetch_all(&mut transport, FetchMode::Single)
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_mode_flattens_in_order() {
        let mut transport = MockTransport::new()
            .with_batch(proto::BatchFetchResult::ready(vec![
                item_a("1").into(),
                proto::ItemC { field_x: true }.into(),
            ]))
            .with_batch(proto::BatchFetchResult::pending())
            .with_batch(proto::BatchFetchResult::ready(vec![
                proto::ItemB {
                    field_x: 3,
                    ..Default::default()
                }
                .into(),
            ]))
            .with_batch(proto::BatchFetchResult::ended());
        let handle = transport.handle();

        let outcome = PollFetcher::default()
            .fetch_all(&mut transport, FetchMode::Batch { size: 2 })
            .await
            .unwrap();

        let kinds: Vec<_> = outcome.records.iter().map(Record::kind).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::ItemA, RecordKind::ItemC, RecordKind::ItemB]
        );
        assert_eq!(outcome.records[1], Record::C(ItemC { field_x: true }));
        assert!(handle
            .calls()
            .iter()
            .all(|c| *c == MockCall::FetchBatch { count: 2 }));
    }

    #[tokio::test]
    async fn test_malformed_envelope_aborts_fetch() {
        let both = proto::ItemEnvelope {
            item_a: Some(item_a("a")),
            item_b: Some(proto::ItemB::default()),
            item_c: None,
        };
        let mut transport = MockTransport::new()
            .with_batch(proto::BatchFetchResult::ready(vec![item_a("ok").into(), both]))
            .with_batch(proto::BatchFetchResult::ready(vec![item_a("later").into()]));
        let handle = transport.handle();

        let err = PollFetcher::default()
            .fetch_all(&mut transport, FetchMode::Batch { size: 5 })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::MalformedEnvelope {
                index: 1,
                populated: 2
            }
        ));
        // No further calls after the abort.
        assert_eq!(handle.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_status_is_not_retried() {
        let mut transport = MockTransport::new().with_fetches([
            proto::FetchResult::ready(item_a("A")),
            proto::FetchResult {
                status: 9,
                item: None,
            },
            proto::FetchResult::ready(item_a("B")),
        ]);
        let handle = transport.handle();

        let err = PollFetcher::default()
            .fetch_all(&mut transport, FetchMode::Single)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::UnexpectedResponseStatus(9)));
        assert_eq!(handle.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_limit_bounds_the_loop() {
        let mut transport =
            MockTransport::new().with_fetches(std::iter::repeat(proto::FetchResult::pending()).take(10));
        let fetcher = PollFetcher::new(PollConfig {
            max_polls: 3,
            ..PollConfig::default()
        });

        let err = fetcher
            .fetch_all(&mut transport, FetchMode::Single)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::PollLimitExceeded { polls: 3 }));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_pending_and_end() {
        let mut transport = MockTransport::new()
            .with_fetches([proto::FetchResult::pending(), proto::FetchResult::ended()]);

        PollFetcher::default()
            .fetch_all(&mut transport, FetchMode::Single)
            .await
            .unwrap();

        assert!(logs_contain("received PENDING response"));
        assert!(logs_contain("fetching finished"));
    }
}
