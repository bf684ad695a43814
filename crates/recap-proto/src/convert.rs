//! Constructors for common response shapes.
//!
//! Servers and scripted test transports build the same few messages over and
//! over; these keep the status/payload pairing consistent.

use crate::v1::{
    log_in_response, BatchFetchResult, FetchResult, FetchStatus, InvalidKey, ItemA, ItemB, ItemC,
    ItemEnvelope, LogInAccepted, LogInResponse,
};

impl FetchResult {
    /// `ITEM` response carrying one record.
    #[must_use]
    pub fn ready(item: ItemA) -> Self {
        Self {
            status: FetchStatus::Item as i32,
            item: Some(item),
        }
    }

    /// `PENDING` response, no payload.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: FetchStatus::Pending as i32,
            item: None,
        }
    }

    /// `ENDED` response, no payload.
    #[must_use]
    pub fn ended() -> Self {
        Self {
            status: FetchStatus::Ended as i32,
            item: None,
        }
    }
}

impl BatchFetchResult {
    /// `ITEM` response carrying a batch of envelopes.
    #[must_use]
    pub fn ready(items: Vec<ItemEnvelope>) -> Self {
        Self {
            status: FetchStatus::Item as i32,
            items,
        }
    }

    /// `PENDING` response, no payload.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: FetchStatus::Pending as i32,
            items: Vec::new(),
        }
    }

    /// `ENDED` response, no payload.
    #[must_use]
    pub fn ended() -> Self {
        Self {
            status: FetchStatus::Ended as i32,
            items: Vec::new(),
        }
    }
}

impl From<ItemA> for ItemEnvelope {
    fn from(item: ItemA) -> Self {
        Self {
            item_a: Some(item),
            ..Default::default()
        }
    }
}

impl From<ItemB> for ItemEnvelope {
    fn from(item: ItemB) -> Self {
        Self {
            item_b: Some(item),
            ..Default::default()
        }
    }
}

impl From<ItemC> for ItemEnvelope {
    fn from(item: ItemC) -> Self {
        Self {
            item_c: Some(item),
            ..Default::default()
        }
    }
}

impl LogInResponse {
    /// Successful login.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            outcome: Some(log_in_response::Outcome::Accepted(LogInAccepted {})),
        }
    }

    /// Wrong key; `expected_key` is the one the server wants.
    #[must_use]
    pub fn invalid_key(invalid_key: i32, expected_key: i32) -> Self {
        Self {
            outcome: Some(log_in_response::Outcome::InvalidKey(InvalidKey {
                invalid_key,
                expected_key,
            })),
        }
    }
}
