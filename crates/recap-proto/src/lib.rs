//! Protocol buffer definitions for the record search protocol.
//!
//! This crate contains:
//! - Generated protobuf types and tonic clients from `proto/recap.proto`
//! - Small constructors for the response shapes used by clients and tests
//!
//! # Architecture
//!
//! The proto types are kept separate from the client's record types so the
//! fetch and aggregation logic never depends on the wire layout directly.

#![allow(missing_docs)] // Generated code doesn't have docs

pub mod convert;

/// Generated protocol buffer types for `recap.v1`.
pub mod v1 {
    tonic::include_proto!("recap.v1");
}

// Re-export commonly used types at crate root
pub use v1::*;
