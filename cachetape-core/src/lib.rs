//! Engine crate behind the `cachetape` façade.
//!
//! Three layers, composed bottom-up:
//!
//! - [`Block`] — a fixed-capacity, aligned, append-at-tail/drop-at-head
//!   buffer that never relocates a live element.
//! - [`BlockChain`] — an expanding, circularly-reused list of `Block`s.
//! - [`Cursor`] (backed by a private `CacheInner`) — a pull-on-demand
//!   materializer over a producer, shared by however many cursors a
//!   caller has `save`d, each with its own read offset.
//!
//! This crate has no opinion on what "the façade" looks like; `cachetape`
//! re-exports these types and adds the two constructor entry points.

pub mod block;
pub mod cache;
pub mod chain;
pub mod error;
pub mod stats;

pub use block::Block;
pub use cache::{CompactionPolicy, Cursor};
pub use chain::BlockChain;
pub use error::Violation;
pub use stats::Stats;
