//! # Bridge Boundary Types
//!
//! Shared vocabulary between the durable core stores and the host
//! application layer.
//!
//! ## Overview
//!
//! This crate defines the contract the host branches on, independent of any
//! particular backing store:
//!
//! - [`ErrorKind`](error::ErrorKind) - stable error taxonomy with fixed
//!   numeric codes, surfaced uniformly by the cache and the event queue
//! - [`AnalyticsEvent`](constants::AnalyticsEvent) /
//!   [`PropertyKey`](constants::PropertyKey) - frozen constant tables for
//!   analytics payloads
//! - [`Clock`](time::Clock) - injectable time source for deterministic
//!   TTL and retry testing
//!
//! Hosts translate [`ErrorKind`] values into their own messaging; nothing in
//! this crate produces user-facing text.

pub mod constants;
pub mod error;
pub mod time;

pub use constants::{AnalyticsEvent, ErrorCategory, PropertyKey};
pub use error::{Classify, ErrorKind};
pub use time::{Clock, ManualClock, SystemClock};
