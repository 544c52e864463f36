//! Message plane for the HyperHive realtime feed.
//!
//! The backend pushes loosely-shaped JSON over a single WebSocket: frames may
//! be text or binary, may contain one object, an array, or several objects
//! concatenated without a delimiter, and field names vary in capitalization
//! between event categories. This crate turns that stream into typed events:
//!
//! - [`codec`] extracts JSON values from raw transport frames,
//! - [`ui`] classifies values into the UI-facing event categories
//!   (error, notification, VM progress),
//! - [`feed_event`] resolves the numeric event kinds consumed by the
//!   lower-level feed hook.
//!
//! Everything here is synchronous and infallible by contract: malformed input
//! degrades to fewer extracted events, never to an error or panic.

pub mod codec;
mod fields;
pub mod feed_event;
pub mod ui;
