//! SSE stream modules.
//!
//! - `client`: connection setup, the background transport worker, and the
//!   `open` entry point.
//! - `subscription`: subscription handle, lifecycle state, and cancellation.

/// SSE connection setup and the `open` entry point.
pub mod client;
/// Subscription handle and cancellation types.
pub mod subscription;
