//! Client SDK bridging Server-Sent Events streams to a dispatch callback.
//!
//! The crate is organized by concern:
//! - `stream`: SSE client, subscription handle, and cancellation types.
//! - `retry`: reconnect backoff policy applied to the stream transport.

/// Reconnect backoff policy for the stream transport.
pub mod retry;
/// SSE client, subscription lifecycle, and cancellation handles.
pub mod stream;
