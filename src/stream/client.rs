//! SSE connection setup and the background transport worker.
//!
//! [`SseClient`] builds the HTTP side of a stream request and spawns one
//! worker task per subscription. The worker owns the transport exclusively
//! and forwards each event's payload to the dispatch callback in delivery
//! order. Reconnection on transient failure is handled by the transport
//! itself, so a broken connection keeps the subscription active.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{CannotCloneRequestError, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::retry::ReconnectPolicy;
use crate::stream::subscription::{DispatchGate, Subscription};

type DispatchFn = Box<dyn Fn(String) + Send>;
type ErrorHook = Box<dyn Fn(SubscriptionError) + Send>;

/// Default client parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SseClientDefaults;

impl SseClientDefaults {
    /// Connect timeout for each (re)connection attempt.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Options controlling HTTP setup and reconnect behavior.
#[derive(Clone, Debug)]
pub struct SseClientOptions {
    /// Connect timeout applied to each connection attempt.
    pub connect_timeout: Duration,
    /// Backoff schedule for the transport's automatic reconnection.
    pub reconnect: ReconnectPolicy,
}

impl Default for SseClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: SseClientDefaults::CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::streaming(),
        }
    }
}

/// Entry point for opening stream subscriptions.
#[derive(Clone)]
pub struct SseClient {
    http: Client,
    api_key: Option<SecretString>,
    reconnect: ReconnectPolicy,
}

impl SseClient {
    /// Creates a client with default options.
    pub fn new() -> Result<Self, SubscriptionError> {
        Self::with_options(SseClientOptions::default())
    }

    /// Creates a client with explicit options.
    pub fn with_options(options: SseClientOptions) -> Result<Self, SubscriptionError> {
        let http = Client::builder()
            .no_proxy()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(SubscriptionError::Http)?;

        Ok(Self {
            http,
            api_key: None,
            reconnect: options.reconnect,
        })
    }

    /// Sets an `x-api-key` header sent with the stream request.
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Overrides the transport reconnect backoff schedule.
    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Opens a subscription to `endpoint`, forwarding every event payload to
    /// `dispatch` in delivery order.
    ///
    /// Returns immediately with the subscription handle; the connection is
    /// established asynchronously by a background worker, so the first
    /// payload is never awaited here. Must be called within a Tokio runtime.
    ///
    /// Transport failures (unreachable endpoint, mid-stream disconnection)
    /// are never surfaced here; the transport reconnects on its own and the
    /// subscription stays active until [`Subscription::close`] is called.
    pub fn subscribe<D>(&self, endpoint: impl Into<String>, dispatch: D) -> Subscription
    where
        D: Fn(String) + Send + 'static,
    {
        self.spawn_subscription(endpoint.into(), Box::new(dispatch), None)
    }

    /// Opens a subscription with an error-observation hook.
    ///
    /// `on_error` receives every transport-level failure the worker sees.
    /// Observing an error does not close the subscription; it exists so
    /// callers can notice a stream that has gone quiet.
    pub fn subscribe_with_errors<D, E>(
        &self,
        endpoint: impl Into<String>,
        dispatch: D,
        on_error: E,
    ) -> Subscription
    where
        D: Fn(String) + Send + 'static,
        E: Fn(SubscriptionError) + Send + 'static,
    {
        self.spawn_subscription(endpoint.into(), Box::new(dispatch), Some(Box::new(on_error)))
    }

    fn spawn_subscription(
        &self,
        endpoint: String,
        dispatch: DispatchFn,
        on_error: Option<ErrorHook>,
    ) -> Subscription {
        let endpoint = normalize_endpoint(&endpoint);
        let mut request = self.http.get(&endpoint);
        if let Some(api_key) = self.api_key.as_ref() {
            request = request.header("x-api-key", api_key.expose_secret().as_str());
        }

        let gate = Arc::new(DispatchGate::new());
        let cancel = CancellationToken::new();
        let policy = self.reconnect.clone();

        debug!(event = "subscription_opened", endpoint = %endpoint);
        tokio::spawn(subscription_worker(
            request,
            policy,
            Arc::clone(&gate),
            dispatch,
            on_error,
            cancel.clone(),
        ));

        Subscription::new(gate, cancel)
    }
}

/// Opens a subscription to `endpoint` with default client options.
///
/// Convenience wrapper for `SseClient::new()?.subscribe(endpoint, dispatch)`.
/// The `Err` case covers only local HTTP client construction; transport
/// conditions are asynchronous and never returned here.
pub fn open<D>(endpoint: impl Into<String>, dispatch: D) -> Result<Subscription, SubscriptionError>
where
    D: Fn(String) + Send + 'static,
{
    Ok(SseClient::new()?.subscribe(endpoint, dispatch))
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().to_string()
}

async fn subscription_worker(
    request: reqwest::RequestBuilder,
    policy: ReconnectPolicy,
    gate: Arc<DispatchGate>,
    dispatch: DispatchFn,
    on_error: Option<ErrorHook>,
    cancel: CancellationToken,
) {
    let mut source = match EventSource::new(request) {
        Ok(source) => source,
        Err(err) => {
            warn!(event = "sse_request_rejected", error = %err);
            if let Some(hook) = on_error.as_ref() {
                hook(SubscriptionError::Request(err));
            }
            return;
        }
    };
    source.set_retry_policy(Box::new(policy.transport_policy()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                source.close();
                break;
            }
            event = source.next() => match event {
                Some(Ok(Event::Open)) => {
                    debug!(event = "sse_connected");
                }
                Some(Ok(Event::Message(message))) => {
                    // Gate check and dispatch happen here, on the one worker
                    // task, so payloads are forwarded strictly in delivery
                    // order and never concurrently.
                    if !gate.dispatch(dispatch.as_ref(), message.data) {
                        source.close();
                        break;
                    }
                }
                Some(Err(err)) => {
                    // The transport retries per its backoff schedule; the
                    // subscription stays active through the outage.
                    debug!(event = "sse_transport_error", error = %err);
                    if let Some(hook) = on_error.as_ref() {
                        hook(SubscriptionError::Transport(err));
                    }
                }
                None => {
                    warn!(event = "sse_stream_ended");
                    break;
                }
            }
        }
    }
}

/// Errors produced by stream setup and transport handling.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// SSE transport error, including reconnect-cycle failures.
    #[error("sse transport error: {0}")]
    Transport(#[from] reqwest_eventsource::Error),

    /// HTTP client construction error.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stream request could not be turned into a reconnectable request.
    #[error("stream request rejected: {0}")]
    Request(#[from] CannotCloneRequestError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::{normalize_endpoint, SseClient, SseClientOptions};
    use crate::retry::ReconnectPolicy;

    #[test]
    fn endpoint_whitespace_is_trimmed() {
        assert_eq!(
            normalize_endpoint("https://stream.example/events   \n"),
            "https://stream.example/events"
        );
        assert_eq!(
            normalize_endpoint("  http://localhost:8080/events"),
            "http://localhost:8080/events"
        );
    }

    #[test]
    fn client_builds_with_default_options() {
        assert!(SseClient::new().is_ok());
    }

    #[test]
    fn client_accepts_api_key_and_policy_overrides() {
        let policy = ReconnectPolicy {
            initial_backoff: Duration::from_millis(10),
            factor: 2.0,
            max_backoff: Duration::from_millis(50),
            max_retries: Some(4),
        };
        let client = SseClient::with_options(SseClientOptions {
            connect_timeout: Duration::from_secs(1),
            reconnect: ReconnectPolicy::streaming(),
        })
        .expect("build client")
        .with_api_key(SecretString::new("test-api-key".to_string()))
        .with_reconnect_policy(policy.clone());

        assert!(client.api_key.is_some());
        assert_eq!(client.reconnect.max_retries, policy.max_retries);
        assert_eq!(client.reconnect.initial_backoff, policy.initial_backoff);
    }
}
