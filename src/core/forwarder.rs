//! Downstream forwarding with bounded retries.
//!
//! An attempt succeeds when the downstream answers with a status below 500;
//! transport errors, per-attempt timeouts and 5xx answers are retried after
//! the configured backoff. Retrying stops as soon as a response is handed back
//! for relaying, so a body that fails mid-stream is truncated, not retried.
use std::{fmt, sync::Arc, time::Duration};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri, header};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{BackoffPolicy, ForwardingConfig},
    core::{
        GatewayError,
        headers::{copy_end_to_end, strip_hop_by_hop},
    },
    ports::http_client::{HttpClient, HttpClientError},
};

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Status(StatusCode),
    Transport(String),
}

/// Record of one attempt, kept only for the duration of a forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardAttempt {
    pub number: u32,
    pub outcome: AttemptOutcome,
}

/// How many attempts to make and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub attempt_timeout: Duration,
}

impl From<&ForwardingConfig> for RetryPolicy {
    fn from(config: &ForwardingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff.clone(),
            attempt_timeout: config.timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ForwardingConfig::default())
    }
}

/// An inbound request with its body already buffered for replay.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub target: Uri,
}

/// A response ready to relay, plus the attempts it took to get it.
pub struct Forwarded {
    pub response: Response<AxumBody>,
    pub attempts: Vec<ForwardAttempt>,
}

impl fmt::Debug for Forwarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarded")
            .field("status", &self.response.status())
            .field("attempts", &self.attempts)
            .finish()
    }
}

pub struct Forwarder {
    client: Arc<dyn HttpClient>,
    policy: RetryPolicy,
}

impl Forwarder {
    pub fn new(client: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Forward `request`, retrying retry-eligible failures.
    ///
    /// `cancel` aborts both an in-flight downstream call and a pending backoff.
    pub async fn forward(
        &self,
        request: ForwardRequest,
        cancel: &CancellationToken,
    ) -> Result<Forwarded, GatewayError> {
        let ForwardRequest {
            method,
            headers,
            body,
            target,
        } = request;

        let mut headers = copy_end_to_end(&headers);
        // the client derives Host from the target URI
        headers.remove(header::HOST);

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for number in 1..=max_attempts {
            let mut outgoing = Request::new(AxumBody::from(body.clone()));
            *outgoing.method_mut() = method.clone();
            *outgoing.uri_mut() = target.clone();
            *outgoing.headers_mut() = headers.clone();

            let send = timeout(self.policy.attempt_timeout, self.client.send_request(outgoing));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Forward to {} cancelled during attempt {}", target, number);
                    return Err(GatewayError::Cancelled);
                }
                result = send => result,
            };

            let outcome = match result {
                Ok(Ok(mut response)) if response.status().as_u16() < 500 => {
                    attempts.push(ForwardAttempt {
                        number,
                        outcome: AttemptOutcome::Status(response.status()),
                    });
                    strip_hop_by_hop(response.headers_mut());
                    return Ok(Forwarded { response, attempts });
                }
                // dropping the response releases its body before the retry
                Ok(Ok(response)) => AttemptOutcome::Status(response.status()),
                Ok(Err(e)) => AttemptOutcome::Transport(e.to_string()),
                Err(_) => AttemptOutcome::Transport(
                    HttpClientError::Timeout(self.policy.attempt_timeout).to_string(),
                ),
            };

            tracing::warn!(
                attempt = number,
                max_attempts,
                target = %target,
                outcome = ?outcome,
                "Attempt {} failed to forward request to {}",
                number,
                target
            );
            attempts.push(ForwardAttempt { number, outcome });

            if number < max_attempts {
                let delay = self.policy.backoff.delay(number);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Pending retry to {} cancelled", target);
                        return Err(GatewayError::Cancelled);
                    }
                    _ = sleep(delay) => {}
                }
            }
        }

        Err(GatewayError::DownstreamUnavailable {
            target: target.to_string(),
            attempts,
        })
    }
}
