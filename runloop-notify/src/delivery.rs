// runloop-notify/src/delivery.rs
// ============================================================================
// Module: Webhook Delivery
// Description: The HTTP client and per-endpoint send path: sign, gate through
//              the circuit breaker, retry with classification, bound the
//              response read.
// Dependencies: crate::{circuit, error, event, retry, signing}, reqwest, std::io
// ============================================================================

//! ## Overview
//! The client is built exactly the way the corpus's HTTP evidence provider
//! builds its blocking client: explicit timeout, explicit user agent,
//! redirects disabled, scheme/host policy enforced before the request is
//! issued, response bodies read through a size-bounded reader.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use reqwest::Url;

use crate::circuit::CircuitBreaker;
use crate::error::NotifierError;
use crate::event::Endpoint;
use crate::retry::classify_status;
use crate::retry::retry;
use crate::retry::Classification;
use crate::retry::Outcome;
use crate::retry::RetryConfig;
use crate::signing::sign;

/// Maximum number of response bytes read back for an error message.
const MAX_ERROR_BODY_BYTES: usize = 1024;

/// Configuration for the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Retry/backoff policy applied per delivery attempt.
    pub retry: RetryConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "agent-webhook/1.0".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Builds and holds the blocking HTTP client used for all endpoint delivery.
pub struct DeliveryClient {
    client: Client,
    config: DeliveryConfig,
}

impl DeliveryClient {
    /// Builds a delivery client from `config`.
    ///
    /// # Errors
    /// Returns [`NotifierError::ClientBuildFailed`] if the client cannot be constructed.
    pub fn new(config: DeliveryConfig) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|error| NotifierError::ClientBuildFailed(error.to_string()))?;
        Ok(Self { client, config })
    }

    /// Delivers `body` to `endpoint`, gated by `breaker`. Applies signing
    /// headers if `endpoint.secret` is set, retries retryable failures per
    /// the configured policy, and records the outcome on `breaker`.
    ///
    /// # Errors
    /// Returns [`NotifierError::CircuitOpen`], [`NotifierError::InvalidUrl`],
    /// [`NotifierError::EndpointRejected`] or [`NotifierError::EndpointUnavailable`].
    pub fn deliver(&self, endpoint: &Endpoint, body: &[u8], now_unix_secs: i64, breaker: &CircuitBreaker) -> Result<(), NotifierError> {
        if !breaker.allow_call() {
            return Err(NotifierError::CircuitOpen {
                endpoint_id: endpoint.id.clone(),
            });
        }
        let url = validate_url(endpoint)?;

        let outcome = retry(self.config.retry, |_attempt| self.attempt(endpoint, &url, body, now_unix_secs));
        match &outcome {
            Ok(()) => breaker.record_success(),
            Err(NotifierError::EndpointRejected { .. }) => {}
            Err(_) => breaker.record_failure(),
        }
        outcome
    }

    /// Sends one delivery attempt and classifies its result.
    fn attempt(&self, endpoint: &Endpoint, url: &Url, body: &[u8], now_unix_secs: i64) -> Outcome<(), NotifierError> {
        let mut request = self.client.post(url.clone()).header("Content-Type", "application/json").body(body.to_vec());
        if let Some(secret) = &endpoint.secret {
            let headers = sign(secret, body, now_unix_secs);
            request = request
                .header("X-Webhook-Signature", headers.signature)
                .header("X-Webhook-Timestamp", headers.timestamp)
                .header("X-Webhook-Signature-V2", headers.signature_v2);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(error) => {
                return Outcome::Retryable(NotifierError::EndpointUnavailable {
                    endpoint_id: endpoint.id.clone(),
                    reason: error.to_string(),
                })
            }
        };

        let status = response.status().as_u16();
        match classify_status(status) {
            Classification::Success => Outcome::Success(()),
            Classification::NonRetryable => Outcome::NonRetryable(NotifierError::EndpointRejected {
                endpoint_id: endpoint.id.clone(),
                status,
            }),
            Classification::Retryable => {
                let reason = read_error_body(response).unwrap_or_else(|| format!("http {status}"));
                Outcome::Retryable(NotifierError::EndpointUnavailable {
                    endpoint_id: endpoint.id.clone(),
                    reason,
                })
            }
        }
    }
}

/// Validates `endpoint.url`'s scheme and parses it, enforcing `https` unless
/// `allow_http` is set.
fn validate_url(endpoint: &Endpoint) -> Result<Url, NotifierError> {
    let url = Url::parse(&endpoint.url).map_err(|error| NotifierError::InvalidUrl {
        endpoint_id: endpoint.id.clone(),
        reason: error.to_string(),
    })?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if endpoint.allow_http => Ok(url),
        other => Err(NotifierError::InvalidUrl {
            endpoint_id: endpoint.id.clone(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Reads up to [`MAX_ERROR_BODY_BYTES`] of `response`'s body for inclusion in
/// an error message, returning `None` if the body cannot be read.
fn read_error_body(response: Response) -> Option<String> {
    let mut limited = response.take(u64::try_from(MAX_ERROR_BODY_BYTES).unwrap_or(u64::MAX));
    let mut buf = Vec::new();
    limited.read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::validate_url;
    use crate::error::NotifierError;
    use crate::event::Endpoint;
    use runloop_core::model::identifiers::EndpointId;

    fn endpoint(url: &str, allow_http: bool) -> Endpoint {
        Endpoint {
            id: EndpointId::new("e1"),
            url: url.to_string(),
            secret: None,
            event_filter: None,
            enabled: true,
            allow_http,
        }
    }

    #[test]
    fn https_url_is_accepted() {
        assert!(validate_url(&endpoint("https://example.com/hook", false)).is_ok());
    }

    #[test]
    fn plain_http_is_rejected_without_allow_http() {
        let result = validate_url(&endpoint("http://example.com/hook", false));
        assert!(matches!(result, Err(NotifierError::InvalidUrl { .. })));
    }

    #[test]
    fn plain_http_is_accepted_with_allow_http() {
        assert!(validate_url(&endpoint("http://example.com/hook", true)).is_ok());
    }
}
