//! HTTP request sending
//!
//! This module provides the transport seam and its reqwest implementation.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::Serialize;
use tracing::debug;

use crate::errors::{ReqchainError, Result};
use crate::status::ExitStatus;

pub const USER_AGENT_STRING: &str = concat!("reqchain/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_REDIRECTS: usize = 10;

/// Form-style URL encode a string (uses + for spaces)
pub fn form_urlencode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' ' => result.push('+'),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).as_bytes() {
                    result.push_str(&format!("%{:02X}", b));
                }
            }
        }
    }
    result
}

/// A fully resolved request ready for the wire
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Everything a chained lookup can extract from a response
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedResponse {
    pub status: u16,
    pub status_text: String,
    /// In wire order; names keep their original case
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration_ms: u64,
    pub url: String,
    pub method: String,
}

impl ExecutedResponse {
    /// First header with this name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, e.g. `Set-Cookie`
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Exit status for this response
    pub fn exit_status(&self, check_status: bool) -> ExitStatus {
        ExitStatus::from_http_status(self.status, check_status)
    }
}

/// Sends outgoing requests
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a OutgoingRequest) -> BoxFuture<'a, Result<ExecutedResponse>>;
}

/// reqwest-backed transport following redirects
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT_STRING)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .referer(false)
            .build()
            .map_err(|e| ReqchainError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, request: &OutgoingRequest) -> Result<ExecutedResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| ReqchainError::Transport {
            message: format!("invalid method '{}'", request.method),
            duration_ms: 0,
        })?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let started = Instant::now();
        let response = builder.send().await.map_err(|e| self.map_error(e, started))?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(|e| self.map_error(e, started))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(status = status.as_u16(), duration_ms, "response received");
        Ok(ExecutedResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            duration_ms,
            url,
            method: request.method.clone(),
        })
    }

    fn map_error(&self, error: reqwest::Error, started: Instant) -> ReqchainError {
        let duration_ms = started.elapsed().as_millis() as u64;
        if error.is_timeout() {
            ReqchainError::Timeout {
                seconds: self.timeout.as_secs_f64(),
                duration_ms,
            }
        } else {
            ReqchainError::Transport {
                message: error.to_string(),
                duration_ms,
            }
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a OutgoingRequest) -> BoxFuture<'a, Result<ExecutedResponse>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn outgoing(method: &str, url: String) -> OutgoingRequest {
        OutgoingRequest {
            method: method.into(),
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[test]
    fn test_form_urlencode() {
        assert_eq!(form_urlencode("a b&c=d"), "a+b%26c%3Dd");
        assert_eq!(form_urlencode("é"), "%C3%A9");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = ExecutedResponse {
            status: 200,
            status_text: "OK".into(),
            headers: vec![
                ("set-cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
            ],
            body: String::new(),
            duration_ms: 0,
            url: String::new(),
            method: "GET".into(),
        };
        assert_eq!(response.header("SET-COOKIE"), Some("a=1"));
        assert_eq!(response.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.exit_status(true), ExitStatus::Success);
    }

    #[tokio::test]
    async fn test_send_captures_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("x-trace", "1"))
            .and(body_string("user=a"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Request-Id", "abc")
                    .set_body_string(r#"{"ok":true}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let mut request = outgoing("POST", format!("{}/login", server.uri()));
        request.headers.insert("x-trace", HeaderValue::from_static("1"));
        request.body = Some("user=a".into());

        let response = transport.send(&request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.body, r#"{"ok":true}"#);
        assert_eq!(response.method, "POST");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_millis(200)).unwrap();
        let err = transport
            .send(&outgoing("GET", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReqchainError::Timeout { .. }), "{:?}", err);
        assert!(err.duration_ms().is_some());
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let err = transport
            .send(&outgoing("GET", "http://127.0.0.1:1/".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReqchainError::Transport { .. }), "{:?}", err);
    }
}
