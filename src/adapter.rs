use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::header::HeaderValue;
use reqwest::{Client as ReqwestClient, Method};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub type RestBytes = Bytes;
pub type RestFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type RestResult<T> = Result<T, RestError>;

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestTransportState {
    Idle,
    Busy,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    Rejected,
    Parse,
    Internal,
}

#[derive(Clone, Debug, Error)]
#[error("rest error {kind:?} status={status:?} retryable={retryable} {message}")]
pub struct RestError {
    pub kind: RestErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub retryable: bool,
}

impl RestError {
    pub fn new(
        kind: RestErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            retryable,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Internal, None, message, false)
    }

    pub fn kind(&self) -> RestErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Classifies a reqwest failure, falling back to `fallback` when reqwest
    /// cannot tell whether it was a connect or timeout problem.
    fn from_reqwest(fallback: RestErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RestErrorKind::Timeout
        } else if err.is_connect() {
            RestErrorKind::Connect
        } else {
            fallback
        };
        let status = err.status().map(|s| s.as_u16());
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self::new(kind, status, err.to_string(), retryable)
    }
}

impl From<sonic_rs::Error> for RestError {
    fn from(err: sonic_rs::Error) -> Self {
        Self::new(RestErrorKind::Parse, None, err.to_string(), false)
    }
}

#[derive(Clone, Debug)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, RestBytes)>,
    pub body: Option<RestBytes>,
    pub timeout: Option<Duration>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// A POST carrying an already-encoded JSON body with explicit content headers.
    pub fn post_json_body(url: impl Into<String>, body: impl Into<RestBytes>) -> Self {
        let body = body.into();
        let length = body.len().to_string();
        Self::post(url)
            .with_header(CONTENT_TYPE, APPLICATION_JSON)
            .with_header(CONTENT_LENGTH, length)
            .with_body(body)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<RestBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Header lookup is case-insensitive, like HTTP itself.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_ref())
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct RestResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
    pub elapsed: Duration,
}

impl RestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        sonic_rs::from_slice(&self.body).map_err(RestError::from)
    }
}

pub trait RestTransport: Send + Sync {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>>;
}

pub type SharedRestTransport = Arc<dyn RestTransport + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for ReqwestTransport {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut req = client.request(request.method.clone(), &request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_bytes(value.as_ref())
                    .map_err(|err| RestError::internal(err.to_string()))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req
                .send()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Receive, err))?;
            let elapsed = start.elapsed();

            Ok(RestResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
