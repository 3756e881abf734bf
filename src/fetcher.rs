use std::{io, time::Duration};

use crate::http::{Client, Headers, Response};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request payload as given on the command line or by a caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Body>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Headers::default(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Option<Body>) -> Self {
        self.body = body;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of one request attempt. Only `Success` carries a response.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Response),
    /// The server answered with a non-2xx status.
    HttpStatusError { status: u16, reason: String },
    /// DNS, connect, TLS, timeout or other socket level failure.
    TransportError(String),
    OtherError(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Success(response) => Some(response),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.response().map(Response::body)
    }

    /// Diagnostic text for a failed fetch, without the program prefix.
    pub fn message(&self) -> Option<String> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::HttpStatusError { status, reason } => {
                Some(format!("HTTP error {status}: {reason}"))
            }
            FetchOutcome::TransportError(message) | FetchOutcome::OtherError(message) => {
                Some(message.clone())
            }
        }
    }
}

#[derive(Default)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        tracing::debug!("{} {}", request.method, request.url);

        let body = request
            .body
            .as_ref()
            .map(Body::as_bytes)
            .filter(|bytes| !bytes.is_empty());
        let result = self.client.send(
            &request.method,
            &request.url,
            &request.headers,
            body,
            request.timeout,
        );

        match result {
            Ok(response) if (200..300).contains(&response.status_code()) => {
                FetchOutcome::Success(response)
            }
            Ok(response) => FetchOutcome::HttpStatusError {
                status: response.status_code(),
                reason: response.status_message().to_string(),
            },
            Err(error) => classify(&error),
        }
    }
}

fn classify(error: &anyhow::Error) -> FetchOutcome {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            tracing::debug!("transport error ({:?}): {io_error}", io_error.kind());
            let message = match io_error.kind() {
                // Socket read/write timeouts surface as WouldBlock on Unix.
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => "timed out".to_string(),
                _ => io_error.to_string(),
            };
            return FetchOutcome::TransportError(message);
        }
        if let Some(tls_error) = cause.downcast_ref::<rustls::Error>() {
            return FetchOutcome::TransportError(tls_error.to_string());
        }
        if let Some(name_error) = cause.downcast_ref::<rustls::pki_types::InvalidDnsNameError>() {
            return FetchOutcome::TransportError(name_error.to_string());
        }
    }
    tracing::debug!("unclassified fetch error: {error:?}");
    FetchOutcome::OtherError(format!("{error:#}"))
}
