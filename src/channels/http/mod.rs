//! HTTP channel.
//!
//! # Data Flow
//! ```text
//! Source: POST /events?namespace=acme
//!     → source.rs (namespace, hints from headers + query)
//!     → EventIntake::ingest → 204 / 400
//!
//! Sink: rendered content
//!     → sink.rs (POST to `url` arg with namespace header)
//!     → non-2xx = delivery error
//! ```

mod sink;
mod source;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::channels::{Channel, ChannelError};

pub use sink::{parse_custom_headers, HEADERS_ARG, SELF_SIGNED_CERT_ARG, URL_ARG};
pub use source::{hints_from_request, router, DEFAULT_BIND_ADDRESS, INGEST_PATH, NAMESPACE_HEADER};

/// Outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives events over HTTP and delivers them to HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    /// Accepts self-signed certificates.
    insecure_client: reqwest::Client,
    /// Ingest URL, known once the source is bound.
    endpoint: Arc<OnceLock<String>>,
}

impl HttpChannel {
    pub fn new() -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let insecure_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            insecure_client,
            endpoint: Arc::new(OnceLock::new()),
        })
    }

    /// Ingest URL of the running source, if it has been bound.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.get().map(String::as_str)
    }
}

impl Channel for HttpChannel {
    fn name(&self) -> &'static str {
        "http"
    }

    fn description(&self) -> &'static str {
        "The HTTP channel allows events to be sent and received via HTTP requests."
    }
}
