//! HTTP sink: POSTs rendered content to a URL.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};

use crate::channels::http::HttpChannel;
use crate::channels::{resolve_args, Arg, Args, ChannelError, Info, SinkChannel};
use crate::event::Event;
use crate::rules::parse_bool;

pub const URL_ARG: &str = "url";
pub const HEADERS_ARG: &str = "headers";
pub const SELF_SIGNED_CERT_ARG: &str = "self_signed_cert";

const SINK_USER_AGENT: &str = "switchyard/http";
const NAMESPACE: HeaderName = HeaderName::from_static("switchyard-namespace");

/// Parse `Header:value,Header:value`. Entries without a colon are skipped.
pub fn parse_custom_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn invalid(arg: &str, message: impl Into<String>) -> ChannelError {
    ChannelError::InvalidArg {
        arg: arg.to_string(),
        message: message.into(),
    }
}

fn request_headers(args: &Args, namespace: &str) -> Result<HeaderMap, ChannelError> {
    let mut headers = HeaderMap::new();

    if let Some(raw) = args.get(HEADERS_ARG) {
        for (name, value) in parse_custom_headers(raw) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(HEADERS_ARG, format!("bad header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| invalid(HEADERS_ARG, format!("bad value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }
    }

    // Fixed headers win over custom ones
    let namespace = HeaderValue::from_str(namespace)
        .map_err(|e| invalid("namespace", e.to_string()))?;
    headers.insert(NAMESPACE, namespace);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(SINK_USER_AGENT));

    Ok(headers)
}

#[async_trait]
impl SinkChannel for HttpChannel {
    fn sink_args(&self) -> Vec<Arg> {
        vec![
            Arg {
                name: URL_ARG,
                description: "The URL to publish events to.",
                default: None,
                required: true,
            },
            Arg {
                name: HEADERS_ARG,
                description: "Custom headers to send, as 'header:value,header:value'.",
                default: Some(""),
                required: false,
            },
            Arg {
                name: SELF_SIGNED_CERT_ARG,
                description: "Set to true if the URL uses a self-signed certificate.",
                default: Some("false"),
                required: false,
            },
        ]
    }

    fn validate_sink_args(&self, args: &Args) -> Result<(), ChannelError> {
        let raw = args
            .get(URL_ARG)
            .ok_or_else(|| ChannelError::MissingArg(URL_ARG.into()))?;
        let url = url::Url::parse(raw).map_err(|e| invalid(URL_ARG, e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid(URL_ARG, "URL must be fully qualified"));
        }

        if let Some(flag) = args.get(SELF_SIGNED_CERT_ARG) {
            parse_bool(flag).map_err(|e| invalid(SELF_SIGNED_CERT_ARG, e.to_string()))?;
        }
        Ok(())
    }

    fn sink_info(&self, _args: &Args) -> Vec<Info> {
        Vec::new()
    }

    async fn start_sink(&self, _settings: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn drain(&self, args: &Args, event: &Event, content: &str) -> Result<(), ChannelError> {
        let args = resolve_args(&self.sink_args(), args)?;
        self.validate_sink_args(&args)?;

        let url = args
            .get(URL_ARG)
            .ok_or_else(|| ChannelError::MissingArg(URL_ARG.into()))?;
        let self_signed = args
            .get(SELF_SIGNED_CERT_ARG)
            .map(|flag| parse_bool(flag).unwrap_or(false))
            .unwrap_or(false);
        let client = if self_signed {
            &self.insecure_client
        } else {
            &self.client
        };

        let response = client
            .post(url.as_str())
            .headers(request_headers(&args, &event.namespace)?)
            .body(content.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Delivery {
                channel: "http",
                message: format!("POST to {} failed with status {}. Response: {}", url, status, body),
            });
        }

        tracing::debug!(event_id = %event.id, url = %url, status = %status, "HTTP delivery complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::event_for;
    use axum::{extract::State, http::StatusCode, routing::post, Router};
    use serde_json::json;
    use tokio::sync::mpsc;

    type Captured = (axum::http::HeaderMap, String);

    async fn capture_server() -> (String, mpsc::UnboundedReceiver<Captured>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route(
                "/hook",
                post(|State(tx): State<mpsc::UnboundedSender<Captured>>, headers: axum::http::HeaderMap, body: String| async move {
                    let _ = tx.send((headers, body));
                    StatusCode::OK
                }),
            )
            .route("/fail", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), rx)
    }

    fn args(pairs: &[(&str, &str)]) -> Args {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_drain_posts_content() {
        let (base, mut rx) = capture_server().await;
        let channel = HttpChannel::new().unwrap();
        let event = event_for("acme", "GitHub", "push", json!({}));

        let url = format!("{}/hook", base);
        let args = args(&[(URL_ARG, url.as_str()), (HEADERS_ARG, "X-Token: abc, X-Trace:1")]);
        channel.drain(&args, &event, "{\"hello\":1}").await.unwrap();

        let (headers, body) = rx.recv().await.unwrap();
        assert_eq!(body, "{\"hello\":1}");
        assert_eq!(headers["switchyard-namespace"], "acme");
        assert_eq!(headers["user-agent"], SINK_USER_AGENT);
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-token"], "abc");
        assert_eq!(headers["x-trace"], "1");
    }

    #[tokio::test]
    async fn test_drain_non_success_status() {
        let (base, _rx) = capture_server().await;
        let channel = HttpChannel::new().unwrap();
        let event = event_for("acme", "GitHub", "push", json!({}));

        let url = format!("{}/fail", base);
        let err = channel
            .drain(&args(&[(URL_ARG, url.as_str())]), &event, "x")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"), "{}", message);
        assert!(message.contains("boom"), "{}", message);
    }

    #[test]
    fn test_validate_sink_args() {
        let channel = HttpChannel::new().unwrap();
        assert!(channel.validate_sink_args(&args(&[(URL_ARG, "https://example.com/hook")])).is_ok());
        assert!(channel.validate_sink_args(&args(&[(URL_ARG, "/relative")])).is_err());
        assert!(channel.validate_sink_args(&args(&[(URL_ARG, "mailto:ops@example.com")])).is_err());
        assert!(channel
            .validate_sink_args(&args(&[(URL_ARG, "https://example.com"), (SELF_SIGNED_CERT_ARG, "maybe")]))
            .is_err());
        assert!(matches!(channel.validate_sink_args(&Args::new()), Err(ChannelError::MissingArg(_))));
    }

    #[test]
    fn test_parse_custom_headers() {
        let parsed = parse_custom_headers("X-A: 1,broken, X-B:http://x ,:nameless");
        assert_eq!(
            parsed,
            vec![
                ("X-A".to_string(), "1".to_string()),
                ("X-B".to_string(), "http://x".to_string()),
            ]
        );
    }
}
