//! HTTP source: accepts events posted to `/events`.
//!
//! # Responsibilities
//! - Reject anything but POST
//! - Resolve the namespace from `?namespace=` or the namespace header
//! - Derive hints from request headers and query parameters
//! - Report pre-dispatch failures as 400 with the error text
//!
//! # Design Decisions
//! - Hints use canonical header casing (`X-Github-Event:push`) so configured
//!   hints do not depend on how the client spelled the header
//! - Transport headers carry no classification signal and are skipped

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::channels::http::HttpChannel;
use crate::channels::{Arg, Args, Channel, ChannelError, Info, SourceChannel, SourceStart};
use crate::event::EventIntake;
use crate::lifecycle::ShutdownSignal;

pub const INGEST_PATH: &str = "/events";
pub const NAMESPACE_HEADER: &str = "Switchyard-Namespace";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Headers that never become hints.
const IGNORED_HEADERS: &[&str] = &[
    "Content-Length",
    "Host",
    "Accept-Encoding",
    "Encoding",
    "Accept-Language",
    "Accept",
    "Connection",
    "Origin",
    "X-Requested-With",
];

#[derive(Clone)]
struct SourceState {
    intake: Arc<EventIntake>,
}

/// Build the ingest router.
pub fn router(intake: Arc<EventIntake>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(INGEST_PATH, any(handle_event))
        .with_state(SourceState { intake })
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

async fn handle_event(
    State(state): State<SourceState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return (StatusCode::BAD_REQUEST, "Only POST is supported.").into_response();
    }

    let query = query_pairs(&uri);
    let Some(namespace) = namespace(&query, &headers) else {
        let message = format!(
            "Unable to determine event namespace. Ensure '?namespace=' query param or '{}' header is set.",
            NAMESPACE_HEADER
        );
        return (StatusCode::BAD_REQUEST, message).into_response();
    };

    let hints = hints_from_request(&headers, &query);
    match state.intake.ingest("http", &namespace, body.to_vec(), &hints) {
        Ok(accepted) => {
            tracing::debug!(event_id = %accepted.event_id, routes = accepted.routes, "HTTP event accepted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

fn namespace(query: &[(String, String)], headers: &HeaderMap) -> Option<String> {
    if let Some((_, ns)) = query.iter().find(|(k, _)| k == "namespace") {
        return Some(ns.clone());
    }
    headers
        .get(NAMESPACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `Header:value` for each non-ignored header, then `key=value` for each
/// query parameter. Only the first value of a repeated name is used.
pub fn hints_from_request(headers: &HeaderMap, query: &[(String, String)]) -> Vec<String> {
    let mut hints = Vec::new();

    for name in headers.keys() {
        let canonical = canonical_header_name(name.as_str());
        if IGNORED_HEADERS.contains(&canonical.as_str()) {
            continue;
        }
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            hints.push(format!("{}:{}", canonical, value));
        }
    }

    let mut seen = Vec::new();
    for (key, value) in query {
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        hints.push(format!("{}={}", key, value));
    }

    hints
}

/// `x-github-event` → `X-Github-Event`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn bind_address(settings: &Args) -> Result<String, ChannelError> {
    if let Some(addr) = settings.get("bind_address").filter(|a| !a.is_empty()) {
        return Ok(addr.clone());
    }
    match settings.get("port").filter(|p| !p.is_empty()) {
        Some(port) => {
            let port: u16 = port.parse().map_err(|_| ChannelError::InvalidArg {
                arg: "port".into(),
                message: format!("'{}' is not a valid port", port),
            })?;
            Ok(format!("0.0.0.0:{}", port))
        }
        None => Ok(DEFAULT_BIND_ADDRESS.to_string()),
    }
}

fn max_body_bytes(settings: &Args) -> Result<usize, ChannelError> {
    match settings.get("max_body_bytes") {
        Some(raw) => raw.parse().map_err(|_| ChannelError::InvalidArg {
            arg: "max_body_bytes".into(),
            message: format!("'{}' is not a byte count", raw),
        }),
        None => Ok(DEFAULT_MAX_BODY_BYTES),
    }
}

#[async_trait]
impl SourceChannel for HttpChannel {
    fn source_args(&self) -> Vec<Arg> {
        Vec::new()
    }

    fn validate_source_args(&self, _args: &Args) -> Result<(), ChannelError> {
        Ok(())
    }

    fn source_info(&self, _args: &Args) -> Vec<Info> {
        self.endpoint()
            .map(|endpoint| Info {
                name: "endpoint".into(),
                description: format!(
                    "POST events here with '?namespace=' or the '{}' header.",
                    NAMESPACE_HEADER
                ),
                value: endpoint.to_string(),
            })
            .into_iter()
            .collect()
    }

    async fn start_source(
        &self,
        start: SourceStart,
        intake: Arc<EventIntake>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ChannelError> {
        let addr = bind_address(&start.settings)?;
        let max_body = max_body_bytes(&start.settings)?;

        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let _ = self.endpoint.set(format!("http://{}{}", local_addr, INGEST_PATH));

        tracing::info!(channel = self.name(), address = %local_addr, "HTTP source listening");

        axum::serve(listener, router(intake, max_body))
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!(channel = self.name(), "HTTP source stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::recording_intake;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const PUSH: &str = r#"{"ref": "refs/heads/main", "repository": {"name": "switchyard"}}"#;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_post_accepted() {
        let (intake, mut rx) = recording_intake("recorder");
        let app = router(intake, DEFAULT_MAX_BODY_BYTES);

        let request = Request::builder()
            .method("POST")
            .uri("/events?namespace=acme")
            .header("user-agent", "GitHub-Hookshot/458f8")
            .header("x-github-event", "push")
            .body(Body::from(PUSH))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let drained = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(drained.content, "switchyard pushed to refs/heads/main");
    }

    #[tokio::test]
    async fn test_namespace_from_header() {
        let (intake, mut rx) = recording_intake("recorder");
        let app = router(intake, DEFAULT_MAX_BODY_BYTES);

        let request = Request::builder()
            .method("POST")
            .uri("/events")
            .header(NAMESPACE_HEADER, "acme")
            .header("User-Agent", "GitHub-Hookshot/1")
            .header("X-GitHub-Event", "push")
            .body(Body::from(PUSH))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_rejected() {
        let (intake, _rx) = recording_intake("recorder");
        let app = router(intake, DEFAULT_MAX_BODY_BYTES);

        let request = Request::builder().uri("/events?namespace=acme").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Only POST is supported.");
    }

    #[tokio::test]
    async fn test_missing_namespace() {
        let (intake, _rx) = recording_intake("recorder");
        let app = router(intake, DEFAULT_MAX_BODY_BYTES);

        let request = Request::builder()
            .method("POST")
            .uri("/events")
            .body(Body::from(PUSH))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains(NAMESPACE_HEADER));
    }

    #[tokio::test]
    async fn test_unidentified_event() {
        let (intake, _rx) = recording_intake("recorder");
        let app = router(intake, DEFAULT_MAX_BODY_BYTES);

        let request = Request::builder()
            .method("POST")
            .uri("/events?namespace=acme")
            .header("User-Agent", "curl/8.0")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("could not identify event source"));
    }

    #[test]
    fn test_hints_skip_transport_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "example.com".parse().unwrap());
        headers.insert("accept", "*/*".parse().unwrap());
        headers.insert("x-github-event", "push".parse().unwrap());

        let query = vec![
            ("namespace".to_string(), "acme".to_string()),
            ("token".to_string(), "a".to_string()),
            ("token".to_string(), "b".to_string()),
        ];
        let hints = hints_from_request(&headers, &query);
        assert_eq!(hints, vec!["X-Github-Event:push", "namespace=acme", "token=a"]);
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-github-event"), "X-Github-Event");
        assert_eq!(canonical_header_name("user-agent"), "User-Agent");
        assert_eq!(canonical_header_name("etag"), "Etag");
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(bind_address(&Args::new()).unwrap(), DEFAULT_BIND_ADDRESS);
        let port = Args::from([("port".to_string(), "9000".to_string())]);
        assert_eq!(bind_address(&port).unwrap(), "0.0.0.0:9000");
        let bad = Args::from([("port".to_string(), "http".to_string())]);
        assert!(matches!(bind_address(&bad), Err(ChannelError::InvalidArg { .. })));
    }
}
