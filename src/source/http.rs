//! HTTP data source for the metrics API.
//!
//! [`ApiClient`] wraps the three backend endpoints. [`HttpSource`] drives it
//! from a background task: one fetch per refresh interval plus any manual
//! refreshes. Every request carries a sequence number. A response is
//! published only if it is newer than the last one published, so a slow
//! response never overwrites a faster, later one. Requests may overlap when
//! the backend is slower than the refresh interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use super::{DataSource, MetricsPayload, NodeHistory, NodeSample};

/// Lower bound for the refresh interval.
const MIN_REFRESH: Duration = Duration::from_millis(250);

/// HTTP method used for `/get_metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    /// `GET /get_metrics`
    #[default]
    Get,
    /// `POST /get_metrics` with `{"environment": ...}`
    Post,
}

/// Errors that can occur when talking to the metrics API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The configured base URL is unusable.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a str>,
}

/// Client for the dashboard backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    method: RequestMethod,
    environment: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url`; every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let parsed =
            Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: parsed,
            method: RequestMethod::Get,
            environment: None,
        })
    }

    /// Select GET or POST for `/get_metrics`; POST sends `environment` in the body.
    pub fn with_method(mut self, method: RequestMethod, environment: Option<String>) -> Self {
        self.method = method;
        self.environment = environment;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Base URLs are validated in `new`, so segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetch the current metrics of every node.
    pub async fn get_metrics(&self) -> Result<MetricsPayload, FetchError> {
        let url = self.endpoint(&["get_metrics"]);
        let request = match self.method {
            RequestMethod::Get => self.http.get(url),
            RequestMethod::Post => self.http.post(url).json(&MetricsRequest {
                environment: self.environment.as_deref(),
            }),
        };
        read_json(request.send().await?).await
    }

    /// Fetch the recorded time series of one node.
    pub async fn node_data(&self, node_id: &str) -> Result<Vec<NodeSample>, FetchError> {
        let response = self.http.get(self.endpoint(&["node_data", node_id])).send().await?;
        read_json(response).await
    }

    /// URL of the backend's per-node chart page.
    pub fn node_chart_url(&self, node_id: &str) -> String {
        self.endpoint(&["node_chart", node_id]).to_string()
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))
}

#[derive(Debug, Default)]
struct Inbox {
    payload: Option<MetricsPayload>,
    error: Option<String>,
    history: Option<NodeHistory>,
    /// Sequence number of the newest metrics result stored.
    published: u64,
}

/// State shared between the source and its fetch tasks.
#[derive(Debug, Default)]
struct Shared {
    issued: AtomicU64,
    history_issued: AtomicU64,
    inbox: Mutex<Inbox>,
}

impl Shared {
    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_request(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn complete_metrics(&self, seq: u64, result: Result<MetricsPayload, FetchError>) {
        let mut inbox = self.inbox();
        if seq <= inbox.published {
            debug!(seq, published = inbox.published, "discarding stale metrics response");
            return;
        }
        inbox.published = seq;

        match result {
            Ok(payload) => {
                debug!(seq, nodes = payload.metrics.len(), "metrics fetched");
                inbox.payload = Some(payload);
                inbox.error = None;
            }
            Err(e) => {
                error!(seq, error = %e, "metrics fetch failed");
                inbox.error = Some(e.to_string());
            }
        }
    }

    fn next_history_request(&self) -> u64 {
        self.history_issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Only the most recent history request matters: it is for the node on screen.
    fn complete_history(&self, seq: u64, history: NodeHistory) {
        let mut inbox = self.inbox();
        if seq != self.history_issued.load(Ordering::SeqCst) {
            debug!(seq, node_id = %history.node_id, "discarding stale node history");
            return;
        }
        if let Err(ref e) = history.samples {
            warn!(node_id = %history.node_id, error = %e, "node history fetch failed");
        }
        inbox.history = Some(history);
    }
}

/// A data source that periodically fetches `/get_metrics`.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ledgerwatch::{ApiClient, HttpSource};
///
/// # tokio_test::block_on(async {
/// let client = ApiClient::new("http://localhost:5000", Duration::from_secs(10)).unwrap();
/// let source = HttpSource::spawn(client, Duration::from_secs(30));
/// # });
/// ```
#[derive(Debug)]
pub struct HttpSource {
    client: ApiClient,
    description: String,
    shared: Arc<Shared>,
    trigger: mpsc::Sender<()>,
    runtime: Handle,
    last_error: Option<String>,
}

impl HttpSource {
    /// Start fetching in the background.
    ///
    /// Must be called from within a tokio runtime. The first fetch is issued
    /// immediately; the background task stops when the source is dropped.
    pub fn spawn(client: ApiClient, refresh: Duration) -> Self {
        let runtime = Handle::current();
        let shared = Arc::new(Shared::default());
        let (trigger, mut trigger_rx) = mpsc::channel::<()>(4);
        let description = format!("api: {}", client.base_url());

        let task_client = client.clone();
        let task_shared = shared.clone();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(refresh.max(MIN_REFRESH));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    msg = trigger_rx.recv() => {
                        if msg.is_none() {
                            // Source dropped
                            break;
                        }
                        ticker.reset();
                    }
                }

                let seq = task_shared.next_request();
                let client = task_client.clone();
                let shared = task_shared.clone();
                tokio::spawn(async move {
                    let result = client.get_metrics().await;
                    shared.complete_metrics(seq, result);
                });
            }
        });

        Self {
            client,
            description,
            shared,
            trigger,
            runtime,
            last_error: None,
        }
    }

    /// The client used for requests.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

impl DataSource for HttpSource {
    fn poll(&mut self) -> Option<MetricsPayload> {
        let mut inbox = self.shared.inbox();
        let payload = inbox.payload.take();
        let error = inbox.error.take();
        drop(inbox);

        if payload.is_some() {
            self.last_error = None;
        }
        // A stored error is always newer than a stored payload
        if error.is_some() {
            self.last_error = error;
        }
        payload
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn request_refresh(&mut self) {
        // A full queue means a refresh is already pending
        let _ = self.trigger.try_send(());
    }

    fn request_node_history(&mut self, node_id: &str) -> bool {
        let seq = self.shared.next_history_request();
        let client = self.client.clone();
        let shared = self.shared.clone();
        let node_id = node_id.to_string();

        self.runtime.spawn(async move {
            let samples = client.node_data(&node_id).await.map_err(|e| e.to_string());
            shared.complete_history(seq, NodeHistory { node_id, samples });
        });
        true
    }

    fn poll_node_history(&mut self) -> Option<NodeHistory> {
        self.shared.inbox().history.take()
    }

    fn node_link(&self, node_id: &str) -> Option<String> {
        Some(self.client.node_chart_url(node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawNodeMetric;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const PAYLOAD: &str = r#"{"metrics":[{"node_id":"NODE_A","address":"::ffff:10.0.0.1","block_count":"100","cemented_count":"99","major_version":"25","minor_version":"0","patch_version":"0","pre_release_version":"0"}],"max_block_count":100,"max_cemented_count":99}"#;

    /// Serve canned responses, one per connection, and return the raw requests.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", Duration::from_secs(1)),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:ops@example.com", Duration::from_secs(1)),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_urls() {
        let api = client("http://localhost:5000");
        assert_eq!(api.node_chart_url("NODE_A"), "http://localhost:5000/node_chart/NODE_A");

        let api = client("http://example.com/dashboard/");
        assert_eq!(api.node_chart_url("x y"), "http://example.com/dashboard/node_chart/x%20y");
    }

    #[tokio::test]
    async fn test_get_metrics() {
        let (base, server) = serve(vec![(200, PAYLOAD)]).await;

        let payload = client(&base).get_metrics().await.unwrap();
        assert_eq!(payload.metrics.len(), 1);
        assert_eq!(payload.metrics[0].node_id.as_deref(), Some("NODE_A"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /get_metrics "));
    }

    #[tokio::test]
    async fn test_post_metrics_sends_environment() {
        let (base, server) = serve(vec![(200, PAYLOAD)]).await;

        let api = client(&base).with_method(RequestMethod::Post, Some("beta".to_string()));
        api.get_metrics().await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /get_metrics "));
        assert!(requests[0].contains(r#"{"environment":"beta"}"#));
    }

    #[tokio::test]
    async fn test_error_status() {
        let (base, _server) = serve(vec![(500, "{}")]).await;
        assert_eq!(client(&base).get_metrics().await, Err(FetchError::Status(500)));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let (base, _server) = serve(vec![(200, "{not json")]).await;
        assert!(matches!(client(&base).get_metrics().await, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let api = ApiClient::new(&format!("http://{}", addr), Duration::from_millis(100)).unwrap();
        assert_eq!(api.get_metrics().await, Err(FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_node_data() {
        let body = r#"[{"timestamp": 1000, "block_count": 5, "cemented_count": 4, "version": "25.0.0"}]"#;
        let (base, server) = serve(vec![(200, body)]).await;

        let samples = client(&base).node_data("NODE_A").await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].version.as_deref(), Some("25.0.0"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /node_data/NODE_A "));
    }

    #[test]
    fn test_overlapping_responses_publish_newest_seen() {
        let shared = Shared::default();
        let first = shared.next_request();
        let second = shared.next_request();
        let third = shared.next_request();

        let payload = |id: &str| MetricsPayload {
            metrics: vec![RawNodeMetric {
                node_id: Some(id.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        // Earlier requests still publish while later ones are in flight
        shared.complete_metrics(first, Ok(payload("first")));
        assert_eq!(shared.inbox().payload.take(), Some(payload("first")));

        shared.complete_metrics(third, Ok(payload("third")));
        shared.complete_metrics(second, Ok(payload("second")));
        assert_eq!(shared.inbox().payload.take(), Some(payload("third")));
    }

    #[tokio::test]
    async fn test_slow_backend_still_publishes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    // Slower than the refresh interval, so requests overlap
                    tokio::time::sleep(Duration::from_millis(600)).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        PAYLOAD.len(),
                        PAYLOAD
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        let mut source = HttpSource::spawn(client(&format!("http://{}", addr)), MIN_REFRESH);
        let mut published = 0;
        for _ in 0..80 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if source.poll().is_some() {
                published += 1;
            }
        }
        assert!(published >= 2, "only {} payloads published", published);
        assert!(source.error().is_none());
    }

    #[test]
    fn test_stale_response_discarded() {
        let shared = Shared::default();
        let first = shared.next_request();
        let second = shared.next_request();

        let newer = MetricsPayload::default();
        shared.complete_metrics(second, Ok(newer.clone()));
        shared.complete_metrics(first, Err(FetchError::Timeout));

        let inbox = shared.inbox();
        assert_eq!(inbox.payload, Some(newer));
        assert!(inbox.error.is_none());
    }

    #[test]
    fn test_stale_history_discarded() {
        let shared = Shared::default();
        let first = shared.next_history_request();
        let second = shared.next_history_request();

        shared.complete_history(
            first,
            NodeHistory {
                node_id: "old".into(),
                samples: Ok(vec![]),
            },
        );
        assert!(shared.inbox().history.is_none());

        shared.complete_history(
            second,
            NodeHistory {
                node_id: "new".into(),
                samples: Ok(vec![]),
            },
        );
        assert_eq!(shared.inbox().history.as_ref().map(|h| h.node_id.as_str()), Some("new"));
    }

    #[tokio::test]
    async fn test_http_source_polls_and_reports_errors() {
        let (base, _server) = serve(vec![(200, PAYLOAD), (503, "{}")]).await;
        let mut source = HttpSource::spawn(client(&base), Duration::from_secs(3600));
        assert_eq!(source.description(), format!("api: {}/", base));

        let mut payload = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            payload = source.poll();
            if payload.is_some() {
                break;
            }
        }
        assert_eq!(payload.unwrap().metrics.len(), 1);
        assert!(source.error().is_none());

        source.request_refresh();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(source.poll().is_none());
            if source.error().is_some() {
                break;
            }
        }
        assert_eq!(source.error(), Some("server returned status 503"));
    }
}
