use crate::error::{DispatchError, SendError};
use crate::payload::WebhookMessage;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// A completed HTTP exchange. `body` is `None` when reading it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub status: u16,
    pub body: Option<String>,
}

pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Exchange, SendError>> + Send + 'a>>;

/// One client session, shared by every request of a single batch.
///
/// `limit` bounds the exchange. Only a response that never arrives within it
/// is a [`SendError::Timeout`]; a body still streaming when the budget runs
/// out leaves `body` empty.
pub trait WebhookSession: Send + Sync {
    fn post<'a>(
        &'a self,
        url: &'a str,
        payload: &'a [WebhookMessage],
        limit: Duration,
    ) -> SendFuture<'a>;
}

/// Opens a fresh session per batch so no connections outlive it.
pub trait SessionFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self) -> Result<Arc<dyn WebhookSession>, DispatchError>;
}

/// Flattens an error and its sources into one line.
pub fn describe_error(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/// reqwest-backed sessions; each batch gets its own `Client` and pool.
#[derive(Debug, Clone, Default)]
pub struct HttpSessionFactory;

impl HttpSessionFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for HttpSessionFactory {
    fn name(&self) -> &'static str {
        "http"
    }

    fn open(&self) -> Result<Arc<dyn WebhookSession>, DispatchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("webhook-burst/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DispatchError::Session(describe_error(&e)))?;

        Ok(Arc::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: reqwest::Client,
}

impl WebhookSession for HttpSession {
    fn post<'a>(
        &'a self,
        url: &'a str,
        payload: &'a [WebhookMessage],
        limit: Duration,
    ) -> SendFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            let response = match timeout(limit, self.client.post(url).json(payload).send()).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(SendError::Transport(describe_error(&e))),
                Err(_) => return Err(SendError::Timeout(limit)),
            };

            let status = response.status().as_u16();
            // An unreadable or stalled body still counts as a completed exchange.
            let remaining = limit.saturating_sub(started.elapsed());
            let body = match timeout(remaining, response.text()).await {
                Ok(Ok(text)) => Some(text),
                _ => None,
            };
            Ok(Exchange { status, body })
        })
    }
}

/// Canned reply of a [`MockSessionFactory`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Status { status: u16, body: String },
    Fail(String),
    Panic,
}

/// Shared bookkeeping across every session a mock factory opened.
#[derive(Debug, Default)]
pub struct MockCounters {
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub requests: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    correlation_ids: Mutex<Vec<String>>,
}

impl MockCounters {
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn correlation_ids(&self) -> Vec<String> {
        self.correlation_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

/// Mock sessions for testing and offline dry runs (fixed delay and reply).
pub struct MockSessionFactory {
    delay: Duration,
    reply: MockReply,
    open_limit: Option<usize>,
    counters: Arc<MockCounters>,
}

impl MockSessionFactory {
    pub fn new(delay: Duration, reply: MockReply) -> Self {
        Self {
            delay,
            reply,
            open_limit: None,
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Always answers 200 after `delay`.
    pub fn accepting(delay: Duration) -> Self {
        Self::new(
            delay,
            MockReply::Status {
                status: 200,
                body: r#"{"ok":true}"#.to_string(),
            },
        )
    }

    pub fn failing(delay: Duration, error: impl Into<String>) -> Self {
        Self::new(delay, MockReply::Fail(error.into()))
    }

    /// Makes every `open` call fail.
    pub fn fail_on_open(self) -> Self {
        self.fail_after_sessions(0)
    }

    /// Lets `sessions` opens succeed, then fails every later one.
    pub fn fail_after_sessions(mut self, sessions: usize) -> Self {
        self.open_limit = Some(sessions);
        self
    }

    pub fn counters(&self) -> Arc<MockCounters> {
        self.counters.clone()
    }
}

impl SessionFactory for MockSessionFactory {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self) -> Result<Arc<dyn WebhookSession>, DispatchError> {
        if self
            .open_limit
            .is_some_and(|limit| self.counters.sessions_opened() >= limit)
        {
            return Err(DispatchError::Session("mock session refused".to_string()));
        }
        self.counters.sessions_opened.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MockSession {
            delay: self.delay,
            reply: self.reply.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct MockSession {
    delay: Duration,
    reply: MockReply,
    counters: Arc<MockCounters>,
}

impl WebhookSession for MockSession {
    fn post<'a>(
        &'a self,
        _url: &'a str,
        payload: &'a [WebhookMessage],
        limit: Duration,
    ) -> SendFuture<'a> {
        Box::pin(async move {
            let counters = &self.counters;
            counters.requests.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ids) = counters.correlation_ids.lock() {
                ids.extend(payload.iter().map(|m| m.session_id.clone()));
            }

            let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let waited = timeout(limit, sleep(self.delay)).await;
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            if waited.is_err() {
                return Err(SendError::Timeout(limit));
            }

            match &self.reply {
                MockReply::Status { status, body } => Ok(Exchange {
                    status: *status,
                    body: Some(body.clone()),
                }),
                MockReply::Fail(error) => Err(SendError::Transport(error.clone())),
                MockReply::Panic => panic!("mock session asked to panic"),
            }
        })
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.counters.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::build_payload;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_http_session_posts_payload() {
        let server = MockServer::start().await;
        let payload = build_payload("0123456789abcdef0123456789abcdef");

        Mock::given(method("POST"))
            .and(path("/webhook/abc"))
            .and(header("content-type", "application/json"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
            .expect(1)
            .mount(&server)
            .await;

        let session = HttpSessionFactory::new().open().unwrap();
        let url = format!("{}/webhook/abc", server.uri());
        let exchange = session.post(&url, &payload, LIMIT).await.unwrap();

        assert_eq!(exchange.status, 202);
        assert_eq!(exchange.body.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn test_http_session_connection_refused() {
        // Nothing listens on a port once its listener is dropped.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let session = HttpSessionFactory::new().open().unwrap();
        let err = session
            .post(&format!("http://127.0.0.1:{port}/hook"), &build_payload("id"), LIMIT)
            .await
            .unwrap_err();

        let SendError::Transport(message) = &err else {
            panic!("expected a transport error, got {err:?}");
        };
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn test_mock_session_times_out() {
        let factory = MockSessionFactory::accepting(Duration::from_secs(5));
        let session = factory.open().unwrap();

        let err = session
            .post("mock://", &build_payload("a"), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert_eq!(err, SendError::Timeout(Duration::from_millis(20)));
        assert_eq!(factory.counters().in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mock_session_lifecycle() {
        let factory = MockSessionFactory::accepting(Duration::from_millis(1));
        let counters = factory.counters();

        {
            let session = factory.open().unwrap();
            let exchange = session.post("mock://", &build_payload("a"), LIMIT).await.unwrap();
            assert_eq!(exchange.status, 200);
            assert_eq!(counters.sessions_opened(), 1);
            assert_eq!(counters.sessions_closed(), 0);
        }

        assert_eq!(counters.sessions_closed(), 1);
        assert_eq!(counters.requests(), 1);
        assert_eq!(counters.correlation_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_describe_error_includes_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] std::io::Error);

        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(describe_error(&err), "outer: connection refused");
    }
}
