use crate::config::DEFAULT_TIMEOUT_MS;
use crate::model::{RequestOutcome, RequestTiming};
use crate::payload::{build_payload, correlation_id};
use crate::session::WebhookSession;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Issues one request against the target and records exactly one outcome.
/// A single attempt per call; failures are returned as data.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    target: Arc<str>,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: Arc::from(target.into()),
            timeout,
        }
    }

    pub fn with_default_timeout(target: impl Into<String>) -> Self {
        Self::new(target, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn execute(&self, session: &dyn WebhookSession, request_id: u32) -> RequestOutcome {
        let correlation_id = correlation_id();
        let payload = build_payload(&correlation_id);

        let start_time = Utc::now();
        let started = Instant::now();

        let result = session.post(&self.target, &payload, self.timeout).await;

        let elapsed = started.elapsed();
        let end_time = Utc::now();

        match &result {
            Ok(exchange) => debug!(
                request_id,
                status = exchange.status,
                elapsed_ms = elapsed.as_millis() as u64,
                "request completed"
            ),
            Err(e) => debug!(request_id, error = %e, "request failed"),
        }

        RequestOutcome::new(
            request_id,
            correlation_id,
            RequestTiming {
                start_time,
                end_time,
                elapsed,
            },
            result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HttpSessionFactory, MockSessionFactory, SessionFactory};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_execute_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(300)))
            .mount(&server)
            .await;

        let executor = RequestExecutor::with_default_timeout(format!("{}/webhook/chat", server.uri()));
        let session = HttpSessionFactory::new().open().unwrap();
        let outcome = executor.execute(session.as_ref(), 3).await;

        assert_eq!(outcome.request_id, 3);
        assert_eq!(outcome.correlation_id.len(), 32);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error.is_none());
        assert!(outcome.succeeded);
        assert_eq!(outcome.response_preview.as_deref().map(str::len), Some(200));
        assert!(outcome.end_time >= outcome.start_time);
        assert!(outcome.duration >= 0.0);
    }

    #[tokio::test]
    async fn test_execute_not_found_is_failed_without_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not registered"))
            .mount(&server)
            .await;

        let executor = RequestExecutor::with_default_timeout(server.uri());
        let session = HttpSessionFactory::new().open().unwrap();
        let outcome = executor.execute(session.as_ref(), 1).await;

        assert_eq!(outcome.status_code, Some(404));
        assert!(outcome.error.is_none());
        assert!(!outcome.succeeded);
        assert_eq!(outcome.response_preview.as_deref(), Some("not registered"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let executor = RequestExecutor::new(server.uri(), Duration::from_millis(100));
        let session = HttpSessionFactory::new().open().unwrap();
        let outcome = executor.execute(session.as_ref(), 1).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.error.as_deref(), Some("Timeout after 100 ms"));
        assert!(outcome.duration >= 0.1);
        assert!(outcome.duration < 5.0);
    }

    #[tokio::test]
    async fn test_execute_stalled_body_keeps_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
            // Hold the connection open without finishing the body.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let executor = RequestExecutor::new(format!("http://{addr}/hook"), Duration::from_millis(300));
        let session = HttpSessionFactory::new().open().unwrap();
        let outcome = executor.execute(session.as_ref(), 1).await;

        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error.is_none());
        assert!(outcome.succeeded);
        assert!(outcome.response_preview.is_none());
        assert!(outcome.duration < 2.0);
    }

    #[tokio::test]
    async fn test_execute_transport_error() {
        let factory = MockSessionFactory::failing(Duration::ZERO, "connection refused");
        let session = factory.open().unwrap();
        let executor = RequestExecutor::with_default_timeout("http://127.0.0.1:9/hook");

        let outcome = executor.execute(session.as_ref(), 2).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
        assert!(outcome.response_preview.is_none());
    }

    #[tokio::test]
    async fn test_each_request_gets_fresh_correlation_id() {
        let factory = MockSessionFactory::accepting(Duration::ZERO);
        let counters = factory.counters();
        let session = factory.open().unwrap();
        let executor = RequestExecutor::with_default_timeout("mock://hook");

        let first = executor.execute(session.as_ref(), 1).await;
        let second = executor.execute(session.as_ref(), 2).await;

        assert_ne!(first.correlation_id, second.correlation_id);
        assert_eq!(
            counters.correlation_ids(),
            vec![first.correlation_id, second.correlation_id]
        );
    }
}
