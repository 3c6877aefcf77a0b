//! Remote client behavior against a scripted local HTTP stub.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bidreview::client::{CircuitState, EnvToken, ResilientClient, StaticToken};
use bidreview::error::AppError;
use bidreview::models::{
    AnalysisContext, AnalysisPreset, CircuitBreakerConfig, Classification, ClientConfig, Config,
    OrganizationConfig, RetryConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const COMPLETED: &str = r#"{
    "analysis_id": "r-1",
    "status": "completed",
    "results": {
        "categories": {"structural": 80, "legal": 90, "clarity": 70, "abnt": 60},
        "problems": [],
        "recommendations": ["Cite the governing statute"]
    }
}"#;

#[derive(Debug, Clone)]
struct Recorded {
    request_line: String,
    authorization: Option<String>,
}

/// Answers each request with the next scripted response, 500 once empty.
#[derive(Clone, Default)]
struct Stub {
    script: Arc<Mutex<VecDeque<(u16, String)>>>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

impl Stub {
    fn new(script: &[(u16, &str)]) -> Self {
        let stub = Self::default();
        stub.script
            .lock()
            .unwrap()
            .extend(script.iter().map(|(s, b)| (*s, b.to_string())));
        stub
    }

    fn requests(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }

    async fn serve(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let stub = self.clone();
                tokio::spawn(async move { stub.handle(socket).await });
            }
        });
        addr
    }

    async fn handle(&self, mut socket: TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let header = |name: &str| {
            head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        };
        let content_length: usize = header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        self.seen.lock().unwrap().push(Recorded {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            authorization: header("authorization"),
        });

        let (status, body) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((500, r#"{"error":"script exhausted"}"#.to_string()));
        let response = format!(
            "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }
}

fn config(addr: SocketAddr, failure_threshold: u32, max_retries: u32) -> Config {
    Config {
        client: ClientConfig {
            base_url: format!("http://{addr}"),
            ..ClientConfig::default()
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold,
            reset_timeout_ms: 60_000,
            ..CircuitBreakerConfig::default()
        },
        retry: RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
        ..Config::default()
    }
}

fn client(config: &Config) -> ResilientClient {
    ResilientClient::new(config, Arc::new(StaticToken::new("test-token"))).unwrap()
}

fn context() -> AnalysisContext {
    AnalysisContext::new("Edital de pregão eletrônico", Classification::parse("bidding/auction"))
}

fn organization() -> OrganizationConfig {
    OrganizationConfig::from_preset("org", "Org", AnalysisPreset::Standard)
}

#[tokio::test]
async fn transient_failures_are_retried_with_fresh_token() {
    let stub = Stub::new(&[(503, "{}"), (502, "{}"), (200, COMPLETED)]);
    let addr = stub.clone().serve().await;
    let client = client(&config(addr, 5, 3));

    let result = client.analyze(&context(), &organization()).await.unwrap();
    assert_eq!(result.weighted_score, 75.0);
    assert_eq!(result.recommendations, ["Cite the governing statute"]);

    let requests = stub.requests();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request.request_line, "POST /analyze HTTP/1.1");
        assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    }
    assert_eq!(client.analyze_breaker().state(), CircuitState::Closed);
    assert_eq!(client.analyze_breaker().failure_count(), 0);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let stub = Stub::new(&[(400, r#"{"error":"document_content is required"}"#)]);
    let addr = stub.clone().serve().await;
    let client = client(&config(addr, 5, 3));

    let err = client.analyze(&context(), &organization()).await.unwrap_err();
    match err {
        AppError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid request: document_content is required");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn open_circuit_fails_without_network() {
    let stub = Stub::new(&[(500, r#"{"error":"boom"}"#)]);
    let addr = stub.clone().serve().await;
    let client = client(&config(addr, 1, 0));

    let first = client.analyze(&context(), &organization()).await.unwrap_err();
    assert!(matches!(
        first,
        AppError::ServiceUnavailable { attempts: 1, .. }
    ));
    assert_eq!(client.analyze_breaker().state(), CircuitState::Open);

    let second = client.analyze(&context(), &organization()).await.unwrap_err();
    assert!(matches!(second, AppError::CircuitOpen { .. }));
    assert_eq!(stub.requests().len(), 1);

    // Breakers are per endpoint
    assert_eq!(client.classify_breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn classify_posts_to_its_endpoint() {
    let stub = Stub::new(&[(200, r#"{"classification":"bidding/auction","confidence":0.9}"#)]);
    let addr = stub.clone().serve().await;
    let client = client(&config(addr, 5, 0));

    let response = client
        .classify("Edital", &serde_json::json!({"source": "upload"}))
        .await
        .unwrap();
    assert_eq!(response["confidence"], 0.9);
    assert_eq!(stub.requests()[0].request_line, "POST /classify HTTP/1.1");
}

#[tokio::test]
async fn health_and_metrics_bypass_retry() {
    let stub = Stub::new(&[
        (
            200,
            r#"{"status":"healthy","version":"1.4.2","timestamp":"2026-01-05T09:30:00Z","services":{"ocr":true,"analysis":true}}"#,
        ),
        (503, "{}"),
        (200, r#"{"requests_total": 12}"#),
    ]);
    let addr = stub.clone().serve().await;
    let client = client(&config(addr, 5, 3));

    let health = client.health_check().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.version, "1.4.2");
    assert_eq!(health.services.get("ocr"), Some(&true));

    assert!(!client.is_available().await);

    let metrics = client.metrics().await.unwrap();
    assert_eq!(metrics["requests_total"], 12);

    let lines: Vec<String> = stub.requests().into_iter().map(|r| r.request_line).collect();
    assert_eq!(
        lines,
        [
            "GET /health HTTP/1.1",
            "GET /health HTTP/1.1",
            "GET /metrics HTTP/1.1"
        ]
    );
}

#[tokio::test]
async fn unreachable_service_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&config(addr, 5, 0));
    assert!(!client.is_available().await);
}

#[tokio::test]
async fn token_failures_do_not_trip_the_breaker() {
    let stub = Stub::new(&[(200, COMPLETED)]);
    let addr = stub.clone().serve().await;
    let config = config(addr, 1, 3);
    let client = ResilientClient::new(
        &config,
        Arc::new(EnvToken::new("BIDREVIEW_TOKEN_UNSET_IN_TESTS")),
    )
    .unwrap();

    let err = client.analyze(&context(), &organization()).await.unwrap_err();
    assert!(matches!(err, AppError::Token(_)));
    assert_eq!(client.analyze_breaker().state(), CircuitState::Closed);
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn overall_deadline_cuts_retries_short() {
    let stub = Stub::new(&[(503, "{}"); 6]);
    let addr = stub.clone().serve().await;
    let mut config = config(addr, 5, 5);
    config.client.analyze_timeout_secs = 1;
    // Backoff 400ms then 800ms: the third attempt would start after the deadline
    config.retry.initial_delay_ms = 400;
    config.retry.max_delay_ms = 10_000;
    let client = client(&config);

    let err = client.analyze(&context(), &organization()).await.unwrap_err();
    match err {
        AppError::Timeout { after, .. } => assert_eq!(after, Duration::from_secs(1)),
        other => panic!("unexpected error: {other}"),
    }

    let attempts = stub.requests().len();
    assert!(attempts >= 1);
    assert!(attempts < 6, "retry loop ran {attempts} attempts past the deadline");
    assert_eq!(client.analyze_breaker().failure_count(), 1);
    assert_eq!(client.analyze_breaker().state(), CircuitState::Closed);
}
