//! Call lifecycle tests against a scripted transport
//!
//! The tokio clock is paused, so backoff waits and timeouts advance virtual
//! time and the gaps between attempts can be measured exactly.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_http::{
    ApiClient, ApiError, ApiResponse, ClientConfig, InMemorySession, ReachabilitySignal,
    RequestAttempt, RequestDescriptor, SessionStore, Transport,
};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Step {
    Respond(u16),
    Refuse,
    Hang,
    Unbuildable,
    CutOff(u16),
}

#[derive(Debug, Clone)]
struct SeenAttempt {
    at: Instant,
    retry_count: u32,
    headers: HeaderMap,
}

/// Plays back a fixed sequence of outcomes; the last step repeats forever
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<SeenAttempt>>,
}

impl ScriptedTransport {
    fn new(steps: &[Step]) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            *steps.front().expect("script must not be empty")
        }
    }

    fn attempts(&self) -> Vec<SeenAttempt> {
        self.seen.lock().clone()
    }

    /// Time between the start of consecutive attempts
    fn gaps(&self) -> Vec<Duration> {
        self.attempts()
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, attempt: &RequestAttempt) -> Result<ApiResponse, ApiError> {
        self.seen.lock().push(SeenAttempt {
            at: Instant::now(),
            retry_count: attempt.retry_count(),
            headers: attempt.descriptor().headers().clone(),
        });

        match self.next_step() {
            Step::Respond(status) => ApiResponse::from_status(status),
            Step::Refuse => Err(ApiError::network("connection refused")),
            Step::Hang => std::future::pending().await,
            Step::Unbuildable => Err(ApiError::InvalidRequest("relative URL".to_string())),
            Step::CutOff(status) => Err(ApiError::IncompleteBody {
                status: StatusCode::from_u16(status).unwrap(),
                source: "connection closed mid-body".into(),
            }),
        }
    }
}

struct Harness {
    client: ApiClient,
    transport: Arc<ScriptedTransport>,
    session: Arc<InMemorySession>,
    reachability: Arc<ReachabilitySignal>,
    expired_calls: Arc<AtomicUsize>,
}

fn harness(steps: &[Step]) -> Harness {
    let transport = ScriptedTransport::new(steps);
    let session = Arc::new(InMemorySession::new());
    session.set_session(
        "secret-token".to_string(),
        Some(serde_json::json!({"username": "admin"})),
    );
    let reachability = Arc::new(ReachabilitySignal::new(true));
    let expired_calls = Arc::new(AtomicUsize::new(0));

    let counter = expired_calls.clone();
    let client = ApiClient::builder(ClientConfig::default())
        .transport(transport.clone())
        .session(session.clone())
        .reachability(reachability.clone())
        .on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    Harness {
        client,
        transport,
        session,
        reachability,
        expired_calls,
    }
}

fn record_transitions(harness: &Harness) -> (Arc<Mutex<Vec<bool>>>, tether_http::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = harness
        .client
        .on_connection_change(move |reachable: bool| sink.lock().push(reachable));
    (seen, subscription)
}

fn assert_gaps(actual: &[Duration], expected_ms: &[u64]) {
    assert_eq!(actual.len(), expected_ms.len(), "gaps: {:?}", actual);
    for (gap, expected) in actual.iter().zip(expected_ms) {
        let expected = Duration::from_millis(*expected);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(5),
            "gap {:?}, expected {:?}",
            gap,
            expected
        );
    }
}

#[tokio::test(start_paused = true)]
async fn client_errors_fail_on_first_attempt() {
    for status in [400u16, 403, 404, 409, 422] {
        let h = harness(&[Step::Respond(status)]);
        let started = Instant::now();

        let error = h.client.get("/servers").await.unwrap_err();

        assert_eq!(error.status().map(|s| s.as_u16()), Some(status));
        assert_eq!(h.transport.attempts().len(), 1, "status {}", status);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(h.expired_calls.load(Ordering::SeqCst), 0);
        assert!(h.session.is_authenticated());
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_a_conflict_rejects_immediately() {
    let h = harness(&[Step::Respond(409)]);
    let (transitions, _subscription) = record_transitions(&h);
    let started = Instant::now();

    let error = h
        .client
        .post_json("/scans", &serde_json::json!({"target": "10.0.0.0/24"}))
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::Status { .. }));
    assert_eq!(error.status().unwrap().as_u16(), 409);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(h.transport.gaps().is_empty());
    assert!(transitions.lock().is_empty());
    assert!(h.client.is_online());
}

#[tokio::test(start_paused = true)]
async fn scenario_b_recovers_after_two_server_errors() {
    let h = harness(&[Step::Respond(503), Step::Respond(503), Step::Respond(200)]);

    let response = h.client.get("/servers").await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_gaps(&h.transport.gaps(), &[1000, 2000]);
    assert!(h.reachability.is_reachable());

    let retry_counts: Vec<u32> = h.transport.attempts().iter().map(|a| a.retry_count).collect();
    assert_eq!(retry_counts, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_unauthorized_ends_session() {
    let h = harness(&[Step::Respond(401)]);

    let error = h.client.get("/auth/me").await.unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(h.transport.attempts().len(), 1);
    assert_eq!(h.expired_calls.load(Ordering::SeqCst), 1);
    assert!(h.session.token().is_none());
    assert!(h.session.identity().is_none());
}

#[tokio::test(start_paused = true)]
async fn scenario_d_network_failure_exhausts_retries() {
    let h = harness(&[Step::Refuse]);
    let (transitions, _subscription) = record_transitions(&h);

    let error = h.client.get("/topology").await.unwrap_err();

    assert!(matches!(error, ApiError::Network(_)));
    assert_eq!(h.transport.attempts().len(), 4);
    assert_gaps(&h.transport.gaps(), &[1000, 2000, 4000]);
    assert!(!h.client.is_online());
    assert_eq!(*transitions.lock(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn scenario_e_concurrent_failures_do_not_renotify() {
    let h = harness(&[Step::Refuse]);
    h.reachability.set_reachable(false);
    let (transitions, _subscription) = record_transitions(&h);

    let (first, second) = tokio::join!(h.client.get("/servers"), h.client.get("/scans"));

    assert!(first.is_err());
    assert!(second.is_err());
    assert_eq!(h.transport.attempts().len(), 8);
    assert!(transitions.lock().is_empty());
    assert!(!h.client.is_online());
}

#[tokio::test(start_paused = true)]
async fn server_errors_exhaust_with_last_error() {
    let h = harness(&[Step::Respond(500), Step::Respond(502), Step::Respond(503)]);
    let (transitions, _subscription) = record_transitions(&h);

    let error = h.client.delete("/servers/7").await.unwrap_err();

    assert_eq!(error.status().unwrap().as_u16(), 503);
    assert_eq!(h.transport.attempts().len(), 4);
    assert_gaps(&h.transport.gaps(), &[1000, 2000, 4000]);
    // Server errors carry a response, so the backend counts as reachable
    assert!(h.client.is_online());
    assert!(transitions.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reachability_recovers_when_a_response_arrives() {
    let h = harness(&[Step::Refuse, Step::Refuse, Step::Respond(200)]);
    let (transitions, _subscription) = record_transitions(&h);

    h.client.get("/servers").await.unwrap();

    assert_eq!(*transitions.lock(), vec![false, true]);
    assert!(h.client.is_online());
}

#[tokio::test(start_paused = true)]
async fn hanging_attempt_times_out_and_retries() {
    let h = harness(&[Step::Hang, Step::Respond(200)]);
    let started = Instant::now();

    h.client.get("/reports/latest").await.unwrap();

    assert_eq!(h.transport.attempts().len(), 2);
    assert_gaps(&h.transport.gaps(), &[30_000 + 1000]);
    assert!(started.elapsed() >= Duration::from_millis(31_000));
}

#[tokio::test(start_paused = true)]
async fn per_call_timeout_override() {
    let h = harness(&[Step::Hang]);
    let descriptor = RequestDescriptor::get("/ai/analyze").with_timeout(Duration::from_secs(5));

    let error = h.client.execute(descriptor).await.unwrap_err();

    assert!(error.is_timeout());
    assert_eq!(h.transport.attempts().len(), 4);
    assert_gaps(&h.transport.gaps(), &[5_000 + 1000, 5_000 + 2000, 5_000 + 4000]);
    assert!(!h.client.is_online());
}

#[tokio::test(start_paused = true)]
async fn every_attempt_resends_identical_descriptor() {
    let h = harness(&[Step::Respond(500), Step::Respond(500), Step::Respond(204)]);

    h.client
        .put_json("/schedules/3", &serde_json::json!({"cron": "0 3 * * *"}))
        .await
        .unwrap();

    let attempts = h.transport.attempts();
    assert_eq!(attempts.len(), 3);
    for attempt in &attempts {
        assert_eq!(attempt.headers[AUTHORIZATION], "Bearer secret-token");
        assert_eq!(attempt.headers, attempts[0].headers);
    }
}

#[tokio::test(start_paused = true)]
async fn unauthenticated_requests_are_still_sent() {
    let h = harness(&[Step::Respond(200)]);
    h.session.clear();

    h.client.get("/health").await.unwrap();

    let attempts = h.transport.attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].headers.contains_key(AUTHORIZATION));
}

#[tokio::test(start_paused = true)]
async fn local_failures_are_not_retried() {
    let h = harness(&[Step::Unbuildable]);
    let (transitions, _subscription) = record_transitions(&h);

    let error = h.client.get("servers").await.unwrap_err();

    assert!(matches!(error, ApiError::InvalidRequest(_)));
    assert_eq!(h.transport.attempts().len(), 1);
    assert!(transitions.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unlisted_client_error_is_terminal() {
    let h = harness(&[Step::Respond(429)]);

    let error = h.client.get("/servers").await.unwrap_err();

    assert_eq!(error.status().unwrap().as_u16(), 429);
    assert_eq!(h.transport.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disposed_listener_is_not_called() {
    let h = harness(&[Step::Refuse]);
    let (transitions, subscription) = record_transitions(&h);
    subscription.unsubscribe();
    subscription.unsubscribe();

    let _ = h.client.get("/servers").await;

    assert!(transitions.lock().is_empty());
    assert!(!h.client.is_online());
}

#[tokio::test(start_paused = true)]
async fn unauthorized_after_exhausting_retries_still_ends_session() {
    let h = harness(&[
        Step::Respond(503),
        Step::Respond(503),
        Step::Respond(503),
        Step::Respond(401),
    ]);

    let error = h.client.get("/servers").await.unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(h.transport.attempts().len(), 4);
    assert_gaps(&h.transport.gaps(), &[1000, 2000, 4000]);
    assert_eq!(h.expired_calls.load(Ordering::SeqCst), 1);
    assert!(!h.session.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn cut_off_body_counts_as_a_response() {
    let h = harness(&[Step::CutOff(200)]);
    h.reachability.set_reachable(false);
    let (transitions, _subscription) = record_transitions(&h);

    let error = h.client.get("/servers").await.unwrap_err();

    assert!(matches!(error, ApiError::IncompleteBody { .. }));
    assert_eq!(error.status().unwrap().as_u16(), 200);
    assert_eq!(h.transport.attempts().len(), 1);
    assert_eq!(*transitions.lock(), vec![true]);
}
