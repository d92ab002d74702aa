//! Integration tests for the retrying client
//!
//! Drives complete calls through scripted transports and both the
//! tokio-backed and the manually stepped schedulers.

#![cfg(feature = "test-utils")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rebound_core::testing::{ManualScheduler, RecordingScheduler, ScriptedTransport};
use rebound_core::{CallError, RetryStats, RetryStatsSnapshot, RetryingClient, Transport};
use rebound_domain::{ErrorKind, RawResponse, RequestDescriptor, RetryPolicy, TransportError};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(200))
        .max_delay(Duration::from_secs(30))
        .backoff_factor(2.0)
        .no_jitter()
        .build()
        .expect("valid policy")
}

fn request() -> RequestDescriptor {
    RequestDescriptor::post("https://api.example.com/v1/orders")
        .header("X-Request-Source", "integration")
        .query("dry_run", "true")
        .body(Bytes::from_static(b"{\"sku\":\"A-1\"}"))
        .build()
}

/// Transport that panics on every send
struct PanickingTransport {
    calls: AtomicU32,
}

#[async_trait]
impl Transport for PanickingTransport {
    async fn send(
        &self,
        _request: &RequestDescriptor,
        _timeout: Option<Duration>,
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("collaborator bug");
    }
}

/// Validates the canonical 503, 503, 200 scenario.
///
/// # Test Steps
/// 1. Script the transport with 503, 503 then 200
/// 2. Execute one request with a three-attempt policy
/// 3. Verify three sends and two recorded backoff delays
/// 4. Confirm the handle resolves with the 200 response
#[tokio::test(flavor = "multi_thread")]
async fn test_recovers_after_two_server_errors() {
    let transport = Arc::new(ScriptedTransport::statuses([503, 503, 200]));
    let scheduler = Arc::new(RecordingScheduler::new());
    let client = RetryingClient::new(transport.clone(), scheduler.clone(), policy(3));

    let handle = client.submit(request());
    let response = handle.clone().await.expect("call should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(transport.calls(), 3);
    assert_eq!(handle.attempts(), 3);
    assert_eq!(
        scheduler.delays(),
        vec![Duration::from_millis(200), Duration::from_millis(400)]
    );
}

/// Validates that an always-failing endpoint is tried at most `max_attempts`
/// times and the last real response is surfaced.
#[tokio::test(flavor = "multi_thread")]
async fn test_attempt_bound_surfaces_last_response() {
    let transport = Arc::new(
        ScriptedTransport::new([]).with_fallback(Ok(RawResponse::with_status(503))),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let stats = Arc::new(RetryStats::new());
    let client = RetryingClient::builder(transport.clone(), scheduler.clone())
        .policy(policy(4))
        .observer(stats.clone())
        .build();

    let response = client.execute(request()).await.expect("503 is delivered as a response");

    assert_eq!(response.status(), 503);
    assert_eq!(transport.calls(), 4);
    assert_eq!(scheduler.delays().len(), 3);
    assert_eq!(
        stats.snapshot(),
        RetryStatsSnapshot { attempts: 4, retries: 3, resolved: 1, exhausted: 1, cancelled: 0 }
    );
}

/// Validates that a non-retryable first response resolves without any timer.
#[tokio::test(flavor = "multi_thread")]
async fn test_success_short_circuits() {
    let transport = Arc::new(ScriptedTransport::statuses([200]));
    let scheduler = Arc::new(RecordingScheduler::new());
    let client = RetryingClient::new(transport.clone(), scheduler.clone(), policy(5));

    let response = client.execute(request()).await.expect("call should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(transport.calls(), 1);
    assert!(scheduler.delays().is_empty());
}

/// Validates that 4xx responses are accepted as-is.
#[tokio::test(flavor = "multi_thread")]
async fn test_client_error_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::statuses([404, 200]));
    let scheduler = Arc::new(RecordingScheduler::new());
    let client = RetryingClient::new(transport.clone(), scheduler, policy(3));

    let response = client.execute(request()).await.expect("404 is delivered as a response");

    assert_eq!(response.status(), 404);
    assert_eq!(transport.calls(), 1);
}

/// Validates error classification by kind tag.
///
/// # Test Steps
/// 1. Fail the first send with a retryable `transport-exception`
/// 2. Verify the call retries and succeeds
/// 3. Fail a second call with `auth-error`
/// 4. Verify it resolves immediately with that error and no further sends
#[tokio::test(flavor = "multi_thread")]
async fn test_error_kind_classification() {
    let retryable = Arc::new(ScriptedTransport::new([
        Err(TransportError::transport("connection reset by peer")),
        Ok(RawResponse::with_status(200)),
    ]));
    let client =
        RetryingClient::new(retryable.clone(), Arc::new(RecordingScheduler::new()), policy(3));
    let response = client.execute(request()).await.expect("retry should recover");
    assert_eq!(response.status(), 200);
    assert_eq!(retryable.calls(), 2);

    let auth = Arc::new(ScriptedTransport::new([
        Err(TransportError::new("auth-error", "token expired")),
        Ok(RawResponse::with_status(200)),
    ]));
    let scheduler = Arc::new(RecordingScheduler::new());
    let client = RetryingClient::new(auth.clone(), scheduler.clone(), policy(3));
    let err = client.execute(request()).await.expect_err("auth errors are terminal");

    assert_eq!(err.kind(), Some(&ErrorKind::new("auth-error")));
    assert_eq!(err.to_string(), "auth-error: token expired");
    assert_eq!(auth.calls(), 1);
    assert!(scheduler.delays().is_empty());
}

/// Validates that every attempt sends the very same request.
#[tokio::test(flavor = "multi_thread")]
async fn test_retries_replay_identical_request() {
    let transport = Arc::new(ScriptedTransport::statuses([500, 502, 504, 200]));
    let client =
        RetryingClient::new(transport.clone(), Arc::new(RecordingScheduler::new()), policy(4));

    let original = request();
    client.execute(original.clone()).await.expect("call should succeed");

    let sends = transport.sends();
    assert_eq!(sends.len(), 4);
    for send in &sends {
        assert_eq!(send.request, original);
        assert_eq!(send.request.body().map(|b| &b[..]), Some(&b"{\"sku\":\"A-1\"}"[..]));
    }
}

/// Validates that the policy's attempt timeout reaches the transport on
/// every attempt.
#[tokio::test(flavor = "multi_thread")]
async fn test_attempt_timeout_is_forwarded() {
    let transport = Arc::new(ScriptedTransport::statuses([503, 200]));
    let policy = RetryPolicy::builder()
        .no_jitter()
        .attempt_timeout(Duration::from_secs(2))
        .build()
        .expect("valid policy");
    let client =
        RetryingClient::new(transport.clone(), Arc::new(RecordingScheduler::new()), policy);

    let request = RequestDescriptor::get("https://api.example.com")
        .timeout(Duration::from_secs(9))
        .build();
    client.execute(request).await.expect("call should succeed");

    let timeouts: Vec<_> = transport.sends().iter().map(|s| s.timeout).collect();
    assert_eq!(timeouts, vec![Some(Duration::from_secs(2)); 2]);
}

/// Validates cancellation while waiting out a backoff delay.
///
/// # Test Steps
/// 1. Use a real-time scheduler so the backoff actually waits
/// 2. Cancel once the first retry is scheduled
/// 3. Verify the handle resolves as cancelled and no second send happens
#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_during_backoff() {
    let transport = Arc::new(ScriptedTransport::statuses([503, 200]));
    let scheduler = Arc::new(RecordingScheduler::with_time_scale(50.0));
    let client = RetryingClient::new(transport.clone(), scheduler.clone(), policy(3));

    let handle = client.submit(request());
    for _ in 0..200 {
        if !scheduler.delays().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(scheduler.delays().len(), 1);

    assert!(handle.cancel());
    assert_eq!(handle.clone().await, Err(CallError::Cancelled));
    assert_eq!(transport.calls(), 1);
    assert!(scheduler.cancellations() >= 1);
    assert!(!handle.cancel());
}

/// Validates cancellation of an attempt still in flight.
#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_in_flight_attempt() {
    let transport =
        Arc::new(ScriptedTransport::statuses([200]).with_latency(Duration::from_secs(30)));
    let scheduler = Arc::new(RecordingScheduler::new());
    let client = RetryingClient::new(transport.clone(), scheduler.clone(), policy(3));

    let handle = client.submit(request());
    while transport.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(handle.cancel());
    let err = handle.await.expect_err("cancelled");
    assert!(err.is_cancelled());
    assert_eq!(scheduler.cancellations(), 1);
}

/// Validates callback registration before and after resolution.
#[tokio::test(flavor = "multi_thread")]
async fn test_continuations_fire_once() {
    let transport = Arc::new(ScriptedTransport::statuses([502, 201]));
    let client =
        RetryingClient::new(transport, Arc::new(RecordingScheduler::new()), policy(3));

    let successes = Arc::new(AtomicU32::new(0));
    let errors = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::channel();

    let handle = client.submit(request());
    let counter = Arc::clone(&successes);
    handle.on_success(move |response| {
        counter.fetch_add(1, Ordering::SeqCst);
        tx.send(response.status()).expect("receiver alive");
    });
    let counter = Arc::clone(&errors);
    handle.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let status = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
        .await
        .expect("join")
        .expect("success continuation ran");
    assert_eq!(status, 201);

    // Registered after resolution: runs immediately
    let late = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&late);
    handle.on_complete(move |result| {
        assert!(result.is_ok());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert_eq!(late.load(Ordering::SeqCst), 1);
}

/// Validates the blocking wait used by synchronous callers.
#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_wait() {
    let transport = Arc::new(ScriptedTransport::statuses([500, 200]));
    let client =
        RetryingClient::new(transport, Arc::new(RecordingScheduler::new()), policy(3));
    let handle = client.submit(request());

    let result = tokio::task::spawn_blocking(move || handle.wait()).await.expect("join");

    assert_eq!(result.expect("call should succeed").status(), 200);
}

/// Validates that concurrent calls on one client keep independent budgets.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_calls_are_independent() {
    let transport = Arc::new(
        ScriptedTransport::new([]).with_fallback(Ok(RawResponse::with_status(503))),
    );
    let client =
        RetryingClient::new(transport.clone(), Arc::new(RecordingScheduler::new()), policy(2));

    let handles: Vec<_> = (0..16).map(|_| client.submit(request())).collect();
    for handle in handles {
        let response = handle.clone().await.expect("503 delivered");
        assert_eq!(response.status(), 503);
        assert_eq!(handle.attempts(), 2);
    }
    assert_eq!(transport.calls(), 32);
}

/// Validates stepwise execution with full control over timers.
///
/// # Test Steps
/// 1. Submit on a manual scheduler; nothing runs until stepped
/// 2. Run the first attempt and observe the scheduled 200ms delay
/// 3. Fire the timer, run the second attempt, observe 400ms
/// 4. Fire again and run the final attempt to resolution
#[test]
fn test_manual_stepping() {
    let transport = Arc::new(ScriptedTransport::statuses([503, 503, 200]));
    let scheduler = Arc::new(ManualScheduler::new());
    let client = RetryingClient::new(transport.clone(), scheduler.clone(), policy(3));

    let handle = client.submit(request());
    assert_eq!(transport.calls(), 0);

    assert_eq!(scheduler.run_tasks(), 1);
    assert_eq!(scheduler.next_timer_delay(), Some(Duration::from_millis(200)));
    assert!(!handle.is_resolved());

    assert!(scheduler.fire_next_timer());
    assert_eq!(scheduler.run_tasks(), 1);
    assert_eq!(scheduler.next_timer_delay(), Some(Duration::from_millis(400)));

    assert!(scheduler.fire_next_timer());
    assert_eq!(scheduler.run_tasks(), 1);

    assert_eq!(scheduler.pending_timers(), 0);
    assert_eq!(transport.calls(), 3);
    assert_eq!(handle.try_result().expect("resolved").expect("success").status(), 200);
}

/// Validates that a panicking transport still resolves the handle.
///
/// # Test Steps
/// 1. Submit through a transport whose `send` panics
/// 2. Await the handle under a timeout
/// 3. Verify it resolves with `CallError::Internal` after one attempt
/// 4. Confirm no retry was scheduled
#[tokio::test(flavor = "multi_thread")]
async fn test_transport_panic_resolves_handle() {
    let transport = Arc::new(PanickingTransport { calls: AtomicU32::new(0) });
    let scheduler = Arc::new(RecordingScheduler::new());
    let stats = Arc::new(RetryStats::new());
    let client = RetryingClient::builder(transport.clone(), scheduler.clone())
        .observer(stats.clone())
        .build();

    let handle = client.submit(request());
    let result = tokio::time::timeout(Duration::from_secs(3), handle.clone())
        .await
        .expect("handle should resolve after a transport panic");

    match result {
        Err(CallError::Internal(message)) => assert!(message.contains("collaborator bug")),
        other => panic!("expected internal error, got {other:?}"),
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.attempts(), 1);
    assert!(scheduler.delays().is_empty());
    assert_eq!(stats.snapshot().resolved, 1);
    assert_eq!(stats.snapshot().retries, 0);
}
