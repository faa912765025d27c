use crate::support::{expired, gateway_with, ok, refreshed, request_path, Reply, ScriptedTransport};
use dietdash_core::{
    ApiCall, ApiGateway, CredentialKey, CredentialStore, Envelope, GatewayConfig, GatewayError,
    HttpMethod, MemoryCredentialStore, SessionEvent,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn returns_envelope_untouched() {
    let body = json!({"code": 0, "message": "Success", "data": {"foo": 1}});
    let reply = body.clone();
    let transport = ScriptedTransport::new(move |_| Reply::Json(reply.clone()));
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let envelope: Envelope<Value> = gateway
        .request(ApiCall::get("/dashboard"))
        .await
        .expect("envelope");

    assert_eq!(serde_json::to_value(&envelope).unwrap(), body);
}

#[tokio::test]
async fn keeps_null_data_and_unknown_fields() {
    let body = json!({
        "code": 0,
        "data": null,
        "message": "Success",
        "request_id": "abc",
        "timestamp": 1
    });
    let reply = body.clone();
    let transport = ScriptedTransport::new(move |_| Reply::Json(reply.clone()));
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let envelope = gateway.list_plans().await.expect("envelope");

    assert_eq!(serde_json::to_value(&envelope).unwrap(), body);
}

#[tokio::test]
async fn attaches_bearer_and_caller_headers() {
    let transport = ScriptedTransport::new(|_| ok(json!({})));
    let store = MemoryCredentialStore::with_tokens("access-1", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let call = ApiCall::new(HttpMethod::Post, "/ai/chat")
        .with_body(json!({"message": "hi"}))
        .with_header("Accept-Language", "en");
    let _: Envelope = gateway.request(call).await.expect("envelope");

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    let request = &sent[0];
    assert_eq!(request.url, "http://localhost:9090/api/v1/ai/chat");
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.bearer_token(), Some("access-1"));
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("Accept-Language"), Some("en"));
    assert!(request.header("X-Request-ID").is_some());
    assert_eq!(request.body, Some(json!({"message": "hi"})));
}

#[tokio::test]
async fn omits_authorization_without_session() {
    let transport = ScriptedTransport::new(|_| ok(json!([])));
    let (gateway, _events) = gateway_with(transport.clone(), &MemoryCredentialStore::new());

    gateway.list_foods(2, 10, None).await.expect("envelope");

    let sent = transport.requests();
    assert_eq!(sent[0].header("Authorization"), None);
    assert_eq!(
        sent[0].url,
        "http://localhost:9090/api/v1/foods?page=2&page_size=10"
    );
}

#[tokio::test(start_paused = true)]
async fn hanging_transport_times_out_and_is_cancelled() {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    let transport = ScriptedTransport::new(move |_| Reply::Hang(flag.clone()));
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let started = Instant::now();
    let err = gateway.dashboard().await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::Timeout {
            after: Duration::from_millis(30_000)
        }
    );
    assert!(started.elapsed() >= Duration::from_millis(30_000));
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_is_honoured() {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    let transport = ScriptedTransport::new(move |_| Reply::Hang(flag.clone()));
    let config = GatewayConfig {
        timeout: Duration::from_millis(1_500),
        ..GatewayConfig::default()
    };
    let (gateway, _events) = ApiGateway::new(
        config,
        transport,
        Arc::new(MemoryCredentialStore::new()),
    );

    let started = Instant::now();
    let err = gateway.settings().await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(1_500));
    assert!(started.elapsed() < Duration::from_millis(30_000));
}

#[tokio::test(start_paused = true)]
async fn replay_after_refresh_can_time_out() {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    let transport = ScriptedTransport::new(move |request| match request_path(request) {
        "/auth/refresh" => Reply::Json(refreshed("fresh")),
        _ if request.bearer_token() == Some("fresh") => Reply::Hang(flag.clone()),
        _ => expired(),
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let err = gateway.test_ai_connection().await.unwrap_err();

    assert!(matches!(err, GatewayError::Timeout { .. }));
    assert_eq!(transport.requests_to("/settings/ai/test").len(), 2);
    assert_eq!(store.get(CredentialKey::AccessToken).as_deref(), Some("fresh"));
}

#[tokio::test]
async fn non_json_response_is_protocol_mismatch() {
    let transport = ScriptedTransport::new(|_| Reply::Html);
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let err = gateway.dashboard().await.unwrap_err();

    match &err {
        GatewayError::ProtocolMismatch { content_type } => {
            assert!(content_type.starts_with("text/html"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.user_message().contains("non-JSON"));
}

#[tokio::test]
async fn refused_connection_is_network_unreachable() {
    let transport = ScriptedTransport::new(|_| Reply::Refused);
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let err = gateway.chat("hello").await.unwrap_err();

    assert!(matches!(err, GatewayError::NetworkUnreachable(_)));
    assert!(err.user_message().contains("backend server is running"));
}

#[tokio::test]
async fn test_account_login_stores_session() {
    let transport = ScriptedTransport::new(|_| {
        ok(json!({"access_token": "a-1", "refresh_token": "r-1", "expires_in": 3600}))
    });
    let store = MemoryCredentialStore::new();
    store.set(CredentialKey::DemoMode, "true").unwrap();
    let (gateway, mut events) = gateway_with(transport.clone(), &store);

    let envelope = gateway.login_with_test_account().await.expect("login");

    assert!(envelope.is_success());
    assert_eq!(
        transport.requests()[0].body,
        Some(json!({"username": "test", "password": "114514"}))
    );
    assert_eq!(store.get(CredentialKey::RefreshToken).as_deref(), Some("r-1"));
    assert_eq!(store.get(CredentialKey::DemoMode), None);
    assert_eq!(
        events.try_recv().expect("event"),
        SessionEvent::LoggedIn { demo: false }
    );
}

#[tokio::test]
async fn failed_login_leaves_store_untouched() {
    let transport = ScriptedTransport::new(|_| {
        Reply::Json(json!({"code": 40001, "message": "invalid username or password"}))
    });
    let store = MemoryCredentialStore::new();
    let (gateway, _events) = gateway_with(transport, &store);

    let envelope = gateway.login("alice", "wrong").await.expect("envelope");

    assert_eq!(envelope.code, 40001);
    assert!(envelope.data.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn logout_clears_credentials() {
    let transport = ScriptedTransport::new(|_| ok(json!(null)));
    let store = MemoryCredentialStore::with_tokens("a-1", "r-1");
    let (gateway, mut events) = gateway_with(transport.clone(), &store);

    gateway.logout().await.expect("logout");

    assert!(store.is_empty());
    assert_eq!(transport.requests()[0].bearer_token(), Some("a-1"));
    assert_eq!(events.try_recv().expect("event"), SessionEvent::LoggedOut);
}

#[tokio::test]
async fn application_error_converts_on_request() {
    let transport = ScriptedTransport::new(|_| {
        Reply::Json(json!({"code": 50003, "message": "AI service error", "error": "upstream 502"}))
    });
    let (gateway, _events) = gateway_with(transport, &MemoryCredentialStore::new());

    let envelope = gateway.generate_plan(3, "vegetarian").await.expect("envelope");
    let err = envelope.into_result().unwrap_err();

    assert_eq!(err.code, 50003);
    assert_eq!(err.detail.as_deref(), Some("upstream 502"));
}
