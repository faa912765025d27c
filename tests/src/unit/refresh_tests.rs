use crate::support::{expired, gateway_with, ok, refreshed, request_path, Reply, ScriptedTransport};
use dietdash_core::{
    ApiCall, ApiGateway, CredentialKey, CredentialStore, Envelope, GatewayConfig, GatewayError,
    MemoryCredentialStore, SessionEvent, LOGIN_ROUTE,
};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn concurrent_expiries_share_one_refresh() {
    let transport = ScriptedTransport::new(|request| match request_path(request) {
        "/auth/refresh" => Reply::Delayed(Duration::from_millis(50), refreshed("fresh")),
        _ if request.bearer_token() == Some("fresh") => ok(json!({"ok": true})),
        _ => expired(),
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let calls = (0..5).map(|_| {
        let gateway = gateway.clone();
        async move { gateway.request::<serde_json::Value>(ApiCall::get("/dashboard")).await }
    });
    let results = join_all(calls).await;

    for result in results {
        let envelope = result.expect("envelope");
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data, Some(json!({"ok": true})));
    }
    assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
    let dashboard = transport.requests_to("/dashboard");
    assert_eq!(dashboard.len(), 10);
    let replayed = dashboard
        .iter()
        .filter(|request| request.bearer_token() == Some("fresh"))
        .count();
    assert_eq!(replayed, 5);
    assert_eq!(store.get(CredentialKey::AccessToken).as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_expiries_share_one_failed_refresh() {
    let transport = ScriptedTransport::new(|request| match request_path(request) {
        "/auth/refresh" => Reply::Delayed(
            Duration::from_millis(50),
            json!({"code": 40101, "message": "invalid or expired refresh token"}),
        ),
        _ => expired(),
    });
    let store = MemoryCredentialStore::with_tokens("stale", "revoked");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let calls = (0..4).map(|_| {
        let gateway = gateway.clone();
        async move { gateway.list_plans().await }
    });
    let results = join_all(calls).await;

    assert!(results
        .iter()
        .all(|result| matches!(result, Err(GatewayError::AuthRequired))));
    assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn replays_exactly_once_even_if_still_expired() {
    let transport = ScriptedTransport::new(|request| match request_path(request) {
        "/auth/refresh" => Reply::Json(refreshed("fresh")),
        _ => expired(),
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let envelope = gateway.user_profile().await.expect("envelope");

    assert_eq!(envelope.code, 40101);
    let profile = transport.requests_to("/user/profile");
    assert_eq!(profile.len(), 2);
    assert_eq!(profile[0].bearer_token(), Some("stale"));
    assert_eq!(profile[1].bearer_token(), Some("fresh"));
    assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
}

#[tokio::test]
async fn rejected_refresh_purges_and_requires_login() {
    let transport = ScriptedTransport::new(|request| match request_path(request) {
        "/auth/refresh" => Reply::Json(json!({"code": 40101, "message": "expired"})),
        _ => expired(),
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    store.set(CredentialKey::DemoMode, "false").unwrap();
    let (gateway, mut events) = gateway_with(transport.clone(), &store);

    let err = gateway.list_meals(None).await.unwrap_err();

    assert_eq!(err, GatewayError::AuthRequired);
    assert!(store.is_empty());
    assert_eq!(
        events.try_recv().expect("event"),
        SessionEvent::LoginRequired {
            redirect: LOGIN_ROUTE.to_string()
        }
    );
    assert_eq!(transport.requests_to("/meals").len(), 1);
}

#[tokio::test]
async fn successful_refresh_without_access_token_requires_login() {
    for refresh_reply in [
        json!({"code": 0, "message": "success"}),
        json!({"code": 0, "message": "success", "data": null}),
        json!({"code": 0, "message": "success", "data": {"token": "fresh"}}),
    ] {
        let transport = ScriptedTransport::new(move |request| match request_path(request) {
            "/auth/refresh" => Reply::Json(refresh_reply.clone()),
            _ => expired(),
        });
        let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
        let (gateway, _events) = gateway_with(transport.clone(), &store);

        let err = gateway.dashboard().await.unwrap_err();

        assert_eq!(err, GatewayError::AuthRequired);
        assert!(store.is_empty());
        assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
        assert_eq!(transport.requests_to("/dashboard").len(), 1);
    }
}

#[tokio::test]
async fn refresh_without_access_token_persists_nothing() {
    let transport = ScriptedTransport::new(|_| ok(json!({"refresh_token": "refresh-2"})));
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, mut events) = gateway_with(transport, &store);

    assert!(!gateway.refresh_token().await);

    assert_eq!(store.get(CredentialKey::AccessToken).as_deref(), Some("stale"));
    assert_eq!(
        store.get(CredentialKey::RefreshToken).as_deref(),
        Some("refresh-1")
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn demo_refresh_never_reaches_transport() {
    let transport = ScriptedTransport::new(|_| Reply::Json(refreshed("real")));
    let store = MemoryCredentialStore::new();
    let (gateway, _events) = ApiGateway::new(
        GatewayConfig::demo(),
        transport.clone(),
        Arc::new(store.clone()),
    );

    gateway.login_with_test_account().await.expect("login");
    assert!(gateway.refresh_token().await);

    assert!(transport.requests().is_empty());
    assert_eq!(
        store.get(CredentialKey::AccessToken).as_deref(),
        Some("demo_token")
    );
}

#[tokio::test]
async fn missing_refresh_token_skips_network() {
    let transport = ScriptedTransport::new(|_| expired());
    let store = MemoryCredentialStore::new();
    store.set(CredentialKey::AccessToken, "stale").unwrap();
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    assert!(!gateway.refresh_token().await);
    assert!(transport.requests().is_empty());

    let err = gateway.settings().await.unwrap_err();
    assert_eq!(err, GatewayError::AuthRequired);
    assert_eq!(transport.requests().len(), 1);
    assert!(transport.requests_to("/auth/refresh").is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn refresh_request_sends_only_refresh_token() {
    let transport = ScriptedTransport::new(|_| Reply::Json(refreshed("fresh")));
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, mut events) = gateway_with(transport.clone(), &store);

    assert!(gateway.refresh_token().await);

    let refresh = transport.requests_to("/auth/refresh");
    assert_eq!(refresh.len(), 1);
    assert_eq!(refresh[0].header("Authorization"), None);
    assert_eq!(refresh[0].body, Some(json!({"refresh_token": "refresh-1"})));
    assert_eq!(store.get(CredentialKey::AccessToken).as_deref(), Some("fresh"));
    assert_eq!(
        store.get(CredentialKey::RefreshToken).as_deref(),
        Some("refresh-1")
    );
    assert_eq!(events.try_recv().expect("event"), SessionEvent::TokenRefreshed);
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let transport = ScriptedTransport::new(|_| {
        Reply::Json(json!({
            "code": 0,
            "message": "success",
            "data": {"access_token": "fresh", "refresh_token": "refresh-2"}
        }))
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport, &store);

    assert!(gateway.refresh_token().await);
    assert_eq!(
        store.get(CredentialKey::RefreshToken).as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn refresh_slot_clears_after_success() {
    let minted = Arc::new(AtomicUsize::new(0));
    let minted_in_handler = minted.clone();
    let transport = ScriptedTransport::new(move |request| match request_path(request) {
        "/auth/refresh" => {
            let n = minted_in_handler.fetch_add(1, Ordering::SeqCst) + 1;
            Reply::Json(refreshed(&format!("fresh-{n}")))
        }
        _ => match request.bearer_token() {
            Some(token) if token.starts_with("fresh-") => ok(json!([])),
            _ => expired(),
        },
    });
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    let first: Envelope = gateway.request(ApiCall::get("/plans")).await.expect("first");
    assert_eq!(first.code, 0);
    assert!(!gateway.session().is_refreshing());

    store.set(CredentialKey::AccessToken, "stale-again").unwrap();
    let second: Envelope = gateway.request(ApiCall::get("/plans")).await.expect("second");
    assert_eq!(second.code, 0);

    assert_eq!(transport.requests_to("/auth/refresh").len(), 2);
    assert_eq!(
        store.get(CredentialKey::AccessToken).as_deref(),
        Some("fresh-2")
    );
}

#[tokio::test]
async fn refresh_slot_clears_after_failure() {
    let transport = ScriptedTransport::new(|_| Reply::Refused);
    let store = MemoryCredentialStore::with_tokens("stale", "refresh-1");
    let (gateway, _events) = gateway_with(transport.clone(), &store);

    assert!(!gateway.refresh_token().await);
    assert!(!gateway.session().is_refreshing());
    assert!(!gateway.refresh_token().await);

    assert_eq!(transport.requests_to("/auth/refresh").len(), 2);
    assert_eq!(store.get(CredentialKey::AccessToken).as_deref(), Some("stale"));
}
