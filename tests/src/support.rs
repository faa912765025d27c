use async_trait::async_trait;
use dietdash_core::{
    ApiGateway, GatewayConfig, HttpRequest, HttpResponse, MemoryCredentialStore, SessionEvent,
    Transport, TransportError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// What the scripted backend does with one request.
pub enum Reply {
    Json(Value),
    Delayed(Duration, Value),
    Html,
    Refused,
    /// Never answers; sets the flag once the pending call is dropped.
    Hang(Arc<AtomicBool>),
}

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

pub struct ScriptedTransport {
    handler: Handler,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request_path(request) == path)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = (self.handler)(&request);
        self.log.lock().push(request);
        match reply {
            Reply::Json(body) => Ok(HttpResponse::json(200, &body)),
            Reply::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(HttpResponse::json(200, &body))
            }
            Reply::Html => Ok(HttpResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: b"<!doctype html><html></html>".to_vec(),
            }),
            Reply::Refused => Err(TransportError::Connect("connection refused".to_string())),
            Reply::Hang(dropped) => {
                let _guard = DropFlag(dropped);
                futures::future::pending::<Result<HttpResponse, TransportError>>().await
            }
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Path of the request below the default development base URL.
pub fn request_path(request: &HttpRequest) -> &str {
    let url = request
        .url
        .strip_prefix("http://localhost:9090/api/v1")
        .unwrap_or(&request.url);
    url.split_once('?').map(|(path, _)| path).unwrap_or(url)
}

pub fn expired() -> Reply {
    Reply::Json(json!({"code": 40101, "message": "token expired"}))
}

pub fn ok(data: Value) -> Reply {
    Reply::Json(json!({"code": 0, "message": "success", "data": data}))
}

pub fn refreshed(token: &str) -> Value {
    json!({"code": 0, "message": "success", "data": {"access_token": token}})
}

pub fn gateway_with(
    transport: Arc<ScriptedTransport>,
    store: &MemoryCredentialStore,
) -> (ApiGateway, UnboundedReceiver<SessionEvent>) {
    ApiGateway::new(
        GatewayConfig::default(),
        transport,
        Arc::new(store.clone()),
    )
}
