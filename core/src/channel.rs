use crate::config::GatewayConfig;
use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::transport::{HttpMethod, HttpRequest, Transport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Endpoint, method, body and extra headers of one backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: HttpMethod,
    /// Path below the base URL, including any query string.
    pub endpoint: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiCall {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.endpoint
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.endpoint)
    }
}

/// Sends one call over the transport and reads back the envelope.
#[derive(Clone)]
pub(crate) struct Channel {
    transport: Arc<dyn Transport>,
    config: Arc<GatewayConfig>,
}

impl Channel {
    pub(crate) fn new(transport: Arc<dyn Transport>, config: Arc<GatewayConfig>) -> Self {
        Self { transport, config }
    }

    pub(crate) async fn exchange(
        &self,
        call: &ApiCall,
        bearer: Option<&str>,
    ) -> Result<Envelope, GatewayError> {
        let url = self
            .config
            .endpoint_url(&call.endpoint)
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        let request_id = Uuid::new_v4().to_string();
        let mut request = HttpRequest {
            method: call.method,
            url,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Request-ID".to_string(), request_id.clone()),
            ],
            body: call.body.clone(),
        };
        if let Some(token) = bearer {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &call.headers {
            request.set_header(name.as_str(), value.as_str());
        }

        debug!(
            "method" = %call.method,
            "endpoint" = %call.endpoint,
            "request_id" = %request_id,
            "sending request"
        );
        let timeout = self.config.timeout;
        // Dropping the transport future on expiry aborts the underlying call.
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "endpoint" = %call.endpoint,
                    "timeout_ms" = timeout.as_millis() as u64,
                    "request timed out"
                );
                return Err(GatewayError::Timeout { after: timeout });
            }
        };

        if let Some(content_type) = &response.content_type {
            if !content_type.contains("application/json") {
                warn!(
                    "endpoint" = %call.endpoint,
                    "content_type" = %content_type,
                    "backend returned non-JSON response"
                );
                return Err(GatewayError::ProtocolMismatch {
                    content_type: content_type.clone(),
                });
            }
        }

        let envelope: Envelope = serde_json::from_slice(&response.body)
            .map_err(|err| GatewayError::Decode(format!("invalid envelope: {err}")))?;
        debug!(
            "endpoint" = %call.endpoint,
            "status" = response.status,
            "code" = envelope.code,
            "received response"
        );
        Ok(envelope)
    }
}
