use std::time::Duration;

/// Failures surfaced by the gateway.
///
/// Application failures (a nonzero envelope `code`) are not represented here;
/// they come back as data inside the envelope.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
    #[error("cannot connect to backend API: {0}")]
    NetworkUnreachable(String),
    #[error("backend returned non-JSON response (content-type: {content_type})")]
    ProtocolMismatch { content_type: String },
    #[error("authentication required")]
    AuthRequired,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Display-ready text for front ends.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { .. } => {
                "Request timeout. Please check your network connection and try again.".to_string()
            }
            Self::NetworkUnreachable(_) => "Cannot connect to backend API. Please ensure the \
                 backend server is running and DIETDASH_API_URL is configured correctly."
                .to_string(),
            Self::ProtocolMismatch { .. } => {
                "Backend returned non-JSON response. Please check your API configuration."
                    .to_string()
            }
            Self::AuthRequired => "Your session has expired. Please log in again.".to_string(),
            Self::Transport(detail) => format!("Request failed: {detail}"),
            Self::Decode(detail) => format!("Unexpected response from backend: {detail}"),
            Self::InvalidRequest(detail) => format!("Request could not be built: {detail}"),
            Self::Storage(detail) => format!("Could not save your session: {detail}"),
        }
    }
}

/// Errors a [`crate::transport::Transport`] may report.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connect(detail) => Self::NetworkUnreachable(detail),
            TransportError::Other(detail) => Self::Transport(detail),
        }
    }
}

/// A nonzero envelope code, converted on request by [`crate::Envelope::into_result`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error {code}: {message}")]
pub struct ApplicationError {
    pub code: i64,
    pub message: String,
    pub detail: Option<String>,
}
