pub mod auth;
pub mod channel;
pub mod config;
pub mod demo;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod models;
pub mod operations;
pub mod security;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use auth::{SessionEvent, SessionManager, LOGIN_ROUTE};
pub use channel::ApiCall;
pub use config::{ConfigError, Deployment, GatewayConfig};
pub use envelope::{ApiCode, Envelope, PageInfo, TOKEN_EXPIRED};
pub use error::{ApplicationError, GatewayError, TransportError};
pub use gateway::ApiGateway;
pub use operations::Operation;
pub use store::{CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
