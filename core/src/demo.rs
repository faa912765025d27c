use crate::auth::SessionManager;
use crate::channel::ApiCall;
use crate::envelope::{Envelope, PageInfo};
use crate::models::TokenPair;
use crate::operations::DEFAULT_PAGE_SIZE;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Artificial latency so loading states still show up in demo mode.
pub const DEMO_LATENCY: Duration = Duration::from_millis(500);

pub const DEMO_ACCESS_TOKEN: &str = "demo_token";
pub const DEMO_REFRESH_TOKEN: &str = "demo_refresh_token";

/// Answers every call with a canned envelope instead of reaching a backend.
/// Never fails.
#[derive(Clone)]
pub struct DemoResponder {
    latency: Duration,
    session: SessionManager,
}

impl DemoResponder {
    pub(crate) fn new(session: SessionManager) -> Self {
        Self {
            latency: DEMO_LATENCY,
            session,
        }
    }

    pub async fn respond(&self, call: &ApiCall) -> Envelope {
        sleep(self.latency).await;
        debug!("method" = %call.method, "endpoint" = %call.endpoint, "demo response");

        let path = call.path();
        match path {
            "/auth/login" => self.login(),
            "/auth/refresh" => Envelope::success(json!({ "access_token": DEMO_ACCESS_TOKEN })),
            "/dashboard" => Envelope::success(dashboard_sample()),
            _ if path.starts_with("/foods") => {
                if call.method.is_write() {
                    Envelope::success(json!({}))
                } else {
                    Envelope::success(json!([]))
                        .with_pagination(PageInfo::empty(DEFAULT_PAGE_SIZE))
                }
            }
            _ if path.starts_with("/meals") || path.starts_with("/plans") => {
                Envelope::success(json!([]))
            }
            _ if path.starts_with("/ai") => Envelope::success(json!({
                "message": "This is a demo response. Please configure your AI provider in settings.",
                "message_id": Utc::now().timestamp_millis(),
            })),
            _ => Envelope::success(json!({})),
        }
    }

    /// Refresh against the placeholder session. Succeeds only if a demo login
    /// left a refresh token behind.
    pub async fn refresh(&self) -> bool {
        sleep(self.latency).await;
        let refreshed = self.session.refresh_token().is_some();
        debug!(refreshed, "demo token refresh");
        refreshed
    }

    fn login(&self) -> Envelope {
        let tokens = TokenPair {
            access_token: DEMO_ACCESS_TOKEN.to_string(),
            refresh_token: DEMO_REFRESH_TOKEN.to_string(),
            expires_in: Some(3600),
        };
        if let Err(err) = self.session.store_demo_tokens(&tokens) {
            warn!(%err, "failed to persist demo session");
        }
        Envelope::success(json!(tokens))
    }
}

fn dashboard_sample() -> Value {
    json!({
        "today_nutrition": {
            "date": Utc::now().format("%Y-%m-%d").to_string(),
            "total_calories": 1850,
            "total_protein": 78,
            "total_fat": 62,
            "total_carbohydrates": 210,
            "total_fiber": 28,
        },
        "goals": {
            "daily_calories": 2000,
            "daily_protein": 150,
            "daily_fat": 65,
            "daily_carbohydrates": 250,
        },
        "recent_meals": [
            { "id": 1, "meal_type": "breakfast", "time": "08:00", "total_calories": 450 },
            { "id": 2, "meal_type": "lunch", "time": "12:30", "total_calories": 650 },
            { "id": 3, "meal_type": "snack", "time": "15:00", "total_calories": 200 },
        ],
    })
}
