use crate::auth::{SessionEvent, SessionManager, LOGIN_ROUTE};
use crate::channel::{ApiCall, Channel};
use crate::config::GatewayConfig;
use crate::demo::DemoResponder;
use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::models::{
    AiSettingsUpdate, BatchImportRequest, ChatRequest, Credentials, FoodCategory, FoodInput,
    GeneratePlanRequest, MealInput, PasswordChange, PlanUpdate, TokenPair, UserPreferences,
};
use crate::operations::Operation;
use crate::store::CredentialStore;
use crate::transport::{ReqwestTransport, Transport};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn};

/// Single entry point for every backend call.
///
/// Cloning is cheap and every clone shares the same session, so one gateway can
/// be handed to all views.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: Arc<GatewayConfig>,
    channel: Channel,
    session: SessionManager,
    demo: DemoResponder,
}

impl ApiGateway {
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let config = Arc::new(config);
        let (events_tx, events_rx) = unbounded_channel();
        let channel = Channel::new(transport, config.clone());
        let session = SessionManager::new(store, channel.clone(), events_tx);
        let demo = DemoResponder::new(session.clone());
        (
            Self {
                inner: Arc::new(GatewayInner {
                    config,
                    channel,
                    session,
                    demo,
                }),
            },
            events_rx,
        )
    }

    /// Build a gateway backed by reqwest. The base URL is validated up front
    /// unless demo mode is on.
    pub fn connect(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>), GatewayError> {
        if !config.demo_mode {
            config
                .endpoint_url("")
                .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        }
        Ok(Self::new(config, Arc::new(ReqwestTransport::default()), store))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn is_demo(&self) -> bool {
        self.inner.config.demo_mode
    }

    /// Issue one call and hand back the envelope, whatever its `code`.
    ///
    /// An expired access token (`40101`) triggers a shared refresh; on success
    /// the call is replayed exactly once, on failure the session is wiped and
    /// `AuthRequired` is returned.
    pub async fn request<T: DeserializeOwned>(
        &self,
        call: ApiCall,
    ) -> Result<Envelope<T>, GatewayError> {
        if self.is_demo() {
            return self.inner.demo.respond(&call).await.decode();
        }

        let envelope = self.send(&call).await?;
        if !envelope.is_token_expired() {
            return envelope.decode();
        }

        info!("endpoint" = %call.endpoint, "access token expired");
        if !self.inner.session.refresh().await {
            self.force_logout();
            return Err(GatewayError::AuthRequired);
        }

        let retried = self.send(&call).await?;
        if retried.is_token_expired() {
            warn!(
                "endpoint" = %call.endpoint,
                "request still unauthorized after refresh, not retrying again"
            );
        }
        retried.decode()
    }

    pub async fn execute(&self, operation: Operation) -> Result<Envelope, GatewayError> {
        self.request(operation.into_call()?).await
    }

    async fn send(&self, call: &ApiCall) -> Result<Envelope, GatewayError> {
        let token = self.inner.session.access_token();
        self.inner.channel.exchange(call, token.as_deref()).await
    }

    fn force_logout(&self) {
        warn!("session could not be refreshed, clearing credentials");
        self.inner.session.purge();
        self.inner.session.notify(SessionEvent::LoginRequired {
            redirect: LOGIN_ROUTE.to_string(),
        });
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Envelope<TokenPair>, GatewayError> {
        self.login_with(Credentials::new(username, password)).await
    }

    pub async fn login_with_test_account(&self) -> Result<Envelope<TokenPair>, GatewayError> {
        self.login_with(Credentials::test_account()).await
    }

    async fn login_with(
        &self,
        credentials: Credentials,
    ) -> Result<Envelope<TokenPair>, GatewayError> {
        let username = credentials.username.clone();
        let envelope: Envelope<TokenPair> = self
            .request(Operation::Login(credentials).into_call()?)
            .await?;
        if envelope.is_success() {
            if let Some(tokens) = &envelope.data {
                // The demo responder has already seeded its placeholder session.
                if !self.is_demo() {
                    self.inner
                        .session
                        .store_tokens(tokens)
                        .map_err(|err| GatewayError::Storage(err.to_string()))?;
                }
                info!("username" = %username, "demo" = self.is_demo(), "logged in");
                self.inner.session.notify(SessionEvent::LoggedIn {
                    demo: self.is_demo(),
                });
            }
        }
        Ok(envelope)
    }

    /// Shared single-flight refresh; see [`SessionManager::refresh`].
    ///
    /// In demo mode the placeholder session is kept and no call is made.
    pub async fn refresh_token(&self) -> bool {
        if self.is_demo() {
            return self.inner.demo.refresh().await;
        }
        self.inner.session.refresh().await
    }

    pub async fn logout(&self) -> Result<Envelope, GatewayError> {
        let envelope = self.execute(Operation::Logout).await?;
        self.inner.session.purge();
        self.inner.session.notify(SessionEvent::LoggedOut);
        info!("logged out");
        Ok(envelope)
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::ChangePassword(PasswordChange {
            old_password: old_password.to_owned(),
            new_password: new_password.to_owned(),
        }))
        .await
    }

    pub async fn list_foods(
        &self,
        page: u32,
        page_size: u32,
        category: Option<FoodCategory>,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::ListFoods {
            page,
            page_size,
            category,
        })
        .await
    }

    pub async fn get_food(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::GetFood(id)).await
    }

    pub async fn create_food(&self, food: FoodInput) -> Result<Envelope, GatewayError> {
        self.execute(Operation::CreateFood(food)).await
    }

    pub async fn update_food(&self, id: i64, food: FoodInput) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UpdateFood(id, food)).await
    }

    pub async fn delete_food(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::DeleteFood(id)).await
    }

    pub async fn batch_import_foods(
        &self,
        foods: Vec<FoodInput>,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::BatchImportFoods(BatchImportRequest { foods }))
            .await
    }

    pub async fn list_meals(&self, date: Option<NaiveDate>) -> Result<Envelope, GatewayError> {
        self.execute(Operation::ListMeals { date }).await
    }

    pub async fn create_meal(&self, meal: MealInput) -> Result<Envelope, GatewayError> {
        self.execute(Operation::CreateMeal(meal)).await
    }

    pub async fn update_meal(&self, id: i64, meal: MealInput) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UpdateMeal(id, meal)).await
    }

    pub async fn delete_meal(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::DeleteMeal(id)).await
    }

    pub async fn generate_plan(
        &self,
        days: u8,
        preferences: &str,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::GeneratePlan(GeneratePlanRequest {
            days,
            preferences: preferences.to_owned(),
        }))
        .await
    }

    pub async fn list_plans(&self) -> Result<Envelope, GatewayError> {
        self.execute(Operation::ListPlans).await
    }

    pub async fn get_plan(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::GetPlan(id)).await
    }

    pub async fn update_plan(&self, id: i64, plan: PlanUpdate) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UpdatePlan(id, plan)).await
    }

    pub async fn delete_plan(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::DeletePlan(id)).await
    }

    pub async fn complete_plan(&self, id: i64) -> Result<Envelope, GatewayError> {
        self.execute(Operation::CompletePlan(id)).await
    }

    pub async fn daily_nutrition(&self, date: NaiveDate) -> Result<Envelope, GatewayError> {
        self.execute(Operation::DailyNutrition(date)).await
    }

    pub async fn monthly_nutrition(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::MonthlyNutrition { year, month })
            .await
    }

    pub async fn compare_nutrition(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::CompareNutrition {
            start_date,
            end_date,
        })
        .await
    }

    pub async fn chat(&self, message: &str) -> Result<Envelope, GatewayError> {
        self.execute(Operation::Chat(ChatRequest {
            message: message.to_owned(),
        }))
        .await
    }

    pub async fn chat_history(&self, page: u32, page_size: u32) -> Result<Envelope, GatewayError> {
        self.execute(Operation::ChatHistory { page, page_size })
            .await
    }

    pub async fn dashboard(&self) -> Result<Envelope, GatewayError> {
        self.execute(Operation::Dashboard).await
    }

    pub async fn settings(&self) -> Result<Envelope, GatewayError> {
        self.execute(Operation::Settings).await
    }

    pub async fn update_ai_settings(
        &self,
        update: AiSettingsUpdate,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UpdateAiSettings(update)).await
    }

    pub async fn test_ai_connection(&self) -> Result<Envelope, GatewayError> {
        self.execute(Operation::TestAiConnection).await
    }

    pub async fn user_profile(&self) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UserProfile).await
    }

    pub async fn update_user_preferences(
        &self,
        preferences: UserPreferences,
    ) -> Result<Envelope, GatewayError> {
        self.execute(Operation::UpdatePreferences(preferences))
            .await
    }
}
