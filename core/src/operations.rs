use crate::channel::ApiCall;
use crate::error::GatewayError;
use crate::models::{
    AiSettingsUpdate, BatchImportRequest, ChatRequest, Credentials, FoodCategory, FoodInput,
    GeneratePlanRequest, MealInput, PasswordChange, PlanUpdate, RefreshRequest, UserPreferences,
};
use crate::transport::HttpMethod;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Every remote operation the backend exposes.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Login(Credentials),
    Refresh(RefreshRequest),
    Logout,
    ChangePassword(PasswordChange),
    ListFoods {
        page: u32,
        page_size: u32,
        category: Option<FoodCategory>,
    },
    GetFood(i64),
    CreateFood(FoodInput),
    UpdateFood(i64, FoodInput),
    DeleteFood(i64),
    BatchImportFoods(BatchImportRequest),
    ListMeals {
        date: Option<NaiveDate>,
    },
    CreateMeal(MealInput),
    UpdateMeal(i64, MealInput),
    DeleteMeal(i64),
    GeneratePlan(GeneratePlanRequest),
    ListPlans,
    GetPlan(i64),
    UpdatePlan(i64, PlanUpdate),
    DeletePlan(i64),
    CompletePlan(i64),
    DailyNutrition(NaiveDate),
    MonthlyNutrition {
        year: i32,
        month: u32,
    },
    CompareNutrition {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Chat(ChatRequest),
    ChatHistory {
        page: u32,
        page_size: u32,
    },
    Dashboard,
    Settings,
    UpdateAiSettings(AiSettingsUpdate),
    TestAiConnection,
    UserProfile,
    UpdatePreferences(UserPreferences),
}

impl Operation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Refresh(_) => "refresh",
            Self::Logout => "logout",
            Self::ChangePassword(_) => "change_password",
            Self::ListFoods { .. } => "list_foods",
            Self::GetFood(_) => "get_food",
            Self::CreateFood(_) => "create_food",
            Self::UpdateFood(..) => "update_food",
            Self::DeleteFood(_) => "delete_food",
            Self::BatchImportFoods(_) => "batch_import_foods",
            Self::ListMeals { .. } => "list_meals",
            Self::CreateMeal(_) => "create_meal",
            Self::UpdateMeal(..) => "update_meal",
            Self::DeleteMeal(_) => "delete_meal",
            Self::GeneratePlan(_) => "generate_plan",
            Self::ListPlans => "list_plans",
            Self::GetPlan(_) => "get_plan",
            Self::UpdatePlan(..) => "update_plan",
            Self::DeletePlan(_) => "delete_plan",
            Self::CompletePlan(_) => "complete_plan",
            Self::DailyNutrition(_) => "daily_nutrition",
            Self::MonthlyNutrition { .. } => "monthly_nutrition",
            Self::CompareNutrition { .. } => "compare_nutrition",
            Self::Chat(_) => "chat",
            Self::ChatHistory { .. } => "chat_history",
            Self::Dashboard => "dashboard",
            Self::Settings => "settings",
            Self::UpdateAiSettings(_) => "update_ai_settings",
            Self::TestAiConnection => "test_ai_connection",
            Self::UserProfile => "user_profile",
            Self::UpdatePreferences(_) => "update_preferences",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Login(_)
            | Self::Refresh(_)
            | Self::Logout
            | Self::CreateFood(_)
            | Self::BatchImportFoods(_)
            | Self::CreateMeal(_)
            | Self::GeneratePlan(_)
            | Self::CompletePlan(_)
            | Self::Chat(_) => HttpMethod::Post,
            Self::ChangePassword(_)
            | Self::UpdateFood(..)
            | Self::UpdateMeal(..)
            | Self::UpdatePlan(..)
            | Self::UpdateAiSettings(_)
            | Self::UpdatePreferences(_) => HttpMethod::Put,
            Self::DeleteFood(_) | Self::DeleteMeal(_) | Self::DeletePlan(_) => HttpMethod::Delete,
            Self::ListFoods { .. }
            | Self::GetFood(_)
            | Self::ListMeals { .. }
            | Self::ListPlans
            | Self::GetPlan(_)
            | Self::DailyNutrition(_)
            | Self::MonthlyNutrition { .. }
            | Self::CompareNutrition { .. }
            | Self::ChatHistory { .. }
            | Self::Dashboard
            | Self::Settings
            | Self::TestAiConnection
            | Self::UserProfile => HttpMethod::Get,
        }
    }

    /// Path below the base URL, query string included.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Login(_) => "/auth/login".to_string(),
            Self::Refresh(_) => "/auth/refresh".to_string(),
            Self::Logout => "/auth/logout".to_string(),
            Self::ChangePassword(_) => "/auth/password".to_string(),
            Self::ListFoods {
                page,
                page_size,
                category,
            } => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                query
                    .append_pair("page", &page.to_string())
                    .append_pair("page_size", &page_size.to_string());
                if let Some(category) = category {
                    query.append_pair("category", category.as_str());
                }
                format!("/foods?{}", query.finish())
            }
            Self::CreateFood(_) => "/foods".to_string(),
            Self::GetFood(id) | Self::UpdateFood(id, _) | Self::DeleteFood(id) => {
                format!("/foods/{id}")
            }
            Self::BatchImportFoods(_) => "/foods/batch".to_string(),
            Self::ListMeals { date } => match date {
                Some(date) => format!("/meals?date={}", date.format("%Y-%m-%d")),
                None => "/meals".to_string(),
            },
            Self::CreateMeal(_) => "/meals".to_string(),
            Self::UpdateMeal(id, _) | Self::DeleteMeal(id) => format!("/meals/{id}"),
            Self::GeneratePlan(_) => "/plans/generate".to_string(),
            Self::ListPlans => "/plans".to_string(),
            Self::GetPlan(id) | Self::UpdatePlan(id, _) | Self::DeletePlan(id) => {
                format!("/plans/{id}")
            }
            Self::CompletePlan(id) => format!("/plans/{id}/complete"),
            Self::DailyNutrition(date) => {
                format!("/nutrition/daily/{}", date.format("%Y-%m-%d"))
            }
            Self::MonthlyNutrition { year, month } => {
                format!("/nutrition/monthly?year={year}&month={month}")
            }
            Self::CompareNutrition {
                start_date,
                end_date,
            } => format!(
                "/nutrition/compare?start_date={}&end_date={}",
                start_date.format("%Y-%m-%d"),
                end_date.format("%Y-%m-%d")
            ),
            Self::Chat(_) => "/ai/chat".to_string(),
            Self::ChatHistory { page, page_size } => {
                format!("/ai/history?page={page}&page_size={page_size}")
            }
            Self::Dashboard => "/dashboard".to_string(),
            Self::Settings => "/settings".to_string(),
            Self::UpdateAiSettings(_) => "/settings/ai".to_string(),
            Self::TestAiConnection => "/settings/ai/test".to_string(),
            Self::UserProfile => "/user/profile".to_string(),
            Self::UpdatePreferences(_) => "/user/preferences".to_string(),
        }
    }

    pub fn body(&self) -> Result<Option<Value>, serde_json::Error> {
        match self {
            Self::Login(body) => encode(body),
            Self::Refresh(body) => encode(body),
            Self::ChangePassword(body) => encode(body),
            Self::CreateFood(body) | Self::UpdateFood(_, body) => encode(body),
            Self::BatchImportFoods(body) => encode(body),
            Self::CreateMeal(body) | Self::UpdateMeal(_, body) => encode(body),
            Self::GeneratePlan(body) => encode(body),
            Self::UpdatePlan(_, body) => encode(body),
            Self::Chat(body) => encode(body),
            Self::UpdateAiSettings(body) => encode(body),
            Self::UpdatePreferences(body) => encode(body),
            Self::Logout
            | Self::ListFoods { .. }
            | Self::GetFood(_)
            | Self::DeleteFood(_)
            | Self::ListMeals { .. }
            | Self::DeleteMeal(_)
            | Self::ListPlans
            | Self::GetPlan(_)
            | Self::DeletePlan(_)
            | Self::CompletePlan(_)
            | Self::DailyNutrition(_)
            | Self::MonthlyNutrition { .. }
            | Self::CompareNutrition { .. }
            | Self::ChatHistory { .. }
            | Self::Dashboard
            | Self::Settings
            | Self::TestAiConnection
            | Self::UserProfile => Ok(None),
        }
    }

    pub fn into_call(self) -> Result<ApiCall, GatewayError> {
        let body = self
            .body()
            .map_err(|err| GatewayError::InvalidRequest(format!("{}: {err}", self.name())))?;
        let mut call = ApiCall::new(self.method(), self.endpoint());
        call.body = body;
        Ok(call)
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Option<Value>, serde_json::Error> {
    serde_json::to_value(body).map(Some)
}
