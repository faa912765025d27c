use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use dietdash_core::models::{
    AiProvider, AiSettingsUpdate, BatchImportResult, Food, FoodCategory, FoodInput, MealInput,
    PlanUpdate, UserPreferences,
};
use dietdash_core::operations::DEFAULT_PAGE_SIZE;
use dietdash_core::security::{
    is_safe_url, mask_api_key, validate_api_key, validate_password_strength,
};
use dietdash_core::{ApiGateway, Envelope};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dietdash", version, about = "Dietdash nutrition tracker client")]
pub struct Cli {
    /// Backend base URL, e.g. http://localhost:9090/api/v1
    #[arg(long, global = true)]
    pub api_url: Option<String>,
    /// Answer every command with canned data instead of calling the backend.
    #[arg(long, global = true)]
    pub demo: bool,
    /// Use the relative base path of a client served next to its backend.
    #[arg(long, global = true)]
    pub co_hosted: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Login(LoginArgs),
    Logout,
    /// Change the account password.
    Password {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    #[command(subcommand)]
    Foods(FoodsCommand),
    #[command(subcommand)]
    Meals(MealsCommand),
    #[command(subcommand)]
    Plans(PlansCommand),
    #[command(subcommand)]
    Nutrition(NutritionCommand),
    /// Ask the nutrition assistant.
    Chat { message: String },
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    Dashboard,
    #[command(subcommand)]
    Settings(SettingsCommand),
    Profile,
    /// Update preferences from a JSON object.
    Preferences {
        #[arg(long, value_parser = parse_json::<UserPreferences>)]
        json: UserPreferences,
    },
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long, required_unless_present = "test_account")]
    pub username: Option<String>,
    #[arg(long, required_unless_present = "test_account")]
    pub password: Option<String>,
    /// Sign in with the shared test account.
    #[arg(long)]
    pub test_account: bool,
}

#[derive(Subcommand, Debug)]
pub enum FoodsCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long)]
        category: Option<FoodCategory>,
    },
    Get {
        id: i64,
    },
    Create {
        #[arg(long, value_parser = parse_json::<FoodInput>)]
        json: FoodInput,
    },
    Update {
        id: i64,
        #[arg(long, value_parser = parse_json::<FoodInput>)]
        json: FoodInput,
    },
    Delete {
        id: i64,
    },
    /// Import a JSON array of foods from a file.
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum MealsCommand {
    List {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Create {
        #[arg(long, value_parser = parse_json::<MealInput>)]
        json: MealInput,
    },
    Update {
        id: i64,
        #[arg(long, value_parser = parse_json::<MealInput>)]
        json: MealInput,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlansCommand {
    Generate {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=7))]
        days: u8,
        #[arg(long, default_value = "")]
        preferences: String,
    },
    List,
    Get {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long, value_parser = parse_json::<PlanUpdate>)]
        json: PlanUpdate,
    },
    Delete {
        id: i64,
    },
    Complete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum NutritionCommand {
    Daily {
        date: NaiveDate,
    },
    Monthly {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
    Compare {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    /// Configure the AI provider. The key is only sent when given.
    Ai {
        #[arg(long)]
        provider: AiProvider,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        api_endpoint: Option<String>,
    },
    /// Check that the configured AI provider answers.
    Test,
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))
}

/// Run one command against the gateway.
pub async fn dispatch(gateway: &ApiGateway, command: Command) -> Result<Envelope> {
    let envelope = match command {
        Command::Login(args) => {
            let envelope = if args.test_account {
                gateway.login_with_test_account().await?
            } else {
                let username = args.username.ok_or_else(|| anyhow!("--username is required"))?;
                let password = args.password.ok_or_else(|| anyhow!("--password is required"))?;
                gateway.login(&username, &password).await?
            };
            // Tokens stay in the credential store; only the outcome is shown.
            Envelope {
                code: envelope.code,
                message: envelope.message,
                data: None,
                error: envelope.error,
                timestamp: envelope.timestamp,
                pagination: None,
                extra: envelope.extra,
            }
        }
        Command::Logout => gateway.logout().await?,
        Command::Password { old, new } => {
            let check = validate_password_strength(&new);
            if !check.is_valid {
                bail!("{}", check.message);
            }
            gateway.change_password(&old, &new).await?
        }
        Command::Foods(command) => foods(gateway, command).await?,
        Command::Meals(command) => match command {
            MealsCommand::List { date } => gateway.list_meals(date).await?,
            MealsCommand::Create { json } => gateway.create_meal(json).await?,
            MealsCommand::Update { id, json } => gateway.update_meal(id, json).await?,
            MealsCommand::Delete { id } => gateway.delete_meal(id).await?,
        },
        Command::Plans(command) => match command {
            PlansCommand::Generate { days, preferences } => {
                gateway.generate_plan(days, &preferences).await?
            }
            PlansCommand::List => gateway.list_plans().await?,
            PlansCommand::Get { id } => gateway.get_plan(id).await?,
            PlansCommand::Update { id, json } => gateway.update_plan(id, json).await?,
            PlansCommand::Delete { id } => gateway.delete_plan(id).await?,
            PlansCommand::Complete { id } => gateway.complete_plan(id).await?,
        },
        Command::Nutrition(command) => match command {
            NutritionCommand::Daily { date } => gateway.daily_nutrition(date).await?,
            NutritionCommand::Monthly { year, month } => {
                gateway.monthly_nutrition(year, month).await?
            }
            NutritionCommand::Compare {
                start_date,
                end_date,
            } => {
                if end_date < start_date {
                    bail!("end date {end_date} is before start date {start_date}");
                }
                gateway.compare_nutrition(start_date, end_date).await?
            }
        },
        Command::Chat { message } => {
            if message.trim().is_empty() {
                bail!("message cannot be empty");
            }
            gateway.chat(&message).await?
        }
        Command::History { page, page_size } => gateway.chat_history(page, page_size).await?,
        Command::Dashboard => gateway.dashboard().await?,
        Command::Settings(command) => match command {
            SettingsCommand::Show => gateway.settings().await?,
            SettingsCommand::Ai {
                provider,
                api_key,
                api_endpoint,
            } => {
                let update =
                    AiSettingsUpdate::new(provider, api_key.as_deref(), api_endpoint.as_deref());
                if let Some(key) = &update.api_key {
                    if !validate_api_key(key, provider) {
                        bail!("API key does not look like a {} key", provider.as_str());
                    }
                    info!(
                        "provider" = provider.as_str(),
                        "api_key" = %mask_api_key(key, 4, 4),
                        "updating AI settings"
                    );
                }
                if let Some(endpoint) = &update.api_endpoint {
                    if !is_safe_url(endpoint) {
                        bail!("API endpoint must be an http(s) URL");
                    }
                }
                gateway.update_ai_settings(update).await?
            }
            SettingsCommand::Test => gateway.test_ai_connection().await?,
        },
        Command::Profile => gateway.user_profile().await?,
        Command::Preferences { json } => gateway.update_user_preferences(json).await?,
    };
    Ok(envelope)
}

async fn foods(gateway: &ApiGateway, command: FoodsCommand) -> Result<Envelope> {
    let envelope = match command {
        FoodsCommand::List {
            page,
            page_size,
            category,
        } => {
            let envelope = gateway.list_foods(page, page_size, category).await?;
            if let Some(foods) = envelope.data_as::<Vec<Food>>() {
                info!(
                    "count" = foods.len(),
                    "total" = ?envelope.pagination.map(|page| page.total),
                    "foods listed"
                );
            }
            envelope
        }
        FoodsCommand::Get { id } => gateway.get_food(id).await?,
        FoodsCommand::Create { json } => gateway.create_food(json).await?,
        FoodsCommand::Update { id, json } => gateway.update_food(id, json).await?,
        FoodsCommand::Delete { id } => gateway.delete_food(id).await?,
        FoodsCommand::Import { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let foods: Vec<FoodInput> = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of foods", file.display()))?;
            if foods.is_empty() {
                bail!("{} contains no foods", file.display());
            }
            let envelope = gateway.batch_import_foods(foods).await?;
            if let Some(result) = envelope.data_as::<BatchImportResult>() {
                info!(
                    "success" = result.success,
                    "failed" = result.failed,
                    "foods imported"
                );
                for error in &result.errors {
                    eprintln!("import error: {error}");
                }
            }
            envelope
        }
    };
    Ok(envelope)
}
