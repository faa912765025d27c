use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const CO_HOSTED_BASE_URL: &str = "/api/v1";
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:9090/api/v1";

const API_URL_VAR: &str = "DIETDASH_API_URL";
const DEMO_MODE_VAR: &str = "DIETDASH_DEMO_MODE";

/// Where the client runs relative to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    /// Served alongside the backend, so a relative base path reaches it.
    CoHosted,
    #[default]
    Development,
}

impl Deployment {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::CoHosted => CO_HOSTED_BASE_URL,
            Self::Development => DEVELOPMENT_BASE_URL,
        }
    }
}

/// Settings injected into the gateway once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Scheme and host prepended to a relative `base_url`.
    pub origin: Option<String>,
    pub demo_mode: bool,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::for_deployment(Deployment::default())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(detail) => format!("Dietdash is not configured: {detail}. Update dietdash.yaml."),
        }
    }
}

impl GatewayConfig {
    pub fn for_deployment(deployment: Deployment) -> Self {
        Self {
            base_url: deployment.default_base_url().to_string(),
            origin: None,
            demo_mode: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn demo() -> Self {
        Self {
            demo_mode: true,
            ..Self::default()
        }
    }

    /// Resolve configuration from, in priority order: the explicit override,
    /// `DIETDASH_API_URL`, `dietdash.yaml`, then the deployment default.
    pub fn load(
        override_url: Option<&str>,
        deployment: Deployment,
    ) -> Result<Self, ConfigError> {
        let file = match locate_config_file() {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        Ok(resolve(
            override_url,
            deployment,
            EnvOverrides::from_environment(),
            file.and_then(|config| config.gateway),
        ))
    }

    /// Absolute URL for an endpoint path such as `/foods?page=1`.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<String, ConfigError> {
        let base = self.base_url.trim_end_matches('/');
        let joined = format!("{base}{endpoint}");
        if Url::parse(&joined).is_ok() {
            return Ok(joined);
        }
        match &self.origin {
            Some(origin) => {
                let origin = origin.trim_end_matches('/');
                let absolute = format!("{origin}{joined}");
                Url::parse(&absolute).map_err(|err| {
                    ConfigError::Invalid(format!("invalid API origin `{origin}`: {err}"))
                })?;
                Ok(absolute)
            }
            None => Err(ConfigError::Invalid(format!(
                "relative API base URL `{}` needs an origin",
                self.base_url
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct EnvOverrides {
    api_url: Option<String>,
    demo_mode: Option<bool>,
}

impl EnvOverrides {
    fn from_environment() -> Self {
        Self {
            api_url: std::env::var(API_URL_VAR)
                .ok()
                .filter(|value| !value.trim().is_empty()),
            demo_mode: std::env::var(DEMO_MODE_VAR)
                .ok()
                .map(|value| value.trim() == "true"),
        }
    }
}

fn resolve(
    override_url: Option<&str>,
    deployment: Deployment,
    env: EnvOverrides,
    section: Option<GatewaySection>,
) -> GatewayConfig {
    let section = section.unwrap_or_default();
    let base_url = override_url
        .map(str::to_owned)
        .or(env.api_url)
        .or(section.base_url.filter(|url| !url.trim().is_empty()))
        .unwrap_or_else(|| deployment.default_base_url().to_string());
    let timeout = section
        .timeout_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_TIMEOUT);
    GatewayConfig {
        base_url: base_url.trim().to_string(),
        origin: section.origin,
        demo_mode: env.demo_mode.or(section.demo_mode).unwrap_or(false),
        timeout,
    }
}

fn read_config_file(path: &Path) -> Result<DietdashConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
    })?;
    serde_yaml::from_str(&contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid dietdash.yaml: {err}")))
}

fn locate_config_file() -> Option<PathBuf> {
    config_candidates().into_iter().find(|path| path.exists())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("dietdash");
        paths.push(config_dir.join("dietdash.yaml"));
        paths.push(config_dir.join("dietdash.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".dietdash").join("dietdash.yaml"));
        paths.push(home_dir.join(".dietdash").join("dietdash.yml"));
    } else {
        paths.push(PathBuf::from("dietdash.yaml"));
        paths.push(PathBuf::from("dietdash.yml"));
    }
    paths
}

/// Directory for persisted credentials.
pub fn data_dir() -> PathBuf {
    match BaseDirs::new() {
        Some(base) => base.data_dir().join("dietdash"),
        None => PathBuf::from(".dietdash"),
    }
}

#[derive(Debug, Deserialize)]
struct DietdashConfig {
    gateway: Option<GatewaySection>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewaySection {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    demo_mode: Option<bool>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}
