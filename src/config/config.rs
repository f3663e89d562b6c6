use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LoggingConfig;
use super::session::SessionConfig;

/// Environment variable overriding the location of the configuration file.
pub const CONFIG_PATH_ENV: &str = "STOCKGATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
const ENV_PREFIX: &str = "STOCKGATE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigV1 {
    /// Checks the invariants figment cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Invalid(format!("api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if !self.routes.login_entry_point.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "routes.login_entry_point must start with '/', got '{}'",
                self.routes.login_entry_point
            )));
        }
        if self.api.timeout_in_ms == 0 {
            return Err(ConfigError::Invalid(
                "api.timeout_in_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoints of the inventory REST API.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub register_path: String,
    pub send_otp_path: String,
    pub reset_password_path: String,
    pub timeout_in_ms: u64,
}

impl ApiConfig {
    /// Joins an API path onto the base url, tolerating a missing or doubled slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            login_path: "/login/".to_string(),
            refresh_path: "/token/refresh/".to_string(),
            register_path: "/register/".to_string(),
            send_otp_path: "/send-otp/".to_string(),
            reset_password_path: "/reset-password/".to_string(),
            timeout_in_ms: 10_000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct RoutesConfig {
    /// Where the host application sends the user once the session is gone.
    pub login_entry_point: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        RoutesConfig {
            login_entry_point: "/login".to_string(),
        }
    }
}

/// Load config from the YAML file named by `STOCKGATE_CONFIG`, falling back to
/// "config.yaml" in the current directory. `STOCKGATE_`-prefixed variables
/// override file values, with `__` separating nested keys.
pub fn load_config() -> Result<ConfigV1, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(path)
}

/// Load config from an explicit YAML file, still honouring env overrides.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ConfigV1, ConfigError> {
    extract(layered(path.as_ref()))
}

/// The YAML file with `STOCKGATE_` env overrides on top. The variable naming
/// the file itself is not a config key.
fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
}

/// Parse a configuration from an in-memory YAML document.
pub fn parse_config(yaml: &str) -> Result<ConfigV1, ConfigError> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

fn extract(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = figment.extract::<Config>().map_err(Box::new)?;
    // handle configuration migration between versions here when necessary
    let config = match config {
        Config::ConfigV1(c) => c,
    };
    config.validate()?;
    Ok(config)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
