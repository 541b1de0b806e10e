use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_SALES_WINDOW_LEN: usize = 6;
const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_TICK_INTERVAL_MS: u64 = 5137;
const DEFAULT_STOCK_DECREMENT_PROBABILITY: f64 = 0.3;
const DEFAULT_SALES_UPDATE_PROBABILITY: f64 = 0.2;
const DEFAULT_SAMPLE_MIN: u32 = 1;
const DEFAULT_SAMPLE_MAX: u32 = 10;

/// Catalog shape and defaults for new products
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CatalogSettings {
    /// Number of periods in every new product's sales window
    #[serde(default = "default_sales_window_len")]
    #[validate(range(min = 1))]
    pub sales_window_len: usize,

    /// Category assigned when a draft names none
    #[serde(default = "default_category")]
    #[validate(length(min = 1))]
    pub default_category: String,

    /// Load the demo catalog at startup
    #[serde(default = "default_true_bool")]
    pub seed_demo_data: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            sales_window_len: default_sales_window_len(),
            default_category: default_category(),
            seed_demo_data: true,
        }
    }
}

/// Simulated real-time feed
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    /// Connect the feed when the server starts
    #[serde(default = "default_true_bool")]
    pub auto_connect: bool,

    /// Milliseconds between mutations
    #[serde(default = "default_tick_interval_ms")]
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,

    /// Chance that a tick takes one unit of stock
    #[serde(default = "default_stock_decrement_probability")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub stock_decrement_probability: f64,

    /// Chance that a tick records a new sales sample
    #[serde(default = "default_sales_update_probability")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub sales_update_probability: f64,

    /// Smallest sales sample (inclusive)
    #[serde(default = "default_sample_min")]
    #[validate(range(min = 1))]
    pub sample_min: u32,

    /// Largest sales sample (inclusive)
    #[serde(default = "default_sample_max")]
    pub sample_max: u32,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,

    /// Make the simulated connection fail
    #[serde(default)]
    pub simulate_connect_failure: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            auto_connect: true,
            tick_interval_ms: default_tick_interval_ms(),
            stock_decrement_probability: default_stock_decrement_probability(),
            sales_update_probability: default_sales_update_probability(),
            sample_min: default_sample_min(),
            sample_max: default_sample_max(),
            seed: None,
            simulate_connect_failure: false,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Capacity of the catalog event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub catalog: CatalogSettings,

    #[serde(default)]
    #[validate]
    pub feed: FeedSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            event_channel_capacity: default_event_channel_capacity(),
            catalog: CatalogSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}

impl AppConfig {
    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.feed.sample_min > self.feed.sample_max {
            let mut err = ValidationError::new("sample_range");
            err.message = Some("feed.sample_min must not exceed feed.sample_max".into());
            errors.add("sample_min", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_true_bool() -> bool {
    true
}

fn default_sales_window_len() -> usize {
    DEFAULT_SALES_WINDOW_LEN
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_stock_decrement_probability() -> f64 {
    DEFAULT_STOCK_DECREMENT_PROBABILITY
}

fn default_sales_update_probability() -> f64 {
    DEFAULT_SALES_UPDATE_PROBABILITY
}

fn default_sample_min() -> u32 {
    DEFAULT_SAMPLE_MIN
}

fn default_sample_max() -> u32 {
    DEFAULT_SAMPLE_MAX
}

fn config_path(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("stockpulse={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, nested with `__`, e.g. APP__FEED__SEED)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    load_config_from(Path::new(CONFIG_DIR), &run_env, true)
}

/// Same layering as [`load_config`] with an explicit config directory.
pub fn load_config_from(
    config_dir: &Path,
    run_env: &str,
    include_env_vars: bool,
) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let mut builder = Config::builder()
        .set_default("environment", run_env)?
        .add_source(File::with_name(&config_path(config_dir, "default")).required(false))
        .add_source(File::with_name(&config_path(config_dir, run_env)).required(false));

    if include_env_vars {
        builder = builder.add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );
    }

    let app_config: AppConfig = builder.build()?.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
