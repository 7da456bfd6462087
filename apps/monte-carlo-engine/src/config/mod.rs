//! Configuration module for the Monte Carlo engine.
//!
//! YAML configuration with `${VAR}` / `${VAR:-default}` environment
//! interpolation. Every section is optional and falls back to defaults.
//!
//! # Usage
//!
//! ```rust,ignore
//! use monte_carlo_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//! println!("target trials: {}", config.simulation.target_trials);
//! ```

mod benchmarks;
mod paths;
mod pricing;
mod simulation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use benchmarks::BenchmarksConfig;
pub use paths::PathsConfig;
pub use pricing::PricingConfig;
pub use simulation::SimulationConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MC_CONFIG";

/// Config file used when none is named.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Batch run settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Price cache settings.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Benchmark tickers.
    #[serde(default)]
    pub benchmarks: BenchmarksConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to `$MC_CONFIG`,
///   then `config.yaml`.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let from_env = std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty());
    let path = path
        .map(str::to_string)
        .or(from_env)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let sim = &config.simulation;
    if sim.target_trials == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.target_trials must be positive".to_string(),
        ));
    }

    if sim.flush_every == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.flush_every must be positive".to_string(),
        ));
    }

    if sim.workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "simulation.workers must be positive when set".to_string(),
        ));
    }

    let pricing = &config.pricing;
    if pricing.warm_up_max_rounds == 0 {
        return Err(ConfigError::ValidationError(
            "pricing.warm_up_max_rounds must be positive".to_string(),
        ));
    }

    if pricing.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "pricing.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&pricing.jitter_factor) {
        return Err(ConfigError::ValidationError(
            "pricing.jitter_factor must be between 0.0 and 1.0".to_string(),
        ));
    }

    if pricing.max_delay_ms < pricing.initial_delay_ms {
        return Err(ConfigError::ValidationError(
            "pricing.max_delay_ms must not be below initial_delay_ms".to_string(),
        ));
    }

    Ok(())
}
