//! Configuration management for rexia-flow.
//!
//! Configuration is read from environment variables:
//! - `LLM_API_KEY` - Required. API key for the OpenAI-compatible endpoint.
//! - `LLM_BASE_URL` - Optional. Endpoint base URL. Defaults to `https://api.openai.com/v1`.
//! - `BASE_MODEL` - Optional. Model for simple tasks. Defaults to `gpt-4o-mini`.
//! - `COMPLEX_MODEL` - Optional. Model for complex tasks. Defaults to `gpt-4o`.
//! - `ROUTER_MODEL` - Optional. Model that scores task complexity. Defaults to `BASE_MODEL`.
//! - `TEMPERATURE` - Optional. Sampling temperature for every model.
//! - `COMPLEXITY_THRESHOLD` - Optional. Scores above this use the complex model. Defaults to `50`.
//! - `MAX_ATTEMPTS` - Optional. Structured-output attempts per call. Defaults to `3`.
//! - `MAX_ITERATIONS` - Optional. Cap on reflect-loop rounds. Defaults to `10`.
//! - `WORKING_MEMORY_SIZE` - Optional. Results an agent remembers. Defaults to `10`.
//! - `VERBOSE` - Optional. Log prompts and responses at info level.
//! - `SANDBOX_BACKEND` - Optional. `docker`, `nspawn` or `host`. Defaults to `docker`.
//! - `SANDBOX_IMAGE` - Optional. Docker image. Defaults to `python:3.12-slim`.
//! - `SANDBOX_ROOT` - Optional. Root filesystem for the nspawn backend.
//! - `SANDBOX_TIMEOUT_SECS` - Optional. Wall-clock limit per run. Defaults to `30`.
//! - `SANDBOX_MEMORY_MB` - Optional. Memory limit per run. Defaults to `128`.
//! - `SANDBOX_CPU_QUOTA` - Optional. CPU microseconds per 100ms. Defaults to `50000`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::ChatOptions;
use crate::memory::DEFAULT_WORKING_MEMORY_SIZE;
use crate::routing::DEFAULT_COMPLEXITY_THRESHOLD;
use crate::sandbox::{SandboxBackend, SandboxConfig};
use crate::structure::DEFAULT_MAX_ATTEMPTS;
use crate::workflows::{WorkflowOptions, DEFAULT_MAX_ITERATIONS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Models and how tasks are routed between them.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_model: String,
    pub complex_model: String,
    pub router_model: String,
    pub temperature: Option<f64>,
    pub complexity_threshold: u8,
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    pub models: ModelConfig,

    /// Structured-output attempts per model call
    pub max_attempts: u32,

    /// Maximum work/review rounds in the reflect workflow
    pub max_iterations: u32,

    pub working_memory_size: usize,

    pub verbose: bool,

    pub sandbox: SandboxConfig,
}

fn parse_var<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("expected true or false, got {}", other),
        )),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `LLM_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for any variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key =
            var("LLM_API_KEY").ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let base_url = var("LLM_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidValue("LLM_BASE_URL".to_string(), format!("{}", e)))?;

        let base_model = var("BASE_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let complex_model = var("COMPLEX_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let router_model = var("ROUTER_MODEL").unwrap_or_else(|| base_model.clone());

        let temperature = match var("TEMPERATURE") {
            None => None,
            Some(raw) => Some(parse_var::<f64>("TEMPERATURE", Some(raw), 0.0)?),
        };
        if let Some(t) = temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidValue(
                    "TEMPERATURE".to_string(),
                    format!("{} is outside 0.0..=2.0", t),
                ));
            }
        }

        let complexity_threshold = parse_var(
            "COMPLEXITY_THRESHOLD",
            var("COMPLEXITY_THRESHOLD"),
            DEFAULT_COMPLEXITY_THRESHOLD,
        )?;
        if !(1..=100).contains(&complexity_threshold) {
            return Err(ConfigError::InvalidValue(
                "COMPLEXITY_THRESHOLD".to_string(),
                format!("{} is outside 1..=100", complexity_threshold),
            ));
        }

        let max_attempts = parse_var("MAX_ATTEMPTS", var("MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        let max_iterations =
            parse_var("MAX_ITERATIONS", var("MAX_ITERATIONS"), DEFAULT_MAX_ITERATIONS)?;
        let working_memory_size = parse_var(
            "WORKING_MEMORY_SIZE",
            var("WORKING_MEMORY_SIZE"),
            DEFAULT_WORKING_MEMORY_SIZE,
        )?;
        for (name, value) in [
            ("MAX_ATTEMPTS", max_attempts as usize),
            ("MAX_ITERATIONS", max_iterations as usize),
            ("WORKING_MEMORY_SIZE", working_memory_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    "must be at least 1".to_string(),
                ));
            }
        }

        let verbose = parse_bool("VERBOSE", var("VERBOSE"))?;

        let defaults = SandboxConfig::default();
        let backend = match var("SANDBOX_BACKEND") {
            None => defaults.backend,
            Some(raw) => SandboxBackend::parse(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SANDBOX_BACKEND".to_string(),
                    format!("expected docker, nspawn or host, got {}", raw),
                )
            })?,
        };
        let nspawn_root = var("SANDBOX_ROOT").map(PathBuf::from);
        if backend == SandboxBackend::Nspawn && nspawn_root.is_none() {
            return Err(ConfigError::MissingEnvVar("SANDBOX_ROOT".to_string()));
        }
        let sandbox = SandboxConfig {
            backend,
            image: var("SANDBOX_IMAGE").unwrap_or(defaults.image),
            nspawn_root,
            python: defaults.python,
            timeout: Duration::from_secs(parse_var(
                "SANDBOX_TIMEOUT_SECS",
                var("SANDBOX_TIMEOUT_SECS"),
                defaults.timeout.as_secs(),
            )?),
            memory_mb: parse_var("SANDBOX_MEMORY_MB", var("SANDBOX_MEMORY_MB"), defaults.memory_mb)?,
            cpu_quota: parse_var("SANDBOX_CPU_QUOTA", var("SANDBOX_CPU_QUOTA"), defaults.cpu_quota)?,
        };

        Ok(Self {
            api_key,
            base_url,
            models: ModelConfig {
                base_model,
                complex_model,
                router_model,
                temperature,
                complexity_threshold,
            },
            max_attempts,
            max_iterations,
            working_memory_size,
            verbose,
            sandbox,
        })
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.models.temperature,
            ..ChatOptions::default()
        }
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            max_attempts: self.max_attempts,
            max_iterations: self.max_iterations,
            sandbox: self.sandbox.clone(),
            ..WorkflowOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("LLM_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.models.router_model, config.models.base_model);
        assert_eq!(config.models.complexity_threshold, 50);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.working_memory_size, 10);
        assert!(!config.verbose);
        assert_eq!(config.sandbox.backend, SandboxBackend::Docker);
        assert_eq!(config.sandbox.image, "python:3.12-slim");
        assert_eq!(config.sandbox.timeout, Duration::from_secs(30));
        assert_eq!(config.chat_options().temperature, None);
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnvVar(name)) if name == "LLM_API_KEY"
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("LLM_API_KEY", "k"),
            ("LLM_BASE_URL", "http://localhost:11434/v1"),
            ("BASE_MODEL", "small"),
            ("ROUTER_MODEL", "tiny"),
            ("TEMPERATURE", "0.2"),
            ("COMPLEXITY_THRESHOLD", "70"),
            ("MAX_ITERATIONS", "4"),
            ("VERBOSE", "yes"),
            ("SANDBOX_BACKEND", "host"),
            ("SANDBOX_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.models.base_model, "small");
        assert_eq!(config.models.router_model, "tiny");
        assert_eq!(config.models.temperature, Some(0.2));
        assert_eq!(config.models.complexity_threshold, 70);
        assert!(config.verbose);

        let options = config.workflow_options();
        assert_eq!(options.max_iterations, 4);
        assert_eq!(options.sandbox.backend, SandboxBackend::Host);
        assert_eq!(options.sandbox.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("LLM_BASE_URL", "not a url"),
            ("COMPLEXITY_THRESHOLD", "0"),
            ("COMPLEXITY_THRESHOLD", "abc"),
            ("MAX_ATTEMPTS", "0"),
            ("TEMPERATURE", "7"),
            ("VERBOSE", "maybe"),
            ("SANDBOX_BACKEND", "podman"),
        ] {
            let result = load(&[("LLM_API_KEY", "k"), (name, value)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref n, _)) if n == name),
                "{}={} should be rejected",
                name,
                value
            );
        }
    }

    #[test]
    fn test_nspawn_needs_root() {
        assert!(matches!(
            load(&[("LLM_API_KEY", "k"), ("SANDBOX_BACKEND", "nspawn")]),
            Err(ConfigError::MissingEnvVar(name)) if name == "SANDBOX_ROOT"
        ));
    }
}
