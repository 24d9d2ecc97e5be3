use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Listener settings shared by every service, read from `configuration.*`
/// and `APP__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

impl Environment {
    /// Reads `ENVIRONMENT`, defaulting to `dev`.
    pub fn from_env() -> Result<Self, AppError> {
        env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))
    }

    pub fn is_prod(self) -> bool {
        self == Environment::Prod
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

/// Read an environment variable.
///
/// In production every variable is mandatory; elsewhere `default` is used
/// when the variable is unset.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Read and parse an environment variable, reporting parse failures as
/// configuration errors.
pub fn get_env_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
    })
}

/// Read an optional environment variable; empty values count as unset.
pub fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!("DEV".parse::<Environment>(), Ok(Environment::Dev));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn get_env_falls_back_outside_prod() {
        let value = get_env("SERVICE_CORE_TEST_UNSET_VAR", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
        assert!(get_env("SERVICE_CORE_TEST_UNSET_VAR", Some("fallback"), true).is_err());
    }

    #[test]
    fn get_env_parsed_rejects_garbage() {
        let parsed: u64 = get_env_parsed("SERVICE_CORE_TEST_UNSET_NUM", "42", false).unwrap();
        assert_eq!(parsed, 42);
        let bad: Result<u64, _> = get_env_parsed("SERVICE_CORE_TEST_UNSET_NUM", "forty", false);
        assert!(bad.is_err());
    }
}
