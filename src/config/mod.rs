//! Service configuration, read from the environment with built-in defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the service reads at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub api_key: String,
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub auth_username: String,
    pub auth_password: String,
    pub redis_url: String,
    pub cache_ttl: Duration,
    pub cache_timeout: Duration,
    pub cache_key_separator: Option<String>,
    pub model_path: PathBuf,
    /// Model output units per one unit of `currency`.
    pub exchange_rate: f64,
    pub currency: String,
    pub price_precision: u32,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".into(),
            api_key: "demo-key".into(),
            jwt_secret: "secret".into(),
            token_lifetime: Duration::from_secs(30 * 60),
            auth_username: "admin".into(),
            auth_password: "admin".into(),
            redis_url: "redis://localhost:6379".into(),
            cache_ttl: Duration::from_secs(3600),
            cache_timeout: Duration::from_millis(250),
            cache_key_separator: None,
            model_path: PathBuf::from("app/models/model.json"),
            exchange_rate: 105.0,
            currency: "GBP".into(),
            price_precision: 2,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, falling back to [`Settings::default`]
    /// for every variable it returns `None` for.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env { lookup: &lookup };

        let settings = Self {
            bind_addr: env.string("BIND_ADDR", defaults.bind_addr),
            api_key: env.string("API_KEY", defaults.api_key),
            jwt_secret: env.string("JWT_SECRET_KEY", defaults.jwt_secret),
            token_lifetime: env
                .parsed::<u64>("ACCESS_TOKEN_EXPIRE_MINUTES")?
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.token_lifetime),
            auth_username: env.string("AUTH_USERNAME", defaults.auth_username),
            auth_password: env.string("AUTH_PASSWORD", defaults.auth_password),
            redis_url: env.string("REDIS_URL", defaults.redis_url),
            cache_ttl: env
                .parsed::<u64>("CACHE_TTL_SECONDS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_timeout: env
                .parsed::<u64>("CACHE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.cache_timeout),
            cache_key_separator: lookup("CACHE_KEY_SEPARATOR").filter(|s| !s.is_empty()),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            exchange_rate: env
                .parsed::<f64>("INR_TO_GBP_RATE")?
                .unwrap_or(defaults.exchange_rate),
            currency: env.string("CURRENCY_CODE", defaults.currency),
            price_precision: env
                .parsed::<u32>("PRICE_PRECISION")?
                .unwrap_or(defaults.price_precision),
            request_timeout: env
                .parsed::<u64>("REQUEST_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exchange_rate.is_finite() && self.exchange_rate > 0.0) {
            return Err(ConfigError::Invalid {
                name: "INR_TO_GBP_RATE",
                value: self.exchange_rate.to_string(),
                reason: "must be a positive number".into(),
            });
        }
        if self.price_precision > 10 {
            return Err(ConfigError::Invalid {
                name: "PRICE_PRECISION",
                value: self.price_precision.to_string(),
                reason: "must be at most 10".into(),
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                name: "CACHE_TTL_SECONDS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: String) -> String {
        (self.lookup)(name).unwrap_or(default)
    }

    fn parsed<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    name,
                    value: raw.clone(),
                    reason: e.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(from_pairs(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = from_pairs(&[
            ("API_KEY", "prod-key"),
            ("REDIS_URL", "memory://"),
            ("INR_TO_GBP_RATE", "110.5"),
            ("CACHE_TTL_SECONDS", "60"),
            ("CACHE_KEY_SEPARATOR", "|"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "5"),
        ])
        .unwrap();
        assert_eq!(settings.api_key, "prod-key");
        assert_eq!(settings.redis_url, "memory://");
        assert_eq!(settings.exchange_rate, 110.5);
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.cache_key_separator.as_deref(), Some("|"));
        assert_eq!(settings.token_lifetime, Duration::from_secs(300));
    }

    #[test]
    fn empty_separator_means_none() {
        let settings = from_pairs(&[("CACHE_KEY_SEPARATOR", "")]).unwrap();
        assert_eq!(settings.cache_key_separator, None);
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = from_pairs(&[("CACHE_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("CACHE_TIMEOUT_MS"));
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        assert!(from_pairs(&[("INR_TO_GBP_RATE", "0")]).is_err());
        assert!(from_pairs(&[("INR_TO_GBP_RATE", "-3")]).is_err());
        assert!(from_pairs(&[("INR_TO_GBP_RATE", "NaN")]).is_err());
    }
}
