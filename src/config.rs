use crate::domain::progress::Thresholds;
use base64::{engine::general_purpose, Engine as _};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{0} must be base64")]
    NotBase64(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub thresholds: Thresholds,
    pub write_delta: u8,
    pub write_interval: Duration,
    pub idle_flush_after: Duration,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            write_delta: 5,
            write_interval: Duration::from_secs(3),
            idle_flush_after: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub enc_key: Vec<u8>,
    pub secure_cookies: bool,
    pub bootstrap_admin: Option<(String, String)>,
    pub training: TrainingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let enc_key_b64 = lookup("APP_ENC_KEY").ok_or(ConfigError::Missing("APP_ENC_KEY"))?;
        let enc_key = general_purpose::STANDARD
            .decode(enc_key_b64.trim())
            .map_err(|_| ConfigError::NotBase64("APP_ENC_KEY"))?;

        let session_key = match lookup("SESSION_KEY") {
            Some(raw) => general_purpose::STANDARD
                .decode(raw.trim())
                .map_err(|_| ConfigError::NotBase64("SESSION_KEY"))?,
            None => enc_key.clone(),
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let secure_cookies = ["PRODUCTION", "RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME"]
            .iter()
            .any(|name| lookup(*name).is_some());

        let bootstrap_admin = match (lookup("BOOTSTRAP_ADMIN_EMAIL"), lookup("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        let defaults = TrainingConfig::default();
        let unlock_percent = parse_or(&lookup, "TRAINING_UNLOCK_PERCENT", defaults.thresholds.unlock_percent)?;
        let complete_percent = parse_or(&lookup, "TRAINING_COMPLETE_PERCENT", defaults.thresholds.complete_percent)?;
        let passing_score = parse_or(&lookup, "TRAINING_PASSING_SCORE", defaults.thresholds.passing_score)?;
        for (name, value) in [
            ("TRAINING_UNLOCK_PERCENT", unlock_percent),
            ("TRAINING_COMPLETE_PERCENT", complete_percent),
            ("TRAINING_PASSING_SCORE", passing_score),
        ] {
            if value > 100 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }

        let training = TrainingConfig {
            thresholds: Thresholds {
                unlock_percent,
                complete_percent,
                passing_score,
            },
            write_delta: parse_or(&lookup, "TRAINING_WRITE_DELTA", defaults.write_delta)?,
            write_interval: Duration::from_secs(parse_or(
                &lookup,
                "TRAINING_WRITE_INTERVAL_SECS",
                defaults.write_interval.as_secs(),
            )?),
            idle_flush_after: Duration::from_secs(
                parse_or(
                    &lookup,
                    "TRAINING_IDLE_FLUSH_MINUTES",
                    defaults.idle_flush_after.as_secs() / 60,
                )? * 60,
            ),
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_key,
            enc_key,
            secure_cookies,
            bootstrap_admin,
            training,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
