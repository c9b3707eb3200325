use std::time::Duration;

use anyhow::Context;

const DEFAULT_TOKEN_TTL_MINUTES: u64 = 24 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub environment: String,
    pub token_ttl: Duration,
    /// Interval for purging expired tokens; `None` disables the sweep.
    pub sweep_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DSN")
            .or_else(|| lookup("DATABASE_URL"))
            .context("DSN or DATABASE_URL must be set")?;

        let port = match lookup("PORT").or_else(|| lookup("APP_PORT")) {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid PORT {v:?}"))?,
            None => 8080,
        };

        let ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("invalid TOKEN_TTL_MINUTES {v:?}"))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        let ttl_secs = ttl_minutes
            .checked_mul(60)
            .context("TOKEN_TTL_MINUTES too large")?;

        let sweep_interval = match lookup("TOKEN_SWEEP_SECS") {
            Some(v) => {
                let secs = v
                    .parse::<u64>()
                    .with_context(|| format!("invalid TOKEN_SWEEP_SECS {v:?}"))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url,
            environment: lookup("ENV").unwrap_or_else(|| "development".into()),
            token_ttl: Duration::from_secs(ttl_secs),
            sweep_interval,
        })
    }
}
