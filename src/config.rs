use std::env;

use anyhow::Context;

pub const DEFAULT_CLAUDE_API_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When unset, logs are kept in memory.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,

    pub claude_api_key: String,
    pub claude_model: String,
    pub claude_api_url: String,

    pub summary_max_per_hour: u32,
    pub cache_ttl_secs: u64,
}

fn parsed<T: std::str::FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.into())
        .parse()
        .with_context(|| format!("{key} must be a number"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PORT", "8080")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,

            claude_api_key: env::var("CLAUDE_API_KEY").unwrap_or_default(),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".into()),
            claude_api_url: env::var("CLAUDE_API_URL")
                .unwrap_or_else(|_| DEFAULT_CLAUDE_API_URL.into()),

            summary_max_per_hour: parsed("SUMMARY_MAX_PER_HOUR", "10")?,
            cache_ttl_secs: parsed("CACHE_TTL_SECS", "60")?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            jwt_secret: "test-secret".into(),
            claude_api_key: String::new(),
            claude_model: "claude-test".into(),
            claude_api_url: DEFAULT_CLAUDE_API_URL.into(),
            summary_max_per_hour: 3,
            cache_ttl_secs: 60,
        }
    }
}
