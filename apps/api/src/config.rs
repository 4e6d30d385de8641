use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ingest::extractor::ExtractionPlan;
use crate::ingest::identity::IdentityPolicy;
use crate::ingest::parser::{CompiledSelectors, ListingSelectors};
use crate::ingest::source::{BrowserSettings, DEFAULT_USER_AGENT};
use crate::ingest::wait::WaitPolicy;

/// Software Engineer roles in the United States posted in the last 24 hours.
pub const DEFAULT_LISTING_SOURCE_URL: &str = "https://www.linkedin.com/jobs/search/?keywords=Software%20Engineer&location=United%20States&f_TPR=r86400&geoId=103644278&refresh=true";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub port: u16,
    pub rust_log: String,
    pub identity_policy: IdentityPolicy,
    pub dedupe_source_urls: bool,
    pub extraction: ExtractionPlan,
    pub browser: BrowserSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let poll_interval = Duration::from_millis(parse_env("POLL_INTERVAL_MS", 250)?);
        let poll_max_interval = Duration::from_millis(parse_env("POLL_MAX_INTERVAL_MS", 2000)?);
        let wait = |timeout_secs: u64| {
            WaitPolicy::new(
                Duration::from_secs(timeout_secs),
                poll_interval,
                poll_max_interval,
            )
        };

        let selectors = CompiledSelectors::compile(&ListingSelectors::default())?;
        let max_pages: u32 = parse_env("MAX_PAGES", 3)?;
        if max_pages == 0 {
            anyhow::bail!("MAX_PAGES must be at least 1");
        }

        let extraction = ExtractionPlan {
            target_url: optional_env("LISTING_SOURCE_URL")
                .unwrap_or_else(|| DEFAULT_LISTING_SOURCE_URL.to_string()),
            max_pages,
            listings_per_page: parse_env("LISTINGS_PER_PAGE", 25)?,
            navigation_timeout: Duration::from_secs(parse_env("NAVIGATION_TIMEOUT_SECS", 60)?),
            selector_wait: wait(parse_env("SELECTOR_TIMEOUT_SECS", 20)?),
            settle_wait: wait(parse_env("SETTLE_TIMEOUT_SECS", 5)?),
            selectors,
        };

        let identity_policy = IdentityPolicy::from_settings(
            &optional_env("ANONYMOUS_RUNS").unwrap_or_else(|| "reject".to_string()),
            optional_env("BATCH_ACTOR_ID").as_deref(),
        )?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            supabase_url: require_env("SUPABASE_URL")?,
            supabase_service_role_key: require_env("SUPABASE_SERVICE_ROLE_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            identity_policy,
            dedupe_source_urls: parse_env("DEDUPE_SOURCE_URLS", true)?,
            extraction,
            browser: BrowserSettings {
                executable: optional_env("CHROME_EXECUTABLE"),
                user_agent: optional_env("SCRAPER_USER_AGENT")
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_value(key, optional_env(key).as_deref(), default)
}

fn parse_value<T>(key: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
