use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::error::{Result, ScrapeError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Inclusive range a random pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = (self.max.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: 300,
            temperature: 0.5,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Size of the profile worker pool.
    pub workers: usize,
    /// Cap on links harvested from one results page.
    pub max_links: usize,
    pub attempts: u32,
    pub page_timeout: Duration,
    /// Pause after a page settles, before reading it.
    pub settle_delay: DelayRange,
    /// Pause between failed attempts.
    pub retry_backoff: DelayRange,
    pub headless: bool,
    pub cookies_file: Option<PathBuf>,
    pub debug_dir: Option<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_links: 20,
            attempts: 3,
            page_timeout: Duration::from_secs(60),
            settle_delay: DelayRange::from_secs(2, 5),
            retry_backoff: DelayRange::from_secs(5, 10),
            headless: true,
            cookies_file: Some(PathBuf::from("cookies.json")),
            debug_dir: None,
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ScrapeError::Config("worker count must be at least 1".into()));
        }
        if self.attempts == 0 {
            return Err(ScrapeError::Config("attempt count must be at least 1".into()));
        }
        if self.max_links == 0 {
            return Err(ScrapeError::Config("max links must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub scrape: ScrapeConfig,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut llm = LlmSettings::default();
        llm.api_key = get("OPENAI_API_KEY");
        if let Some(base) = get("OPENAI_BASE_URL") {
            llm.base_url = base;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            llm.model = model;
        }

        let mut scrape = ScrapeConfig::default();
        if let Some(path) = get("COOKIES_FILE") {
            scrape.cookies_file = Some(PathBuf::from(path));
        }
        if let Some(v) = get("SCRAPER_WORKERS") {
            scrape.workers = parse_number("SCRAPER_WORKERS", &v)?;
        }
        if let Some(v) = get("SCRAPER_MAX_LINKS") {
            scrape.max_links = parse_number("SCRAPER_MAX_LINKS", &v)?;
        }
        if let Some(v) = get("SCRAPER_ATTEMPTS") {
            scrape.attempts = parse_number("SCRAPER_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("PAGE_TIMEOUT_SECS") {
            scrape.page_timeout = Duration::from_secs(parse_number("PAGE_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("SCRAPER_HEADLESS") {
            scrape.headless = parse_bool("SCRAPER_HEADLESS", &v)?;
        }
        scrape.debug_dir = get("SCRAPER_DEBUG_DIR").map(PathBuf::from);
        scrape.validate()?;

        let port = match get("PORT") {
            Some(v) => parse_number("PORT", &v)?,
            None => 3000,
        };

        Ok(Self { llm, scrape, port })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ScrapeError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScrapeError::Config(format!("{} must be true or false, got '{}'", key, value))),
    }
}
