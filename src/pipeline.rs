use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::{FetchKind, FetchRequest, PageFetcher, RenderedPage};
use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::harvest;
use crate::profile::{self, Profile};

/// Profiles that made it through, plus how many URLs were dropped.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub profiles: Vec<Profile>,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub query: String,
    pub links_found: usize,
    pub failed: usize,
    pub profiles: Vec<Profile>,
}

#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    config: ScrapeConfig,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: ScrapeConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    async fn fetch(&self, request: FetchRequest) -> Result<RenderedPage> {
        let fetcher = Arc::clone(&self.fetcher);
        tokio::task::spawn_blocking(move || fetcher.fetch(&request))
            .await
            .map_err(|e| ScrapeError::Browser(format!("browser worker died: {}", e)))?
    }

    /// Runs `step` until it succeeds, fails softly, or runs out of attempts.
    async fn with_retries<T, F, Fut>(&self, url: &str, mut step: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = self.config.attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            match step(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    error!("❌ {} attempt {}/{} failed: {}", url, attempt, attempts, e);
                    last = Some(e);
                    if attempt < attempts {
                        let wait = self.config.retry_backoff.sample();
                        info!("⏳ Waiting {:.1}s before retrying {}", wait.as_secs_f64(), url);
                        sleep(wait).await;
                    }
                }
            }
        }

        let last = last.unwrap_or_else(|| ScrapeError::Browser("no attempt was made".into()));
        Err(ScrapeError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last),
        })
    }

    /// Loads the results page for `query` and returns candidate profile URLs.
    /// Never fails: a results page that cannot be loaded yields no links.
    pub async fn harvest(&self, query: &str) -> Vec<String> {
        let url = harvest::search_url(query);
        info!("🔎 Harvesting profile links for: {}", query);

        let max = self.config.max_links;
        let outcome = self
            .with_retries(&url, |attempt| {
                let request = FetchRequest::new(url.clone(), FetchKind::SearchResults, attempt);
                async move {
                    let page = self.fetch(request).await?;
                    harvest::harvest_page(&page, max)
                }
            })
            .await;

        match outcome {
            Ok(links) if links.is_empty() => {
                warn!("No profile links found for: {}", query);
                links
            }
            Ok(links) => {
                info!("Found {} profile links", links.len());
                links
            }
            Err(e) => {
                error!("Link harvest failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Scrapes one profile, retrying navigation failures with a randomized back-off.
    pub async fn extract_profile(&self, url: &str) -> Result<Profile> {
        let result = self
            .with_retries(url, |attempt| {
                let request = FetchRequest::new(url, FetchKind::Profile, attempt);
                async move {
                    let page = self.fetch(request).await?;
                    profile::parse_profile(&page)
                }
            })
            .await;

        match &result {
            Ok(_) => info!("✅ Profile extracted: {}", url),
            Err(e) if e.is_soft() => warn!("Skipping profile: {}", e),
            Err(e) => error!("Dropping profile: {}", e),
        }
        result
    }

    /// Scrapes every URL on a bounded worker pool. One failure never affects the others.
    pub async fn extract_all(&self, links: Vec<String>) -> ExtractionOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut set = JoinSet::new();

        for (index, url) in links.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = self.clone();
            set.spawn(async move {
                // Never closed, so acquiring only waits for a free worker slot.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, pipeline.extract_profile(&url).await)
            });
        }

        let mut collected = Vec::new();
        let mut failed = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(profile))) => collected.push((index, profile)),
                Ok((_, Err(_))) => failed += 1,
                Err(e) => {
                    error!("Profile worker panicked: {}", e);
                    failed += 1;
                }
            }
        }

        collected.sort_by_key(|(index, _)| *index);
        ExtractionOutcome {
            profiles: collected.into_iter().map(|(_, p)| p).collect(),
            failed,
        }
    }

    pub async fn run(&self, query: &str) -> RunSummary {
        let links = self.harvest(query).await;
        let links_found = links.len();
        if links.is_empty() {
            return RunSummary {
                query: query.to_string(),
                links_found,
                failed: 0,
                profiles: Vec::new(),
            };
        }

        let outcome = self.extract_all(links).await;
        info!(
            "Run finished: {} profiles, {} dropped, {} links",
            outcome.profiles.len(),
            outcome.failed,
            links_found
        );
        RunSummary {
            query: query.to_string(),
            links_found,
            failed: outcome.failed,
            profiles: outcome.profiles,
        }
    }
}
