use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::cookies::{self, SessionCookies};
use crate::error::{classify_browser_error, Result};
use crate::stealth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    SearchResults,
    Profile,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::SearchResults => "search",
            FetchKind::Profile => "profile",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub kind: FetchKind,
    /// 1-based attempt number, used for debug artifacts.
    pub attempt: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, kind: FetchKind, attempt: u32) -> Self {
        Self {
            url: url.into(),
            kind,
            attempt,
        }
    }

    /// Search pages are fetched anonymously; profiles carry the session.
    pub fn uses_session(&self) -> bool {
        self.kind == FetchKind::Profile
    }
}

/// A page after JavaScript ran, as the browser saw it.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub requested_url: String,
    pub final_url: String,
    pub html: String,
}

/// Loads one page in a fresh browser session. Implementations block.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage>;
}

pub struct ChromeFetcher {
    config: ScrapeConfig,
    cookies: SessionCookies,
}

impl ChromeFetcher {
    pub fn new(config: ScrapeConfig) -> Self {
        let cookies = cookies::load_cookies_or_empty(config.cookies_file.as_deref());
        Self { config, cookies }
    }

    pub fn with_cookies(config: ScrapeConfig, cookies: SessionCookies) -> Self {
        Self { config, cookies }
    }

    fn launch(&self, user_agent: &str) -> Result<Browser> {
        let arg_strings = stealth::launch_args(user_agent);
        let args: Vec<&OsStr> = arg_strings.iter().map(|a| OsStr::new(a.as_str())).collect();

        Browser::new(LaunchOptions {
            headless: self.config.headless,
            window_size: Some((1920, 1080)),
            idle_browser_timeout: self.config.page_timeout + Duration::from_secs(30),
            args,
            ..Default::default()
        })
        .map_err(|e| classify_browser_error(e, "launch browser"))
    }

    fn prepare_tab(&self, tab: &Arc<Tab>, request: &FetchRequest) -> Result<()> {
        tab.set_default_timeout(self.config.page_timeout);

        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: stealth::STEALTH_SCRIPT.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(|e| classify_browser_error(e, "inject stealth script"))?;

        if request.uses_session() && !self.cookies.is_empty() {
            debug!("🍪 Injecting {} cookies", self.cookies.len());
            cookies::inject_cookies(tab, &self.cookies, &request.url);
        }
        Ok(())
    }

    fn save_debug_artifacts(&self, dir: &Path, tab: &Arc<Tab>, request: &FetchRequest, html: &str) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create debug dir {}: {}", dir.display(), e);
            return;
        }
        let stem = artifact_stem(request);

        match tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true) {
            Ok(png) => {
                let path = dir.join(format!("{}.png", stem));
                if let Err(e) = std::fs::write(&path, png) {
                    warn!("Failed to write screenshot {}: {}", path.display(), e);
                } else {
                    debug!("Screenshot saved to {}", path.display());
                }
            }
            Err(e) => warn!("Screenshot failed: {}", e),
        }

        let path = dir.join(format!("{}.html", stem));
        if let Err(e) = std::fs::write(&path, html) {
            warn!("Failed to write page HTML {}: {}", path.display(), e);
        }
    }
}

/// Filesystem-safe label for a URL: the profile handle, else the search terms.
fn artifact_slug(url: &str) -> String {
    let raw = if let Some((_, rest)) = url.split_once("/in/") {
        rest.split(['/', '?', '#']).next().unwrap_or(rest)
    } else if let Some((_, rest)) = url.split_once("q=") {
        rest.split('&').next().unwrap_or(rest)
    } else {
        url
    };
    let slug: String = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(60)
        .collect();
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "page".to_string()
    } else {
        slug.to_string()
    }
}

/// Workers run concurrently, so the stem names the URL as well as the attempt.
fn artifact_stem(request: &FetchRequest) -> String {
    format!(
        "{}_{}_attempt_{}",
        request.kind.as_str(),
        artifact_slug(&request.url),
        request.attempt
    )
}

impl PageFetcher for ChromeFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage> {
        let user_agent = stealth::random_user_agent();
        info!(
            "🌐 [{}] attempt {}: {} (UA: {})",
            request.kind.as_str(),
            request.attempt,
            request.url,
            user_agent
        );

        // Dropping the browser at the end of this call tears the session down.
        let browser = self.launch(user_agent)?;
        let tab = browser
            .new_tab()
            .map_err(|e| classify_browser_error(e, "open tab"))?;
        self.prepare_tab(&tab, request)?;

        tab.navigate_to(&request.url)
            .map_err(|e| classify_browser_error(e, "navigate"))?;
        tab.wait_until_navigated()
            .map_err(|e| classify_browser_error(e, "wait for navigation"))?;

        // Ads and trackers often keep the load event pending, the body is enough.
        if let Err(e) = tab.wait_for_element_with_custom_timeout("body", self.config.page_timeout) {
            warn!("Body wait timed out on {}: {}. Reading page anyway", request.url, e);
        }

        std::thread::sleep(self.config.settle_delay.sample());

        let html = tab
            .get_content()
            .map_err(|e| classify_browser_error(e, "read page content"))?;
        let final_url = tab.get_url();
        debug!("Rendered {} bytes from {}", html.len(), final_url);

        if let Some(dir) = self.config.debug_dir.as_deref() {
            self.save_debug_artifacts(dir, &tab, request, &html);
        }

        Ok(RenderedPage {
            requested_url: request.url.clone(),
            final_url,
            html,
        })
    }
}
