//! Harvesting candidate profile links from a search-engine results page.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::browser::RenderedPage;
use crate::error::{Result, ScrapeError};

pub const SEARCH_ENDPOINT: &str = "https://www.google.com/search";

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap_or_else(|e| panic!("{e:?}")));

static PROFILE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www|[a-z]{2})\.linkedin\.com/in/[A-Za-z0-9\-_%]+/?$")
        .unwrap_or_else(|e| panic!("{e}"))
});

static REDIRECT_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&](?:q|url)=(https?[^&]+)").unwrap_or_else(|e| panic!("{e}")));

const CHALLENGE_PATTERNS: &[&str] = &[
    "unusual traffic",
    "automated queries",
    "automated requests",
    "not a robot",
    "recaptcha",
    "hcaptcha",
    "/sorry/index",
];

pub fn search_url(query: &str) -> String {
    format!("{}?q={}", SEARCH_ENDPOINT, urlencoding::encode(query))
}

/// Unwraps `/url?q=<target>&...` style redirects. Other hrefs pass through.
pub fn decode_redirect(href: &str) -> String {
    if let Some(caps) = REDIRECT_TARGET.captures(href) {
        if href.starts_with("/url") || href.contains("google.") {
            let target = &caps[1];
            return urlencoding::decode(target)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| target.to_string());
        }
    }
    href.to_string()
}

pub fn is_profile_url(url: &str) -> bool {
    PROFILE_URL.is_match(url)
}

/// Collects up to `max` distinct profile URLs, in page order.
pub fn extract_profile_links(html: &str, max: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR) {
        if links.len() >= max {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains("linkedin.com/in/") {
            continue;
        }
        let url = decode_redirect(href);
        if is_profile_url(&url) && seen.insert(url.clone()) {
            tracing::debug!("Profile link found: {}", url);
            links.push(url);
        }
    }
    links
}

pub fn detect_challenge(html: &str) -> bool {
    let lower = html.to_lowercase();
    CHALLENGE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Turns a rendered results page into links, or fails if the engine served a challenge.
pub fn harvest_page(page: &RenderedPage, max: usize) -> Result<Vec<String>> {
    let links = extract_profile_links(&page.html, max);
    if links.is_empty() && (detect_challenge(&page.html) || page.final_url.contains("/sorry/")) {
        return Err(ScrapeError::Challenge {
            url: page.requested_url.clone(),
        });
    }
    Ok(links)
}
