use std::path::Path;
use std::sync::Arc;

use headless_chrome::protocol::cdp::Network;
use headless_chrome::Tab;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

/// Name of the LinkedIn session cookie. Without it profiles redirect to the login wall.
pub const SESSION_COOKIE: &str = "li_at";

/// One entry of a browser cookie export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    cookies: Vec<Cookie>,
}

impl SessionCookies {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn has_session(&self) -> bool {
        self.cookies.iter().any(|c| c.name == SESSION_COOKIE)
    }
}

pub fn parse_cookies(content: &str, path: &str) -> Result<SessionCookies> {
    let cookies: Vec<Cookie> = serde_json::from_str(content).map_err(|source| ScrapeError::CookiesInvalid {
        path: path.to_string(),
        source,
    })?;
    Ok(SessionCookies::new(cookies))
}

pub fn load_cookies(path: &Path) -> Result<SessionCookies> {
    let path_display = path.display().to_string();
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScrapeError::CookiesNotFound { path: path_display });
        }
        Err(e) => return Err(e.into()),
    };

    let cookies = parse_cookies(&content, &path_display)?;
    info!("🍪 Loaded {} cookies from {}", cookies.len(), path_display);
    if cookies.has_session() {
        debug!("Session cookie '{}' present", SESSION_COOKIE);
    } else {
        warn!("Session cookie '{}' not found in {}", SESSION_COOKIE, path_display);
    }
    Ok(cookies)
}

/// Cookie loading never aborts a scrape: failures are logged and the run continues anonymously.
pub fn load_cookies_or_empty(path: Option<&Path>) -> SessionCookies {
    match path {
        None => SessionCookies::default(),
        Some(path) => load_cookies(path).unwrap_or_else(|e| {
            tracing::error!("{}", e);
            SessionCookies::default()
        }),
    }
}

/// CDP rejects a cookie that names neither a url nor a domain, so domainless
/// entries are scoped to the page about to be loaded.
pub fn set_cookie_params(cookie: &Cookie, page_url: &str) -> Network::SetCookie {
    let url = match cookie.domain {
        Some(_) => None,
        None => Some(page_url.to_string()),
    };
    Network::SetCookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        url,
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        secure: Some(cookie.secure),
        http_only: Some(cookie.http_only),
        same_site: None,
        expires: None,
        priority: None,
        same_party: None,
        source_scheme: None,
        source_port: None,
        partition_key: None,
    }
}

/// Injects cookies through CDP. Must run before the first navigation to `page_url`.
pub fn inject_cookies(tab: &Arc<Tab>, cookies: &SessionCookies, page_url: &str) {
    for cookie in cookies.iter() {
        if let Err(e) = tab.call_method(set_cookie_params(cookie, page_url)) {
            warn!("Failed to set cookie {}: {}", cookie.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = r#"[
        {"name": "li_at", "value": "AQEDAT", "domain": ".linkedin.com", "path": "/",
         "expires": 1767225600.5, "httpOnly": true, "secure": true, "sameSite": "None"},
        {"name": "lang", "value": "v=2&lang=en-us"}
    ]"#;

    #[test]
    fn parses_browser_export() {
        let cookies = parse_cookies(EXPORT, "cookies.json").unwrap();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.has_session());

        let first = cookies.iter().next().unwrap();
        assert_eq!(first.domain.as_deref(), Some(".linkedin.com"));
        assert!(first.http_only && first.secure);
        assert_eq!(first.same_site.as_deref(), Some("None"));

        let second = cookies.iter().nth(1).unwrap();
        assert!(second.domain.is_none());
        assert!(!second.secure);
    }

    #[test]
    fn detects_missing_session_cookie() {
        let cookies = parse_cookies(r#"[{"name": "lang", "value": "en"}]"#, "c.json").unwrap();
        assert!(!cookies.has_session());
    }

    #[test]
    fn rejects_non_array() {
        let err = parse_cookies(r#"{"li_at": "x"}"#, "c.json").unwrap_err();
        assert!(matches!(err, ScrapeError::CookiesInvalid { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        let cookies = load_cookies(file.path()).unwrap();
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn missing_file_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cookies(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ScrapeError::CookiesNotFound { .. }));
    }

    #[test]
    fn domainless_cookie_is_scoped_to_page() {
        let cookies = parse_cookies(r#"[{"name": "li_at", "value": "x"}]"#, "c.json").unwrap();
        let cookie = cookies.iter().next().unwrap();
        let params = set_cookie_params(cookie, "https://www.linkedin.com/in/jane");
        assert_eq!(params.url.as_deref(), Some("https://www.linkedin.com/in/jane"));
        assert!(params.domain.is_none());
        assert_eq!(params.name, "li_at");
    }

    #[test]
    fn exported_domain_is_kept() {
        let cookies = parse_cookies(EXPORT, "cookies.json").unwrap();
        let params = set_cookie_params(cookies.iter().next().unwrap(), "https://www.linkedin.com/in/jane");
        assert!(params.url.is_none());
        assert_eq!(params.domain.as_deref(), Some(".linkedin.com"));
        assert_eq!(params.path.as_deref(), Some("/"));
        assert_eq!(params.http_only, Some(true));
    }

    #[test]
    fn fallback_yields_empty_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_cookies_or_empty(Some(&path)).is_empty());
        assert!(load_cookies_or_empty(None).is_empty());
    }
}
