use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("language model error: {0}")]
    Llm(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("challenge page served for {url}")]
    Challenge { url: String },

    #[error("redirected to login wall while loading {url}")]
    LoginWall { url: String },

    #[error("missing profile elements on {url}: {}", .missing.join(", "))]
    MissingElements { url: String, missing: Vec<&'static str> },

    #[error("cookie file {path} not found")]
    CookiesNotFound { path: String },

    #[error("cookie file {path} is not a valid cookie array: {source}")]
    CookiesInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<ScrapeError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ScrapeError {
    /// Page loaded but is unusable. Retrying would produce the same page.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::LoginWall { .. } | Self::MissingElements { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Navigation(_) | Self::Browser(_) | Self::Challenge { .. } | Self::Http(_)
        )
    }
}

/// Headless Chrome reports everything through `anyhow`, so the kind is read off the message.
pub fn classify_browser_error(e: impl std::fmt::Display, action: &str) -> ScrapeError {
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ScrapeError::Navigation(format!("{} timed out: {}", action, s))
    } else if lower.contains("navigat") || lower.contains("net::err") {
        ScrapeError::Navigation(format!("{} navigation failed: {}", action, s))
    } else {
        ScrapeError::Browser(format!("{} failed: {}", action, s))
    }
}
