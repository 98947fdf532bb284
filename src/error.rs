//! Error taxonomy for the scraping pipeline.
//!
//! Command-level code uses `anyhow`; everything below the orchestrator
//! returns [`ScrapeError`] so the run loop can decide per variant whether a
//! failure skips one item or aborts the run.

use thiserror::Error;

/// A listed or extracted article failed field validation.
///
/// Always handled as a single-item skip.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{field} exceeds maximum length of {max}")]
    TooLong { field: &'static str, max: usize },
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network failure, timeout or non-success HTTP status.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote API answered but reported a failure in its envelope.
    #[error("remote API error: {0}")]
    Api(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A site extractor could not make sense of a page.
    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// An endpoint needs the anti-forgery token and none was captured.
    #[error("no CSRF token captured for this session")]
    CsrfMissing,

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ScrapeError {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        ScrapeError::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeError::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Connectivity-class failures: the remote side could not be reached
    /// or answered with an error.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScrapeError::Transport { .. } | ScrapeError::Api(_))
    }
}
