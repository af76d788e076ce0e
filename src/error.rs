// src/error.rs
// =============================================================================
// Error types for the crawl engine.
//
// Two layers:
// - HttpError: the HTTP collaborator failed to produce a response at all
// - CrawlError: anything that stops one work unit from finishing
//
// The application edge (main, config, login) uses anyhow instead, the same
// way the rest of the binary propagates errors with `?`.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Failure of the underlying HTTP client (no response was received).
#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection, TLS, timeout or body read failure inside reqwest
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// Any other client failure (used by the mock client)
    #[cfg(test)]
    #[error("{0}")]
    Other(String),
}

/// Everything that can stop a single work unit.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("gave up on {url} after {attempts} attempts (last status {status})")]
    RetriesExhausted { url: String, attempts: u32, status: u16 },

    #[error("too many redirects starting at {url}")]
    TooManyRedirects { url: String },

    #[error("redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("filepath requested for {name:?} before any request was made")]
    RequestNotMade { name: String },

    #[error("unknown url for forum: {url}")]
    UnknownForumUrl { url: String },

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrawlError {
    // Errors that mean the portal changed in a way the crawler does not
    // understand. They are never downgraded to a silent drop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::UnknownForumUrl { .. })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }
}
