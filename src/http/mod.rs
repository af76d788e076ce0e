// src/http/mod.rs
// =============================================================================
// The HTTP collaborator used by the crawler.
//
// The engine only talks to the `HttpClient` trait, so the same state machine
// runs against reqwest in production and against a canned client in tests.
//
// Redirects are NOT followed by reqwest: the engine sees every 3xx and decides
// what to do with the Location header itself.
// =============================================================================

pub mod retry;

#[cfg(test)]
pub mod mock;

use crate::error::HttpError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

pub use retry::{get_with_retry, RetryPolicy};

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// URL that produced this response
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    // Empty string when the server did not send a Content-Type
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    /// Length used by the dedup cache: the Content-Length header when the
    /// server sent one, otherwise the number of bytes actually received.
    pub fn content_length(&self) -> u64 {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.body.len() as u64)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP surface the crawler needs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<Response, HttpError>;

    async fn post(&self, url: &str, form: &[(&str, &str)]) -> Result<Response, HttpError>;
}

// reqwest-backed client holding the session cookies
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .timeout(timeout)
            .user_agent(concat!("vcd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<Response, HttpError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        read_response(request.send().await?).await
    }

    async fn post(&self, url: &str, form: &[(&str, &str)]) -> Result<Response, HttpError> {
        let response = self.client.post(url).form(form).send().await?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<Response, HttpError> {
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(Response {
        url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::mock;

    #[test]
    fn test_content_length_prefers_header() {
        let mut response = mock::file("https://campus/a.pdf", "application/pdf", b"12345");
        assert_eq!(response.content_length(), 5);

        response
            .headers
            .insert("content-length", "42".parse().unwrap());
        assert_eq!(response.content_length(), 42);

        response.headers.remove("content-length");
        assert_eq!(response.content_length(), 5);
    }

    #[test]
    fn test_redirect_range() {
        assert!(mock::redirect("https://campus/a", "https://campus/b").is_redirect());
        assert!(!mock::html("https://campus/a", "<p></p>").is_redirect());
    }
}
