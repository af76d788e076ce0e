// src/http/mock.rs
// =============================================================================
// Canned HTTP client for tests.
//
// Each URL has a queue of responses. Responses are served in order and the
// last one sticks, so a single registered page can be fetched any number of
// times. Unknown URLs answer 404.
// =============================================================================

use super::{HttpClient, Response};
use crate::error::HttpError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockClient {
    routes: Mutex<HashMap<String, VecDeque<Response>>>,
    posts: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: Response) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.respond(url, html(url, body))
    }

    pub fn on_post(self, url: &str, response: Response) -> Self {
        self.posts
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn get(&self, url: &str, _timeout: Option<Duration>) -> Result<Response, HttpError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| status(url, 404)))
    }

    async fn post(&self, url: &str, _form: &[(&str, &str)]) -> Result<Response, HttpError> {
        self.calls.lock().unwrap().push(url.to_string());

        match self.posts.lock().unwrap().get(url) {
            Some(response) => Ok(response.clone()),
            None => Err(HttpError::Other(format!("no POST route for {url}"))),
        }
    }
}

pub fn build(url: &str, status: u16, headers: &[(&'static str, &str)], body: &[u8]) -> Response {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }

    Response {
        url: url.to_string(),
        status,
        headers: map,
        body: body.to_vec(),
    }
}

pub fn html(url: &str, body: &str) -> Response {
    build(
        url,
        200,
        &[("content-type", "text/html; charset=utf-8")],
        body.as_bytes(),
    )
}

pub fn file(url: &str, content_type: &str, body: &[u8]) -> Response {
    build(url, 200, &[("content-type", content_type)], body)
}

pub fn status(url: &str, code: u16) -> Response {
    build(url, code, &[("content-type", "text/html")], b"")
}

pub fn redirect(url: &str, location: &str) -> Response {
    build(
        url,
        303,
        &[("content-type", "text/html"), ("location", location)],
        b"",
    )
}
