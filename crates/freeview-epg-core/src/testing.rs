//! In-memory HTTP double and fixtures shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::FetchError;
use crate::http::{HttpRequest, HttpResponse, LocalHttpFetch};

/// Reference instant used across adapter tests: 2024-01-02T12:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()
}

#[derive(Debug)]
struct Route {
    url: String,
    query: Vec<(String, String)>,
    status: u16,
    body: String,
}

/// Canned-response transport. A request matches a route when the URL is
/// equal and every route query pair is present; the most specific match
/// wins. Unmatched requests fail with a network error.
#[derive(Debug, Default)]
pub struct MockHttp {
    routes: Vec<Route>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_body(mut self, url: &str, query: &[(&str, &str)], status: u16, body: &str) -> Self {
        self.routes.push(Route {
            url: String::from(url),
            query: query
                .iter()
                .map(|(k, v)| (String::from(*k), String::from(*v)))
                .collect(),
            status,
            body: String::from(body),
        });
        self
    }

    pub fn route(self, url: &str, query: &[(&str, &str)], json: Value) -> Self {
        self.route_body(url, query, 200, &json.to_string())
    }

    pub fn route_status(self, url: &str, query: &[(&str, &str)], status: u16) -> Self {
        self.route_body(url, query, status, "")
    }

    /// Number of requests issued to `url`, regardless of query.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// All requests issued so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl LocalHttpFetch for MockHttp {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        let matched = self
            .routes
            .iter()
            .filter(|route| {
                route.url == request.url && route.query.iter().all(|q| request.query.contains(q))
            })
            .max_by_key(|route| route.query.len());
        matched.map_or_else(
            || {
                Err(FetchError::Network(format!(
                    "no route for {} {:?}",
                    request.url, request.query
                )))
            },
            |route| {
                Ok(HttpResponse {
                    status: route.status,
                    body: route.body.clone(),
                })
            },
        )
    }
}
