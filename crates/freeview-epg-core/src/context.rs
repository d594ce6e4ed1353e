//! Per-run shared state handed to every adapter call.

#![allow(clippy::future_not_send)]

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::cache::{CacheKey, RunCache};
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};

/// Default day horizon.
pub const DEFAULT_DAYS: u32 = 7;

/// Default output timezone.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::London;

/// Run context: HTTP capability, timezone, horizon, reference instant and
/// the run cache.
#[derive(Debug)]
pub struct RunContext<H> {
    http: H,
    tz: Tz,
    days: u32,
    now: DateTime<Utc>,
    cache: RunCache,
}

impl<H> RunContext<H> {
    /// Creates a context with the default horizon and `now` captured from
    /// the system clock.
    pub fn new(http: H, tz: Tz) -> Self {
        Self {
            http,
            tz,
            days: DEFAULT_DAYS,
            now: Utc::now(),
            cache: RunCache::new(),
        }
    }

    /// Sets the day horizon.
    #[must_use]
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    /// Overrides the reference instant.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// HTTP capability.
    pub const fn http(&self) -> &H {
        &self.http
    }

    /// Output timezone.
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Day horizon.
    pub const fn days(&self) -> u32 {
        self.days
    }

    /// Reference instant for the run.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Run cache.
    pub const fn cache(&self) -> &RunCache {
        &self.cache
    }

    /// UTC midnights from today through `days - 1` days ahead.
    pub fn utc_midnights(&self) -> Vec<DateTime<Utc>> {
        let today = self.now.date_naive();
        self.dates_from(today)
            .into_iter()
            .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            .collect()
    }

    /// Calendar dates in the run timezone from today through `days - 1`.
    pub fn local_dates(&self) -> Vec<NaiveDate> {
        let today = self.now.with_timezone(&self.tz).date_naive();
        self.dates_from(today)
    }

    fn dates_from(&self, first: NaiveDate) -> Vec<NaiveDate> {
        (0..self.days)
            .filter_map(|offset| first.checked_add_days(Days::new(u64::from(offset))))
            .collect()
    }
}

impl<H: LocalHttpFetch + Sync> RunContext<H> {
    /// Executes a request and decodes a successful JSON response.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] on transport failure.
    /// - [`FetchError::Status`] on a non-success status.
    /// - [`FetchError::MalformedPayload`] if the body is not JSON.
    pub async fn fetch_json(&self, request: &HttpRequest) -> Result<Value, FetchError> {
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                url: request.url.clone(),
            });
        }
        response.json()
    }

    /// Fetches JSON through the run cache.
    ///
    /// The first caller for `(namespace, key)` issues the request; a failure
    /// is logged and cached as `None`.
    pub async fn cached_json(
        &self,
        namespace: &str,
        key: &CacheKey,
        request: &HttpRequest,
    ) -> Option<Arc<Value>> {
        self.cache
            .get_or_compute(namespace, key, || async {
                match self.fetch_json(request).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(
                            %namespace,
                            %key,
                            url = %request.url,
                            error = %e,
                            "Lookup failed, caching as absent"
                        );
                        None
                    }
                }
            })
            .await
    }
}
