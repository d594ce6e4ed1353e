//! Freeview Play adapter.
//!
//! The guide endpoint returns every service of a region in one payload, so
//! responses are cached per `(region, day)` and shared between sibling
//! channels. Each listing may be enriched by a per-programme detail call.

#![allow(clippy::future_not_send)]

use serde_json::{Map, Value};
use tracing::instrument;

use super::extract::{lookup, text_at, value_as_id};
use crate::cache::CacheKey;
use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};
use crate::model::{Channel, Programme};
use crate::time::{parse_duration, parse_timestamp};

/// Regional guide endpoint.
const GUIDE_URL: &str = "https://www.freeview.co.uk/api/tv-guide";

/// Programme detail endpoint.
const PROGRAM_URL: &str = "https://www.freeview.co.uk/api/program";

/// Cache namespace for regional guide payloads.
pub const SCHEDULE_NAMESPACE: &str = "freeview_schedule";

/// Cache namespace for programme details.
pub const DETAILS_NAMESPACE: &str = "freeview_details";

/// Description used when neither detail nor listing has one.
const FALLBACK_DESCRIPTION: &str = "No further information...";

/// Image sizing suffix appended to artwork URLs.
const IMAGE_SUFFIX: &str = "?w=800";

/// A guide listing whose required fields have been validated.
#[derive(Debug)]
struct Listing<'a> {
    fields: &'a Map<String, Value>,
    title: String,
    start: i64,
    stop: i64,
    start_raw: String,
    duration_raw: String,
    program_id: Option<String>,
}

impl<'a> Listing<'a> {
    /// Validates title, start and duration of a raw listing.
    fn parse(value: &'a Value) -> Result<Self, FetchError> {
        let fields = value
            .as_object()
            .ok_or_else(|| FetchError::invalid("listing is not an object"))?;
        let title =
            text_at(fields, "main_title").ok_or_else(|| FetchError::invalid("missing title"))?;
        let start_value =
            lookup(fields, "start_time").ok_or_else(|| FetchError::invalid("missing start"))?;
        let duration_value =
            lookup(fields, "duration").ok_or_else(|| FetchError::invalid("missing duration"))?;
        let start_raw =
            value_as_id(start_value).ok_or_else(|| FetchError::invalid("blank start"))?;
        let duration_raw =
            value_as_id(duration_value).ok_or_else(|| FetchError::invalid("blank duration"))?;

        let start = parse_timestamp(start_value)?;
        let stop = start
            .checked_add(parse_duration(duration_value)?)
            .ok_or_else(|| FetchError::invalid("stop time overflows"))?;

        Ok(Self {
            fields,
            title,
            start,
            stop,
            start_raw,
            duration_raw,
            program_id: fields.get("program_id").and_then(value_as_id),
        })
    }

    /// Combines the listing with optional detail data.
    fn into_programme(self, channel: &str, details: Option<&Value>) -> Result<Programme, FetchError> {
        let details = details.and_then(Value::as_object);
        let description = details
            .and_then(|d| text_at(d, "synopsis.medium"))
            .or_else(|| text_at(self.fields, "secondary_title"))
            .unwrap_or_else(|| String::from(FALLBACK_DESCRIPTION));
        let icon = details
            .and_then(|d| text_at(d, "image_url"))
            .or_else(|| text_at(self.fields, "fallback_image_url"))
            .map(|url| format!("{url}{IMAGE_SUFFIX}"));

        Ok(Programme::new(channel, self.title, self.start, self.stop)?
            .with_description(Some(description))
            .with_icon(icon))
    }
}

/// Listings of one service within a regional guide payload.
fn listings<'a>(payload: &'a Value, service_id: &str) -> Vec<&'a Value> {
    payload
        .pointer("/data/programs")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|service| {
            service
                .get("service_id")
                .and_then(value_as_id)
                .is_some_and(|id| id == service_id)
        })
        .filter_map(|service| service.get("events").and_then(Value::as_array))
        .flatten()
        .collect()
}

/// Fetches (through the cache) the detail record for one listing.
async fn fetch_details(
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
    region: &str,
    service: &str,
    program_id: &str,
    listing: &Listing<'_>,
) -> Option<Value> {
    let key = CacheKey::new([
        region,
        service,
        program_id,
        listing.start_raw.as_str(),
        listing.duration_raw.as_str(),
    ]);
    let request = HttpRequest::get(PROGRAM_URL)
        .query("sid", service)
        .query("nid", region)
        .query("pid", program_id)
        .query("start_time", &listing.start_raw)
        .query("duration", &listing.duration_raw);
    let payload = ctx.cached_json(DETAILS_NAMESPACE, &key, &request).await?;
    payload.pointer("/data/programs/0").cloned()
}

/// Fetches a Freeview channel's schedule for the run horizon.
///
/// # Errors
///
/// Returns [`FetchError::Configuration`] if the channel lacks a region or
/// provider id.
#[instrument(skip_all, fields(channel = %channel.xmltv_id))]
pub async fn fetch_programmes(
    channel: &Channel,
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
) -> Result<Vec<Programme>, FetchError> {
    let region = channel.require_region_id()?;
    let service = channel.require_provider_id()?;
    let mut programmes = Vec::new();

    for midnight in ctx.utc_midnights() {
        let window = midnight.timestamp().to_string();
        let key = CacheKey::new([region, window.as_str()]);
        let request = HttpRequest::get(GUIDE_URL)
            .query("nid", region)
            .query("start", &window);
        let Some(payload) = ctx.cached_json(SCHEDULE_NAMESPACE, &key, &request).await else {
            tracing::warn!(%window, "Skipping Freeview window");
            continue;
        };

        for raw in listings(&payload, service) {
            let listing = match Listing::parse(raw) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::debug!(%window, error = %e, "Skipping Freeview listing");
                    continue;
                }
            };
            let details = match listing.program_id.clone() {
                Some(pid) => fetch_details(ctx, region, service, &pid, &listing).await,
                None => None,
            };
            match listing.into_programme(&channel.xmltv_id, details.as_ref()) {
                Ok(programme) => programmes.push(programme),
                Err(e) => tracing::debug!(%window, error = %e, "Skipping Freeview listing"),
            }
        }
    }

    tracing::info!(count = programmes.len(), "Fetched Freeview programmes");
    Ok(programmes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use serde_json::json;

    use super::*;
    use crate::testing::{MockHttp, fixed_now};

    const GUIDE_FIXTURE: &str = include_str!("../../../../fixtures/freeview/tv_guide_64257.json");
    const DETAIL_FIXTURE: &str =
        include_str!("../../../../fixtures/freeview/program_crid-news-0600.json");

    /// UTC midnight of the fixed test day.
    const WINDOW: &str = "1704153600";

    fn channel(xmltv_id: &str, provider_id: &str) -> Channel {
        serde_json::from_value(json!({
            "xmltv_id": xmltv_id,
            "src": "freeview",
            "provider_id": provider_id,
            "region_id": 64257,
            "name": xmltv_id
        }))
        .unwrap()
    }

    fn guide_http() -> MockHttp {
        MockHttp::new()
            .route(
                GUIDE_URL,
                &[("nid", "64257"), ("start", WINDOW)],
                serde_json::from_str(GUIDE_FIXTURE).unwrap(),
            )
            .route(
                PROGRAM_URL,
                &[
                    ("sid", "4164"),
                    ("nid", "64257"),
                    ("pid", "crid-news-0600"),
                    ("start_time", "2024-01-02T06:00:00+0000"),
                    ("duration", "PT3H15M"),
                ],
                serde_json::from_str(DETAIL_FIXTURE).unwrap(),
            )
    }

    fn context(http: MockHttp) -> RunContext<MockHttp> {
        RunContext::new(http, chrono_tz::UTC)
            .with_days(1)
            .with_now(fixed_now())
    }

    #[tokio::test]
    async fn test_fetch_programmes_enriches_with_details() {
        // Arrange
        let ctx = context(guide_http());

        // Act
        let programmes = fetch_programmes(&channel("BBCOne.uk", "4164"), &ctx)
            .await
            .unwrap();

        // Assert
        assert_eq!(programmes.len(), 2);
        let breakfast = &programmes[0];
        assert_eq!(breakfast.title(), "Breakfast");
        assert_eq!(breakfast.start(), 1_704_175_200);
        assert_eq!(breakfast.stop(), 1_704_186_900);
        assert_eq!(
            breakfast.description(),
            Some("Sally Nugent and Jon Kay present the latest news, sport, business and weather. [S]")
        );
        assert_eq!(
            breakfast.icon(),
            Some("https://img.freeview.co.uk/detail/breakfast.jpg?w=800")
        );
    }

    #[tokio::test]
    async fn test_listing_without_program_id_uses_fallbacks() {
        // Arrange
        let ctx = context(guide_http());

        // Act
        let programmes = fetch_programmes(&channel("BBCOne.uk", "4164"), &ctx)
            .await
            .unwrap();

        // Assert
        let homes = &programmes[1];
        assert_eq!(homes.title(), "Homes Under the Hammer");
        assert_eq!(homes.description(), Some(FALLBACK_DESCRIPTION));
        assert_eq!(
            homes.icon(),
            Some("https://img.freeview.co.uk/fallback/homes.jpg?w=800")
        );
        assert_eq!(ctx.http().call_count(PROGRAM_URL), 1);
    }

    #[tokio::test]
    async fn test_sibling_channels_share_guide_request() {
        // Arrange
        let ctx = context(guide_http());

        // Act
        let bbc_one = fetch_programmes(&channel("BBCOne.uk", "4164"), &ctx)
            .await
            .unwrap();
        let bbc_two = fetch_programmes(&channel("BBCTwo.uk", "4287"), &ctx)
            .await
            .unwrap();

        // Assert
        assert_eq!(bbc_one.len(), 2);
        assert_eq!(bbc_two.len(), 1);
        assert_eq!(bbc_two[0].channel(), "BBCTwo.uk");
        assert_eq!(ctx.http().call_count(GUIDE_URL), 1);
        assert_eq!(ctx.cache().len(SCHEDULE_NAMESPACE), 1);
    }

    #[tokio::test]
    async fn test_failed_detail_is_cached_as_absent() {
        // Arrange
        let http = MockHttp::new()
            .route(
                GUIDE_URL,
                &[("nid", "64257"), ("start", WINDOW)],
                serde_json::from_str(GUIDE_FIXTURE).unwrap(),
            )
            .route_status(PROGRAM_URL, &[], 500);
        let ctx = context(http);
        let bbc_two = channel("BBCTwo.uk", "4287");

        // Act
        let first = fetch_programmes(&bbc_two, &ctx).await.unwrap();
        let second = fetch_programmes(&bbc_two, &ctx).await.unwrap();

        // Assert
        assert_eq!(first[0].description(), Some("Monty Don in the garden."));
        assert_eq!(first[0].icon(), None);
        assert_eq!(first, second);
        assert_eq!(ctx.http().call_count(PROGRAM_URL), 1);
        assert_eq!(ctx.cache().len(DETAILS_NAMESPACE), 1);
    }

    #[tokio::test]
    async fn test_failed_guide_window_is_skipped() {
        // Arrange
        let http = MockHttp::new().route_status(GUIDE_URL, &[], 502);
        let ctx = context(http);

        // Act
        let programmes = fetch_programmes(&channel("BBCOne.uk", "4164"), &ctx)
            .await
            .unwrap();

        // Assert
        assert!(programmes.is_empty());
    }

    #[tokio::test]
    async fn test_requires_region_id() {
        // Arrange
        let channel: Channel = serde_json::from_value(json!({
            "xmltv_id": "BBCOne.uk",
            "src": "freeview",
            "provider_id": 4164
        }))
        .unwrap();
        let ctx = context(MockHttp::new());

        // Act
        let result = fetch_programmes(&channel, &ctx).await;

        // Assert
        assert!(matches!(result, Err(FetchError::Configuration(_))));
    }
}
