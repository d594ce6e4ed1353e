//! Freesat TV guide adapter.
//!
//! Listings are requested per day offset. The guide serves regional
//! variants based on a session cookie set by posting a postcode, so a
//! channel with a postcode primes the region first.

#![allow(clippy::future_not_send)]

use serde_json::Value;
use tracing::instrument;

use super::extract::{lookup, text_at};
use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};
use crate::model::{Channel, Programme};
use crate::time::{parse_duration, parse_timestamp};

/// Guide endpoint; `/{day_offset}` is appended for listings.
const API_URL: &str = "https://www.freesat.co.uk/tv-guide/api";

/// Region selection endpoint.
const REGION_URL: &str = "https://www.freesat.co.uk/tv-guide/api/region";

/// Artwork host; the listing's image path is appended.
const IMAGE_BASE: &str = "https://fdp-sv15-image-v1-0.gcprod1.freetime-platform.net/270x180-0";

/// The guide API answers browser-like requests only.
const BROWSER_HEADERS: [(&str, &str); 13] = [
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-GB,en-US;q=0.9,en;q=0.8"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
    ("user-agent", "Mozilla/5.0"),
];

/// Posts the postcode and loads the regional channel list.
///
/// The region lives in the shared session cookie, so this runs before every
/// channel that names a postcode. Failures are logged and ignored.
async fn prime_region(ctx: &RunContext<impl LocalHttpFetch + Sync>, postcode: &str) {
    let post = HttpRequest::post(REGION_URL, postcode).headers(&BROWSER_HEADERS);
    if let Err(e) = ctx.http().execute(&post).await {
        tracing::warn!(%postcode, error = %e, "Freesat region selection failed");
        return;
    }
    let channels = HttpRequest::get(API_URL)
        .query("post_code", postcode)
        .headers(&BROWSER_HEADERS);
    if let Err(e) = ctx.http().execute(&channels).await {
        tracing::warn!(%postcode, error = %e, "Freesat channel list request failed");
    }
}

/// Events of the first channel block; empty when the block is missing.
fn events(payload: &Value) -> &[Value] {
    payload
        .as_array()
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("event"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Converts one Freesat event into a programme.
pub(crate) fn parse_event(event: &Value, channel: &str) -> Result<Programme, FetchError> {
    let event = event
        .as_object()
        .ok_or_else(|| FetchError::invalid("event is not an object"))?;
    let title = text_at(event, "name").ok_or_else(|| FetchError::invalid("missing title"))?;
    let start = lookup(event, "startTime")
        .ok_or_else(|| FetchError::invalid("missing start"))
        .and_then(parse_timestamp)?;
    let duration = match lookup(event, "duration") {
        None | Some(Value::Null) => 0,
        Some(value) => parse_duration(value)?,
    };
    let stop = start
        .checked_add(duration)
        .ok_or_else(|| FetchError::invalid("stop time overflows"))?;
    let icon = text_at(event, "image").map(|path| format!("{IMAGE_BASE}{path}"));

    Ok(Programme::new(channel, title, start, stop)?
        .with_description(text_at(event, "description"))
        .with_icon(icon))
}

/// Fetches a Freesat channel's schedule for the run horizon.
///
/// # Errors
///
/// Returns [`FetchError::Configuration`] if the channel has no provider id.
#[instrument(skip_all, fields(channel = %channel.xmltv_id))]
pub async fn fetch_programmes(
    channel: &Channel,
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
) -> Result<Vec<Programme>, FetchError> {
    let provider_id = channel.require_provider_id()?;
    if let Some(postcode) = channel.postcode.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        prime_region(ctx, postcode).await;
    }

    let mut programmes = Vec::new();
    for offset in 0..ctx.days() {
        let request = HttpRequest::get(format!("{API_URL}/{offset}"))
            .query("channel", provider_id)
            .headers(&BROWSER_HEADERS);
        let payload = match ctx.fetch_json(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(window = offset, error = %e, "Skipping Freesat window");
                continue;
            }
        };

        for event in events(&payload) {
            match parse_event(event, &channel.xmltv_id) {
                Ok(programme) => programmes.push(programme),
                Err(e) => tracing::debug!(window = offset, error = %e, "Skipping Freesat event"),
            }
        }
    }

    tracing::info!(count = programmes.len(), "Fetched Freesat programmes");
    Ok(programmes)
}
