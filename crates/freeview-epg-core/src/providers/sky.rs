//! Sky schedule adapter.
//!
//! One request per local calendar day; each response carries a single
//! channel's events with epoch start times and durations in seconds.

#![allow(clippy::future_not_send)]

use serde_json::{Map, Value};
use tracing::instrument;

use super::extract::{first_text, is_truthy, lookup, positive_int, text_at};
use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};
use crate::model::{Channel, Programme};
use crate::time::{parse_duration, parse_timestamp};

/// Schedule endpoint; `/{YYYYMMDD}/{provider_id}` is appended.
const SCHEDULE_URL: &str = "https://awk.epgsky.com/hawk/linear/schedule";

/// Artwork endpoint; `/{uuid}/cover` is appended.
const IMAGE_URL: &str = "https://images.metadata.sky.com/pd-image";

/// Artwork identifiers, most specific first.
const ICON_KEYS: [&str; 3] = ["programmeuuid", "seasonuuid", "seriesuuid"];

/// Title prefix Sky uses to flag premieres.
const NEW_PREFIX: &str = "New:";

/// Fetches a Sky channel's schedule for the run horizon.
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
    let mut programmes = Vec::new();

    for date in ctx.local_dates() {
        let window = date.format("%Y%m%d").to_string();
        let request = HttpRequest::get(format!("{SCHEDULE_URL}/{window}/{provider_id}"));
        let payload = match ctx.fetch_json(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%window, error = %e, "Skipping Sky window");
                continue;
            }
        };

        for event in events(&payload) {
            match parse_event(event, &channel.xmltv_id) {
                Ok(programme) => programmes.push(programme),
                Err(e) => tracing::debug!(%window, error = %e, "Skipping Sky event"),
            }
        }
    }

    tracing::info!(count = programmes.len(), "Fetched Sky programmes");
    Ok(programmes)
}

/// Events of the first schedule block; empty when the block is missing.
fn events(payload: &Value) -> &[Value] {
    payload
        .get("schedule")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("events"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Builds the cover URL from the most specific artwork id.
fn icon_url(event: &Map<String, Value>) -> Option<String> {
    first_text(event, &ICON_KEYS).map(|uuid| format!("{IMAGE_URL}/{uuid}/cover"))
}

/// Converts one Sky event into a programme.
pub(crate) fn parse_event(event: &Value, channel: &str) -> Result<Programme, FetchError> {
    let event = event
        .as_object()
        .ok_or_else(|| FetchError::invalid("event is not an object"))?;
    let title = text_at(event, "t").ok_or_else(|| FetchError::invalid("missing title"))?;
    let start = lookup(event, "st")
        .ok_or_else(|| FetchError::invalid("missing start"))
        .and_then(parse_timestamp)?;
    let duration = lookup(event, "d")
        .ok_or_else(|| FetchError::invalid("missing duration"))
        .and_then(parse_duration)?;
    let stop = start
        .checked_add(duration)
        .ok_or_else(|| FetchError::invalid("stop time overflows"))?;

    let premiere = is_truthy(event.get("new")) || title.starts_with(NEW_PREFIX);
    let season = event.get("seasonnumber").and_then(positive_int);
    let episode = event.get("episodenumber").and_then(positive_int);

    Ok(Programme::new(channel, title, start, stop)?
        .with_description(text_at(event, "sy"))
        .with_icon(icon_url(event))
        .with_premiere(premiere)
        .with_episode(season, episode))
}
