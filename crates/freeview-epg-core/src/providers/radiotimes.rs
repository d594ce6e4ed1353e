//! RadioTimes broadcast adapter.

#![allow(clippy::future_not_send)]

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use serde_json::Value;
use tracing::instrument;

use super::extract::{lookup, text_at, value_as_id};
use crate::cache::CacheKey;
use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};
use crate::model::{Channel, Programme};
use crate::time::parse_timestamp;

/// Broadcast API root.
const API_URL: &str = "https://www.radiotimes.com/api/broadcast/broadcast";

/// Cache namespace for broadcast details.
pub const DETAILS_NAMESPACE: &str = "radiotimes_details";

/// Window bound format.
const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Only broadcasts of this type are programmes.
const EPISODE_TYPE: &str = "episode";

/// Formats a window bound.
fn window_bound(instant: DateTime<Utc>) -> String {
    instant.format(WINDOW_FORMAT).to_string()
}

/// Converts one broadcast into a programme, without detail data.
pub(crate) fn parse_broadcast(item: &Value, channel: &str) -> Result<Programme, FetchError> {
    let item = item
        .as_object()
        .ok_or_else(|| FetchError::invalid("broadcast is not an object"))?;
    let title = text_at(item, "title").ok_or_else(|| FetchError::invalid("missing title"))?;
    let start = lookup(item, "start")
        .ok_or_else(|| FetchError::invalid("missing start"))
        .and_then(parse_timestamp)?;
    let stop = lookup(item, "end")
        .ok_or_else(|| FetchError::invalid("missing end"))
        .and_then(parse_timestamp)?;
    Programme::new(channel, title, start, stop)
}

/// Applies description and artwork from a detail record.
fn enrich(programme: Programme, details: Option<&Value>) -> Programme {
    let Some(details) = details.and_then(Value::as_object) else {
        return programme;
    };
    programme
        .with_description(text_at(details, "description"))
        .with_icon(text_at(details, "image.url"))
}

/// Fetches (through the cache) the detail record for a broadcast id.
async fn fetch_details(
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
    id: &str,
) -> Option<Arc<Value>> {
    let request = HttpRequest::get(format!("{API_URL}/details/{id}"));
    ctx.cached_json(DETAILS_NAMESPACE, &CacheKey::new([id]), &request)
        .await
}

/// Fetches a RadioTimes channel's schedule for the run horizon.
///
/// A broadcast starting at the same instant as the previously accepted one
/// is skipped, including across day boundaries.
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
    let url = format!("{API_URL}/channels/{provider_id}/schedule");
    let mut programmes = Vec::new();
    let mut prev_start: Option<i64> = None;

    for midnight in ctx.utc_midnights() {
        let Some(next) = midnight.checked_add_days(Days::new(1)) else {
            continue;
        };
        let window = window_bound(midnight);
        let request = HttpRequest::get(url.as_str())
            .query("from", &window)
            .query("to", window_bound(next));
        let payload = match ctx.fetch_json(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%window, error = %e, "Skipping RadioTimes window");
                continue;
            }
        };
        let Some(items) = payload.as_array() else {
            tracing::warn!(%window, "RadioTimes schedule is not an array");
            continue;
        };

        for item in items {
            if item.get("type").and_then(Value::as_str) != Some(EPISODE_TYPE) {
                continue;
            }
            let programme = match parse_broadcast(item, &channel.xmltv_id) {
                Ok(programme) => programme,
                Err(e) => {
                    tracing::debug!(%window, error = %e, "Skipping RadioTimes broadcast");
                    continue;
                }
            };
            if prev_start == Some(programme.start()) {
                tracing::debug!(%window, start = programme.start(), "Skipping repeated start");
                continue;
            }
            prev_start = Some(programme.start());

            let programme = match item.get("id").and_then(value_as_id) {
                Some(id) => {
                    let details = fetch_details(ctx, &id).await;
                    enrich(programme, details.as_deref())
                }
                None => programme,
            };
            programmes.push(programme);
        }
    }

    tracing::info!(count = programmes.len(), "Fetched RadioTimes programmes");
    Ok(programmes)
}
