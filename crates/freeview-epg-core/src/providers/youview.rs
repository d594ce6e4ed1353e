//! YouView linear schedule adapter.
//!
//! Schedule payloads vary in shape and field naming, so every lookup goes
//! through an ordered list of aliases or extraction strategies. Entries are
//! enriched with episode metadata resolved by instance id.

#![allow(clippy::future_not_send)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::TimeDelta;
use serde_json::{Map, Value};
use tracing::instrument;

use super::extract::{first_positive_int, first_present, first_text, pick_text, text_at};
use crate::cache::CacheKey;
use crate::context::RunContext;
use crate::error::FetchError;
use crate::http::{HttpRequest, LocalHttpFetch};
use crate::model::{Channel, Programme};
use crate::time::{parse_duration, parse_timestamp};

/// Schedule endpoint.
const SCHEDULE_URL: &str = "https://api.youview.tv/metadata/linear/v2/schedule/by-servicelocator";

/// Episode resolution endpoint.
const EPISODE_URL: &str = "https://api.youview.tv/metadata/resolution/v4/episodes/by-instance-id";

/// Artwork host.
const IMAGE_URL: &str = "https://images-live.youview.tv/images/entity";

/// Cache namespace for episode metadata.
pub const EPISODES_NAMESPACE: &str = "youview_episodes";

/// Hours covered by one schedule request.
const INTERVAL_HOURS: u32 = 12;

const TITLE_KEYS: [&str; 2] = ["title", "programmeTitle"];
const START_KEYS: [&str; 4] = ["start", "startTime", "startTimeUtc", "startTimeUTC"];
const END_KEYS: [&str; 4] = ["end", "endTime", "endTimeUtc", "endTimeUTC"];
const INSTANCE_KEYS: [&str; 5] = [
    "instanceId",
    "instance_id",
    "instanceID",
    "instance.id",
    "instance.instanceId",
];
const DETAIL_TITLE_KEYS: [&str; 2] = ["title", "name"];
const SEASON_KEYS: [&str; 3] = ["seasonNumber", "seriesNumber", "season"];
const EPISODE_KEYS: [&str; 2] = ["episodeNumber", "episode"];

/// Unit of a numeric duration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationUnit {
    Seconds,
    Millis,
}

const DURATION_KEYS: [(&str, DurationUnit); 5] = [
    ("duration", DurationUnit::Seconds),
    ("durationSeconds", DurationUnit::Seconds),
    ("durationMillis", DurationUnit::Millis),
    ("durationMs", DurationUnit::Millis),
    ("durationIso", DurationUnit::Seconds),
];

/// Request intervals (`YYYY-MM-DDTHHZ/PT12H`) covering the run horizon.
fn intervals(ctx: &RunContext<impl Sized>) -> Vec<String> {
    let Some(first) = ctx.utc_midnights().into_iter().next() else {
        return Vec::new();
    };
    let total_hours = ctx.days().saturating_mul(24);
    (0..total_hours)
        .step_by(usize::try_from(INTERVAL_HOURS).unwrap_or(12))
        .filter_map(|offset| first.checked_add_signed(TimeDelta::hours(i64::from(offset))))
        .map(|start| format!("{}/PT{INTERVAL_HOURS}H", start.format("%Y-%m-%dT%HZ")))
        .collect()
}

/// Schedule entries, tried in order: `entries`, `events`, then nested
/// `schedule`/`schedules` objects or arrays.
fn extract_entries(payload: &Value) -> Vec<&Map<String, Value>> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    for key in ["entries", "events"] {
        if let Some(items) = obj.get(key).and_then(Value::as_array) {
            return items.iter().filter_map(Value::as_object).collect();
        }
    }
    for key in ["schedule", "schedules"] {
        match obj.get(key) {
            Some(nested @ Value::Object(_)) => return extract_entries(nested),
            Some(Value::Array(items)) => return items.iter().flat_map(extract_entries).collect(),
            _ => {}
        }
    }
    Vec::new()
}

/// Episode object of a resolution payload, tried in order: `episode`,
/// `entity`, first object of `entries`/`episodes`/`items`/`results`, else
/// the payload itself.
fn extract_episode(payload: &Value) -> Option<&Map<String, Value>> {
    if let Some(items) = payload.as_array() {
        return items.iter().find_map(Value::as_object);
    }
    let obj = payload.as_object()?;
    for key in ["episode", "entity"] {
        if let Some(found) = obj.get(key).and_then(Value::as_object) {
            return Some(found);
        }
    }
    for key in ["entries", "episodes", "items", "results"] {
        if let Some(items) = obj.get(key).and_then(Value::as_array)
            && let Some(found) = items.iter().find_map(Value::as_object)
        {
            return Some(found);
        }
    }
    Some(obj)
}

/// Synopsis from episode metadata.
fn extract_synopsis(details: &Map<String, Value>) -> Option<String> {
    if let Some(synopsis) = details.get("synopsis").and_then(Value::as_object)
        && let Some(text) = first_text(synopsis, &["long", "medium", "short"])
    {
        return Some(text);
    }
    first_text(
        details,
        &["synopsis", "description", "shortSynopsis", "longSynopsis"],
    )
}

/// Parses a duration in the field's unit into seconds.
fn duration_seconds(value: &Value, unit: DurationUnit) -> Result<i64, FetchError> {
    let parsed = parse_duration(value)?;
    let is_iso = value.as_str().is_some_and(|s| s.trim().starts_with(['P', 'p']));
    match unit {
        DurationUnit::Millis if !is_iso => Ok(parsed.div_euclid(1000)),
        _ => Ok(parsed),
    }
}

/// Stop time from an end alias, else start plus a duration alias.
fn resolve_stop(entry: &Map<String, Value>, start: i64) -> Result<i64, FetchError> {
    if let Some(end) = first_present(entry, &END_KEYS).and_then(|v| parse_timestamp(v).ok()) {
        return Ok(end);
    }
    let (value, unit) = DURATION_KEYS
        .iter()
        .find_map(|(key, unit)| first_present(entry, &[*key]).map(|v| (v, *unit)))
        .ok_or_else(|| FetchError::invalid("missing end and duration"))?;
    start
        .checked_add(duration_seconds(value, unit)?)
        .ok_or_else(|| FetchError::invalid("stop time overflows"))
}

/// A schedule entry with resolved timing.
#[derive(Debug)]
struct Entry<'a> {
    fields: &'a Map<String, Value>,
    start: i64,
    stop: i64,
    instance_id: Option<String>,
}

impl<'a> Entry<'a> {
    fn parse(fields: &'a Map<String, Value>) -> Result<Self, FetchError> {
        let start = first_present(fields, &START_KEYS)
            .ok_or_else(|| FetchError::invalid("missing start"))
            .and_then(parse_timestamp)?;
        let stop = resolve_stop(fields, start)?;
        Ok(Self {
            fields,
            start,
            stop,
            instance_id: first_text(fields, &INSTANCE_KEYS),
        })
    }

    /// Builds the programme, filling gaps from episode metadata.
    fn into_programme(
        self,
        channel: &str,
        details: Option<&Map<String, Value>>,
    ) -> Result<Programme, FetchError> {
        let title = first_text(self.fields, &TITLE_KEYS)
            .or_else(|| details.and_then(|d| first_text(d, &DETAIL_TITLE_KEYS)))
            .ok_or_else(|| FetchError::invalid("missing title"))?;
        let description = pick_text([self.fields.get("synopsis"), self.fields.get("description")])
            .or_else(|| details.and_then(extract_synopsis));
        let icon = self.instance_id.as_ref().map_or_else(
            || details.and_then(|d| text_at(d, "image.url")),
            |id| Some(format!("{IMAGE_URL}/{id}/primary/1_512x288.jpg?overlaygradient=0")),
        );
        let season = details.and_then(|d| first_positive_int(d, &SEASON_KEYS));
        let episode = details.and_then(|d| first_positive_int(d, &EPISODE_KEYS));

        Ok(Programme::new(channel, title, self.start, self.stop)?
            .with_description(description)
            .with_icon(icon)
            .with_episode(season, episode))
    }
}

/// Fetches (through the cache) the episode payload for an instance id.
async fn fetch_episode(
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
    instance_id: &str,
) -> Option<Arc<Value>> {
    let request = HttpRequest::get(EPISODE_URL).query("instanceId", instance_id);
    ctx.cached_json(EPISODES_NAMESPACE, &CacheKey::new([instance_id]), &request)
        .await
}

/// Fetches a YouView channel's schedule for the run horizon.
///
/// # Errors
///
/// Returns [`FetchError::Configuration`] if the channel has no service
/// locator (`provider_id`).
#[instrument(skip_all, fields(channel = %channel.xmltv_id))]
pub async fn fetch_programmes(
    channel: &Channel,
    ctx: &RunContext<impl LocalHttpFetch + Sync>,
) -> Result<Vec<Programme>, FetchError> {
    let service_locator = channel.require_provider_id()?;
    let mut programmes = Vec::new();
    let mut seen: HashSet<(String, i64)> = HashSet::new();

    for window in intervals(ctx) {
        let request = HttpRequest::get(SCHEDULE_URL)
            .query("serviceLocator", service_locator)
            .query("interval", &window);
        let payload = match ctx.fetch_json(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%window, error = %e, "Skipping YouView window");
                continue;
            }
        };

        for fields in extract_entries(&payload) {
            let entry = match Entry::parse(fields) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(%window, error = %e, "Skipping YouView entry");
                    continue;
                }
            };
            if let Some(id) = &entry.instance_id
                && !seen.insert((id.clone(), entry.start))
            {
                tracing::debug!(%window, instance = %id, "Skipping repeated instance");
                continue;
            }
            let payload = match &entry.instance_id {
                Some(id) => fetch_episode(ctx, id).await,
                None => None,
            };
            let details = payload.as_deref().and_then(extract_episode);
            match entry.into_programme(&channel.xmltv_id, details) {
                Ok(programme) => programmes.push(programme),
                Err(e) => tracing::debug!(%window, error = %e, "Skipping YouView entry"),
            }
        }
    }

    tracing::info!(count = programmes.len(), "Fetched YouView programmes");
    Ok(programmes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use serde_json::json;

    use super::*;
    use crate::testing::{MockHttp, fixed_now};

    const SCHEDULE_FIXTURE: &str =
        include_str!("../../../../fixtures/youview/schedule_2024-01-02T00.json");
    const EPISODE_FIXTURE: &str = include_str!("../../../../fixtures/youview/episode_inst-0002.json");

    const LOCATOR: &str = "dvb://233a.1004.1044";

    fn yv_channel() -> Channel {
        serde_json::from_value(json!({
            "xmltv_id": "BBCOne.uk",
            "src": "yv",
            "provider_id": LOCATOR,
            "name": "BBC One"
        }))
        .unwrap()
    }

    fn context(http: MockHttp) -> RunContext<MockHttp> {
        RunContext::new(http, chrono_tz::UTC)
            .with_days(1)
            .with_now(fixed_now())
    }

    #[test]
    fn test_intervals_cover_horizon() {
        // Arrange
        let ctx = context(MockHttp::new()).with_days(2);

        // Act
        let windows = intervals(&ctx);

        // Assert
        assert_eq!(
            windows,
            vec![
                "2024-01-02T00Z/PT12H",
                "2024-01-02T12Z/PT12H",
                "2024-01-03T00Z/PT12H",
                "2024-01-03T12Z/PT12H",
            ]
        );
    }

    #[test]
    fn test_extract_entries_strategies() {
        // Arrange
        let direct = json!({"events": [{"title": "A"}, 5]});
        let nested = json!({"schedules": [{"entries": [{"title": "B"}]}, {"events": [{"title": "C"}]}]});
        let empty = json!({"unrelated": []});

        // Act & Assert
        assert_eq!(extract_entries(&direct).len(), 1);
        let titles: Vec<&Value> = extract_entries(&nested)
            .into_iter()
            .filter_map(|e| e.get("title"))
            .collect();
        assert_eq!(titles, vec![&json!("B"), &json!("C")]);
        assert!(extract_entries(&empty).is_empty());
    }

    #[test]
    fn test_extract_episode_strategies() {
        // Arrange
        let wrapped = json!({"episode": {"title": "A"}});
        let listed = json!({"results": [{"title": "B"}]});
        let bare = json!({"title": "C"});

        // Act & Assert
        assert_eq!(extract_episode(&wrapped).unwrap()["title"], "A");
        assert_eq!(extract_episode(&listed).unwrap()["title"], "B");
        assert_eq!(extract_episode(&bare).unwrap()["title"], "C");
        assert!(extract_episode(&json!("text")).is_none());
    }

    #[test]
    fn test_duration_millis_aliases() {
        // Arrange
        let millis = json!({"startTime": 1_704_153_600, "durationMs": 1_800_000});
        let seconds = json!({"startTime": 1_704_153_600, "durationSeconds": 1800});

        // Act
        let from_millis = resolve_stop(millis.as_object().unwrap(), 1_704_153_600).unwrap();
        let from_seconds = resolve_stop(seconds.as_object().unwrap(), 1_704_153_600).unwrap();

        // Assert
        assert_eq!(from_millis, 1_704_155_400);
        assert_eq!(from_seconds, 1_704_155_400);
    }

    #[tokio::test]
    async fn test_fetch_programmes_from_fixture() {
        // Arrange
        let http = MockHttp::new()
            .route(
                SCHEDULE_URL,
                &[("serviceLocator", LOCATOR), ("interval", "2024-01-02T00Z/PT12H")],
                serde_json::from_str(SCHEDULE_FIXTURE).unwrap(),
            )
            .route(
                SCHEDULE_URL,
                &[("serviceLocator", LOCATOR), ("interval", "2024-01-02T12Z/PT12H")],
                json!({"entries": []}),
            )
            .route(
                EPISODE_URL,
                &[("instanceId", "inst-0002")],
                serde_json::from_str(EPISODE_FIXTURE).unwrap(),
            );
        let ctx = context(http);

        // Act
        let programmes = fetch_programmes(&yv_channel(), &ctx).await.unwrap();

        // Assert
        let titles: Vec<&str> = programmes.iter().map(Programme::title).collect();
        assert_eq!(titles, vec!["Breakfast", "Morning Live", "Regional News"]);

        let breakfast = &programmes[0];
        assert_eq!(breakfast.description(), Some("News, weather and sport."));
        assert_eq!(
            breakfast.icon(),
            Some("https://images-live.youview.tv/images/entity/inst-0001/primary/1_512x288.jpg?overlaygradient=0")
        );

        let morning = &programmes[1];
        assert_eq!(morning.start(), 1_704_186_900);
        assert_eq!(morning.stop(), 1_704_189_600);
        assert_eq!(
            morning.description(),
            Some("Topical daytime magazine programme with consumer advice.")
        );
        assert_eq!(morning.episode_numbers(), Some((5, 62)));

        let regional = &programmes[2];
        assert_eq!(regional.start(), 1_704_189_600);
        assert_eq!(regional.stop(), 1_704_190_500);
        assert_eq!(regional.icon(), None);
    }

    #[tokio::test]
    async fn test_episode_lookups_are_cached_per_instance() {
        // Arrange
        let http = MockHttp::new()
            .route(
                SCHEDULE_URL,
                &[("serviceLocator", LOCATOR)],
                serde_json::from_str(SCHEDULE_FIXTURE).unwrap(),
            )
            .route_status(EPISODE_URL, &[], 404);
        let ctx = context(http);

        // Act
        fetch_programmes(&yv_channel(), &ctx).await.unwrap();

        // Assert: inst-0001 (once after dedupe), inst-0002 and inst-0004.
        assert_eq!(ctx.http().call_count(EPISODE_URL), 3);
        assert_eq!(ctx.cache().len(EPISODES_NAMESPACE), 3);
    }
}
