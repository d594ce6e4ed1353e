//! Channel descriptors and canonical programme records.

use chrono::DateTime;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::FetchError;

/// Default language tag for channels that do not declare one.
const DEFAULT_LANG: &str = "en";

fn default_lang() -> String {
    String::from(DEFAULT_LANG)
}

/// Deserializes an identifier given as a JSON string or number.
///
/// `null` and blank strings become `None`.
pub fn deserialize_loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let result = Option::<Value>::deserialize(deserializer);
    let value = result.map_err(D::Error::custom)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| String::from(trimmed)))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

/// A configured channel, as read from the channel file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    /// Output channel id.
    pub xmltv_id: String,
    /// Source tag selecting the adapter (`sky`, `freeview`, `freesat`, `rt`, `yv`).
    pub src: String,
    /// Primary lookup id at the upstream source.
    #[serde(default, deserialize_with = "deserialize_loose_id")]
    pub provider_id: Option<String>,
    /// Region/network id (Freeview).
    #[serde(default, deserialize_with = "deserialize_loose_id")]
    pub region_id: Option<String>,
    /// Postcode used to prime the upstream region (Freesat).
    #[serde(default)]
    pub postcode: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Language tag for display name, titles and descriptions.
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Channel logo URL.
    #[serde(default)]
    pub icon_url: Option<String>,
}

impl Channel {
    /// Returns the provider id.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the channel has no provider id.
    pub fn require_provider_id(&self) -> Result<&str, FetchError> {
        self.provider_id.as_deref().ok_or_else(|| {
            FetchError::Configuration(format!("channel {} has no provider_id", self.xmltv_id))
        })
    }

    /// Returns the region id.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Configuration`] if the channel has no region id.
    pub fn require_region_id(&self) -> Result<&str, FetchError> {
        self.region_id.as_deref().ok_or_else(|| {
            FetchError::Configuration(format!("channel {} has no region_id", self.xmltv_id))
        })
    }

    /// Display name, falling back to the channel id when unset.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.xmltv_id
        } else {
            &self.name
        }
    }
}

/// One scheduled broadcast in canonical form.
///
/// Built through [`Programme::new`], which guarantees a non-blank title and
/// `start < stop`. Times are epoch seconds (UTC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programme {
    channel: String,
    title: String,
    description: Option<String>,
    start: i64,
    stop: i64,
    icon: Option<String>,
    premiere: bool,
    season: Option<u32>,
    episode: Option<u32>,
}

impl Programme {
    /// Creates a record with the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Validation`] if `title` is blank, `stop <= start`,
    /// or either instant is outside the representable date range.
    pub fn new(
        channel: impl Into<String>,
        title: impl Into<String>,
        start: i64,
        stop: i64,
    ) -> Result<Self, FetchError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(FetchError::invalid("empty title"));
        }
        for instant in [start, stop] {
            if DateTime::from_timestamp(instant, 0).is_none() {
                return Err(FetchError::invalid(format!(
                    "instant {instant} is out of range"
                )));
            }
        }
        if stop <= start {
            return Err(FetchError::invalid(format!(
                "stop {stop} is not after start {start}"
            )));
        }
        Ok(Self {
            channel: channel.into(),
            title,
            description: None,
            start,
            stop,
            icon: None,
            premiere: false,
            season: None,
            episode: None,
        })
    }

    /// Sets the description; blank text is dropped.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    /// Sets the icon URL; blank text is dropped.
    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon.filter(|i| !i.trim().is_empty());
        self
    }

    /// Marks the programme as a premiere.
    #[must_use]
    pub const fn with_premiere(mut self, premiere: bool) -> Self {
        self.premiere = premiere;
        self
    }

    /// Sets season and episode numbers. Zero is treated as absent.
    #[must_use]
    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season = season.filter(|s| *s > 0);
        self.episode = episode.filter(|e| *e > 0);
        self
    }

    /// Output channel id.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Raw (uncleaned) description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Start, epoch seconds.
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// Stop, epoch seconds.
    #[must_use]
    pub const fn stop(&self) -> i64 {
        self.stop
    }

    /// Icon URL.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Whether this airing is a premiere.
    #[must_use]
    pub const fn is_premiere(&self) -> bool {
        self.premiere
    }

    /// Season number.
    #[must_use]
    pub const fn season(&self) -> Option<u32> {
        self.season
    }

    /// Episode number.
    #[must_use]
    pub const fn episode(&self) -> Option<u32> {
        self.episode
    }

    /// Season and episode, only when both are present.
    #[must_use]
    pub const fn episode_numbers(&self) -> Option<(u32, u32)> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some((season, episode)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_channel_accepts_numeric_ids() {
        // Arrange
        let json = r#"{"xmltv_id":"bbc1.uk","src":"freeview","provider_id":4164,"region_id":64257,"name":"BBC One"}"#;

        // Act
        let channel: Channel = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(channel.provider_id.as_deref(), Some("4164"));
        assert_eq!(channel.region_id.as_deref(), Some("64257"));
        assert_eq!(channel.lang, "en");
        assert_eq!(channel.postcode, None);
    }

    #[test]
    fn test_channel_blank_id_is_none() {
        // Arrange
        let json = r#"{"xmltv_id":"x","src":"sky","provider_id":"  ","name":"X"}"#;

        // Act
        let channel: Channel = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(channel.provider_id, None);
        assert!(channel.require_provider_id().is_err());
    }

    #[test]
    fn test_channel_rejects_object_id() {
        // Arrange
        let json = r#"{"xmltv_id":"x","src":"sky","provider_id":{"a":1}}"#;

        // Act
        let result: Result<Channel, _> = serde_json::from_str(json);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        // Arrange
        let json = r#"{"xmltv_id":"itv1.uk","src":"sky"}"#;

        // Act
        let channel: Channel = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(channel.display_name(), "itv1.uk");
    }

    #[test]
    fn test_programme_rejects_blank_title() {
        // Arrange & Act
        let result = Programme::new("bbc1", "   ", 0, 10);

        // Assert
        assert!(matches!(result, Err(FetchError::Validation(_))));
    }

    #[test]
    fn test_programme_rejects_non_positive_span() {
        // Arrange & Act
        let equal = Programme::new("bbc1", "News", 100, 100);
        let reversed = Programme::new("bbc1", "News", 100, 50);

        // Assert
        assert!(equal.is_err());
        assert!(reversed.is_err());
    }

    #[test]
    fn test_programme_rejects_unrepresentable_instants() {
        // Arrange & Act
        let far_start = Programme::new("bbc1", "Glitch", 9_000_000_000_000, 9_000_000_001_800);
        let far_stop = Programme::new("bbc1", "Glitch", 1_704_153_600, 9_000_000_000_000);

        // Assert
        assert!(matches!(far_start, Err(FetchError::Validation(_))));
        assert!(matches!(far_stop, Err(FetchError::Validation(_))));
    }

    #[test]
    fn test_episode_numbers_require_both() {
        // Arrange
        let base = Programme::new("bbc1", "Drama", 0, 60).unwrap();

        // Act
        let only_season = base.clone().with_episode(Some(2), None);
        let zero_episode = base.clone().with_episode(Some(2), Some(0));
        let both = base.with_episode(Some(2), Some(5));

        // Assert
        assert_eq!(only_season.episode_numbers(), None);
        assert_eq!(zero_episode.episode_numbers(), None);
        assert_eq!(both.episode_numbers(), Some((2, 5)));
    }

    #[test]
    fn test_blank_description_dropped() {
        // Arrange & Act
        let programme = Programme::new("bbc1", "News", 0, 60)
            .unwrap()
            .with_description(Some(String::from("  ")));

        // Assert
        assert_eq!(programme.description(), None);
    }
}
