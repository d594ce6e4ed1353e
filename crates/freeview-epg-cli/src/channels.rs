//! Channel list loading.

use std::path::Path;

use anyhow::{Context, Result, bail};
use freeview_epg_core::Channel;
use serde_json::Value;

/// Loads channel definitions from a JSON file.
///
/// Accepts either `{"channels": [...]}` or a bare array. Entries that do
/// not describe a channel are logged and skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or holds
/// no channel list.
pub fn load_channels(path: &Path) -> Result<Vec<Channel>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    parse_channels(data).with_context(|| format!("invalid channel list in {}", path.display()))
}

fn parse_channels(data: Value) -> Result<Vec<Channel>> {
    let entries = match data {
        Value::Object(mut obj) if obj.contains_key("channels") => obj.remove("channels"),
        other => Some(other),
    };
    let Some(Value::Array(entries)) = entries else {
        bail!("expected an array of channels");
    };

    let mut channels = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Channel>(entry) {
            Ok(channel) if channel.xmltv_id.trim().is_empty() => {
                tracing::warn!(index, "Skipping channel without xmltv_id");
            }
            Ok(channel) => channels.push(channel),
            Err(e) => tracing::warn!(index, error = %e, "Skipping invalid channel entry"),
        }
    }
    Ok(channels)
}
