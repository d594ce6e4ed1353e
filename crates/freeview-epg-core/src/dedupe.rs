//! Cross-channel duplicate removal.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::model::Programme;

/// Removes records sharing `(channel, start, title)`.
///
/// For a repeated key the values of the last occurrence win, placed at the
/// position where the key first appeared. Stop time is not part of the key.
#[must_use]
pub fn dedupe_programmes(programmes: Vec<Programme>) -> Vec<Programme> {
    let mut slots: HashMap<(String, i64, String), usize> = HashMap::with_capacity(programmes.len());
    let mut kept: Vec<Programme> = Vec::with_capacity(programmes.len());

    for programme in programmes {
        let key = (
            String::from(programme.channel()),
            programme.start(),
            String::from(programme.title()),
        );
        match slots.entry(key) {
            Entry::Occupied(entry) => {
                if let Some(slot) = kept.get_mut(*entry.get()) {
                    *slot = programme;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(kept.len());
                kept.push(programme);
            }
        }
    }

    kept
}
