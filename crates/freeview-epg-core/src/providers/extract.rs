//! Field lookups over loosely typed upstream JSON.
//!
//! Alias lists are tried in order; the first present value wins. `null` and
//! blank strings count as absent.

use serde_json::{Map, Value};

/// Returns `true` if a value carries usable data.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Looks up a dotted path such as `instance.id`.
pub fn lookup<'a>(obj: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// First present value among `keys` (dotted paths allowed).
pub fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| lookup(obj, key))
        .find(|value| is_present(value))
}

/// Trimmed text at `key`, if it is a non-blank string.
pub fn text_at(obj: &Map<String, Value>, key: &str) -> Option<String> {
    lookup(obj, key).and_then(non_blank)
}

/// First non-blank string among `keys`.
pub fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_at(obj, key))
}

/// First non-blank string among candidate values.
pub fn pick_text<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Option<String> {
    values.into_iter().flatten().find_map(non_blank)
}

/// Trimmed string content of a non-blank string value.
pub fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Renders a string or number as an identifier.
pub fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| String::from(trimmed))
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Positive integer from a number or numeric string; anything else,
/// including zero and negatives, is `None`.
pub fn positive_int(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(parsed).ok().filter(|n| *n > 0)
}

/// First positive integer among `keys`.
pub fn first_positive_int(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|key| lookup(obj, key).and_then(positive_int))
}

/// Loose truthiness: `true`, non-zero numbers, non-empty strings and
/// collections.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
