use serde_json::Value;

use crate::models::OddsInfo;

/// Outcome of scanning a fixture's bookmaker entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OddsPick<'a> {
    /// First entry whose bookmaker name contains the preferred name.
    Preferred(&'a Value),
    /// No preferred bookmaker; first entry in the list.
    Fallback(&'a Value),
    Empty,
}

impl<'a> OddsPick<'a> {
    pub fn entry(self) -> Option<&'a Value> {
        match self {
            OddsPick::Preferred(v) | OddsPick::Fallback(v) => Some(v),
            OddsPick::Empty => None,
        }
    }
}

/// Bookmaker name of one odds entry. Accepts `{"bookmaker": {"name": "..."}}`
/// and `{"bookmaker": "..."}`; anything else has no name.
pub fn bookmaker_name(entry: &Value) -> Option<&str> {
    match entry.get("bookmaker")? {
        Value::String(name) => Some(name.as_str()),
        Value::Object(bm) => bm.get("name").and_then(Value::as_str),
        _ => None,
    }
}

/// Scan in list order for `preferred` (case-insensitive substring), falling back to the first entry.
pub fn select_odds<'a>(entries: &'a [Value], preferred: &str) -> OddsPick<'a> {
    let needle = preferred.to_lowercase();

    let found = entries.iter().find(|entry| {
        bookmaker_name(entry).is_some_and(|name| name.to_lowercase().contains(&needle))
    });

    match (found, entries.first()) {
        (Some(entry), _) => OddsPick::Preferred(entry),
        (None, Some(first)) => OddsPick::Fallback(first),
        (None, None) => OddsPick::Empty,
    }
}

pub fn odds_info(entries: Vec<Value>, preferred: &str, fixture_id: i64) -> OddsInfo {
    let pick = select_odds(&entries, preferred);
    if let OddsPick::Fallback(entry) = pick {
        tracing::debug!(
            "Fixture {}: no '{}' odds, falling back to {:?}",
            fixture_id,
            preferred,
            bookmaker_name(entry)
        );
    }
    let chosen = pick.entry().cloned();
    OddsInfo {
        preferred: chosen,
        all: entries,
    }
}
