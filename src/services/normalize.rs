use serde_json::Value;

use crate::models::{FilteredMatch, Fixture, Goals, MatchRef};

/// Match list from any of:
/// - `{"matches": [...]}`
/// - `{"response": [...]}`
/// - `[...]`
pub fn match_list(envelope: Value) -> Vec<Value> {
    match envelope {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let list = map.remove("matches").or_else(|| map.remove("response"));
            match list {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Country from `{"country": "England"}` or `{"league": {"country": "England"}}`.
pub fn country_of(m: &Value) -> Option<String> {
    non_empty_str(m.get("country"))
        .or_else(|| non_empty_str(m.get("league").and_then(|l| l.get("country"))))
}

/// League name from `{"league": "Premier League"}` or `{"league": {"name": ...}}`.
pub fn league_name_of(m: &Value) -> Option<String> {
    match m.get("league") {
        Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
        Some(league @ Value::Object(_)) => non_empty_str(league.get("name")),
        _ => None,
    }
}

/// Fixture id from `{"fixture_id": 1}` or `{"fixture": {"id": 1}}`.
pub fn fixture_id_of(m: &Value) -> Option<i64> {
    id_value(m.get("fixture_id")).or_else(|| id_value(m.pointer("/fixture/id")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    fn key(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

/// Team id from `{"home_id": 1}` or `{"teams": {"home": {"id": 1}}}` (same for away).
pub fn team_id_of(m: &Value, side: Side) -> Option<i64> {
    let flat = format!("{}_id", side.key());
    let nested = format!("/teams/{}/id", side.key());
    id_value(m.get(flat.as_str())).or_else(|| id_value(m.pointer(&nested)))
}

impl MatchRef {
    pub fn from_value(m: &Value) -> Self {
        Self {
            country: country_of(m),
            league: league_name_of(m),
            fixture_id: fixture_id_of(m),
            home_id: team_id_of(m, Side::Home),
            away_id: team_id_of(m, Side::Away),
        }
    }
}

/// Raw API-Football fixture objects into `Fixture`; undecodable entries are dropped.
pub fn fixtures_from(values: &[Value]) -> Vec<Fixture> {
    values
        .iter()
        .filter_map(|v| match serde_json::from_value::<Fixture>(v.clone()) {
            Ok(fixture) => Some(fixture),
            Err(e) => {
                tracing::debug!("Skipping undecodable fixture: {}", e);
                None
            }
        })
        .collect()
}

/// `FilteredMatch` from either shape. A nested fixture decodes directly;
/// fields it lacks are filled from the flat keys (`fixture_id`, `date`,
/// `status`, `league`, `league_id`, `country`, `home`/`away`, `home_id`/`away_id`,
/// `score` as `"2-1"`).
pub fn filtered_match_of(m: &Value) -> FilteredMatch {
    let mut out = serde_json::from_value::<Fixture>(m.clone())
        .map(FilteredMatch::from)
        .unwrap_or_default();

    out.fixture_id = out.fixture_id.or_else(|| fixture_id_of(m));
    out.date = out.date.or_else(|| non_empty_str(m.get("date")));
    out.status = out.status.or_else(|| non_empty_str(m.get("status")));
    out.league.name = out.league.name.or_else(|| league_name_of(m));
    out.league.id = out.league.id.or_else(|| id_value(m.get("league_id")));
    out.league.country = out.league.country.or_else(|| country_of(m));
    out.teams.home.id = out.teams.home.id.or_else(|| team_id_of(m, Side::Home));
    out.teams.away.id = out.teams.away.id.or_else(|| team_id_of(m, Side::Away));
    out.teams.home.name = out.teams.home.name.or_else(|| non_empty_str(m.get("home")));
    out.teams.away.name = out.teams.away.name.or_else(|| non_empty_str(m.get("away")));

    if out.score.fulltime.home.is_none() && out.score.fulltime.away.is_none() {
        if let Some(goals) = m.get("score").and_then(Value::as_str).and_then(score_line) {
            out.score.fulltime = goals;
        }
    }
    out
}

/// `"2-1"` into goals; a side that is not a number stays `None`.
fn score_line(raw: &str) -> Option<Goals> {
    let (home, away) = raw.split_once('-')?;
    Some(Goals {
        home: home.trim().parse().ok(),
        away: away.trim().parse().ok(),
    })
}

/// Positive integer, or a string holding one. Zero counts as missing.
fn id_value(v: Option<&Value>) -> Option<i64> {
    let id = match v? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
