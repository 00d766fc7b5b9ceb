use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Upstream fixture (API-Football nesting) ─────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub fixture: FixtureInfo,
    #[serde(default)]
    pub league: League,
    #[serde(default)]
    pub teams: Teams,
    #[serde(default)]
    pub score: Score,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureInfo {
    pub id: Option<i64>,
    pub date: Option<String>,
    #[serde(default)]
    pub status: FixtureStatus,
    pub venue: Option<Venue>,
    pub referee: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureStatus {
    pub short: Option<String>,
    pub elapsed: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct League {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Teams {
    #[serde(default)]
    pub home: TeamRef,
    #[serde(default)]
    pub away: TeamRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub fulltime: Goals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Goals {
    pub home: Option<i64>,
    pub away: Option<i64>,
}

// ── Canonical match reference ────────────────────────────────────────────────

/// One input match reduced to the fields the enricher needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRef {
    pub country: Option<String>,
    pub league: Option<String>,
    pub fixture_id: Option<i64>,
    pub home_id: Option<i64>,
    pub away_id: Option<i64>,
}

// ── Form ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSummary {
    pub last_results: Vec<MatchResult>,
    pub games_counted: usize,
    pub avg_goals_for: Option<f64>,
    pub avg_goals_against: Option<f64>,
    pub win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLine {
    pub opponent: Option<String>,
    pub score: String, // "2-1", or "-" when not played
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamForm {
    pub team_id: i64,
    pub history: Vec<HistoryLine>,
    pub summary: FormSummary,
}

// ── Enriched output ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsInfo {
    /// Preferred bookmaker entry, or the first entry when none matched.
    pub preferred: Option<Value>,
    pub all: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedMatch {
    pub base: Value,
    pub fixture_id: Option<i64>,
    pub home_id: Option<i64>,
    pub away_id: Option<i64>,
    pub odds: Option<OddsInfo>,
    pub home_last5: Vec<Value>,
    pub away_last5: Vec<Value>,
    pub home_summary: Option<FormSummary>,
    pub away_summary: Option<FormSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrichment_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedDay {
    pub date: String,
    pub matches_count: usize,
    pub matches: Vec<EnrichedMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilteredMatch {
    pub fixture_id: Option<i64>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub elapsed: Option<i64>,
    pub referee: Option<String>,
    pub venue: Option<Venue>,
    pub league: League,
    pub teams: Teams,
    pub score: Score,
}

impl From<Fixture> for FilteredMatch {
    fn from(f: Fixture) -> Self {
        Self {
            fixture_id: f.fixture.id,
            date: f.fixture.date,
            status: f.fixture.status.short,
            elapsed: f.fixture.status.elapsed,
            referee: f.fixture.referee,
            venue: f.fixture.venue,
            league: f.league,
            teams: f.teams,
            score: f.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredDay {
    pub date: String,
    pub matches_count: usize,
    pub matches: Vec<FilteredMatch>,
}

// ── Fixtures of a day straight from API-Football ─────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideHistory {
    pub home: Vec<HistoryLine>,
    pub away: Vec<HistoryLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayFixture {
    pub fixture_id: Option<i64>,
    pub home: Option<String>,
    pub away: Option<String>,
    pub home_id: Option<i64>,
    pub away_id: Option<i64>,
    pub score: String, // "2-1", or "-" when not played
    pub status: Option<String>,
    pub league: Option<String>,
    pub league_id: Option<i64>,
    pub date: Option<String>,
    pub history: SideHistory,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrichment_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDay {
    pub date: String,
    pub matches_count: usize,
    pub matches: Vec<DayFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountriesInfo {
    pub allowed_countries: Vec<String>,
    pub top_leagues: Vec<String>,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}
