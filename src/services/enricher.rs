use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::models::{
    DayFixture, EnrichedDay, EnrichedMatch, FilteredDay, FilteredMatch, Fixture, FixtureDay, HistoryLine, MatchRef,
    SideHistory, TeamForm,
};
use crate::services::cache::TtlCache;
use crate::services::form::{history_lines, score_text, summarize, FORM_WINDOW};
use crate::services::normalize::{self, fixtures_from};
use crate::services::odds::odds_info;
use crate::services::upstream::{response_list, FetchResult, Upstream, UpstreamFailure};

type Lookup = Option<(i64, Result<Vec<Value>, UpstreamFailure>)>;

/// Width of per-request fan-out and of the shared permit pool.
fn fan_out(config: &Config) -> usize {
    config.upstream_concurrency.clamp(1, Semaphore::MAX_PERMITS)
}

/// Enrichment pipeline plus the two process-wide caches. Built once at
/// startup and shared by every request.
pub struct MatchEnricher<U> {
    upstream: U,
    config: Arc<Config>,
    history_cache: TtlCache<Vec<Value>>,
    odds_cache: TtlCache<Vec<Value>>,
    /// Caps in-flight upstream calls across all requests.
    permits: Semaphore,
}

impl<U: Upstream> MatchEnricher<U> {
    pub fn new(upstream: U, config: Arc<Config>) -> Self {
        let history_cache = TtlCache::new(config.cache_ttl);
        let odds_cache = TtlCache::new(config.cache_ttl);
        Self::with_caches(upstream, config, history_cache, odds_cache)
    }

    pub fn with_caches(
        upstream: U,
        config: Arc<Config>,
        history_cache: TtlCache<Vec<Value>>,
        odds_cache: TtlCache<Vec<Value>>,
    ) -> Self {
        let permits = Semaphore::new(fan_out(&config));
        Self {
            upstream,
            config,
            history_cache,
            odds_cache,
            permits,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn limited_get(&self, url: &str, query: &[(&str, String)]) -> FetchResult {
        let _permit = self.permits.acquire().await.ok();
        self.upstream.get_json(url, query).await
    }

    /// Raw payload of the matches source for `date`.
    pub async fn source_matches(&self, date: &str) -> FetchResult {
        let url = format!("{}/matches", self.config.matches_source_url);
        self.limited_get(&url, &[("date", date.to_string())]).await
    }

    /// Last fixtures of a team, cached. Failures are not cached.
    pub async fn team_last5(&self, team_id: i64) -> Result<Vec<Value>, UpstreamFailure> {
        if let Some(fixtures) = self.history_cache.get(team_id) {
            tracing::debug!("History cache hit for team {}", team_id);
            return Ok(fixtures);
        }

        let url = format!("{}/fixtures", self.config.api_base_url);
        let query = [("team", team_id.to_string()), ("last", FORM_WINDOW.to_string())];
        let fixtures = response_list(self.limited_get(&url, &query).await?);

        self.history_cache.set(team_id, fixtures.clone());
        Ok(fixtures)
    }

    /// Bookmaker odds entries of a fixture, cached. Failures are not cached.
    pub async fn fixture_odds(&self, fixture_id: i64) -> Result<Vec<Value>, UpstreamFailure> {
        if let Some(entries) = self.odds_cache.get(fixture_id) {
            tracing::debug!("Odds cache hit for fixture {}", fixture_id);
            return Ok(entries);
        }

        let url = format!("{}/odds", self.config.api_base_url);
        let entries = response_list(self.limited_get(&url, &[("fixture", fixture_id.to_string())]).await?);

        self.odds_cache.set(fixture_id, entries.clone());
        Ok(entries)
    }

    /// Apply the country allow-list (and the top-league set when `only_top`).
    pub fn select_matches(&self, matches: Vec<Value>, only_top: bool) -> Vec<(MatchRef, Value)> {
        matches
            .into_iter()
            .filter_map(|m| {
                let match_ref = MatchRef::from_value(&m);
                if !self.config.is_country_allowed(match_ref.country.as_deref()) {
                    return None;
                }
                if only_top && !self.config.is_top_league(match_ref.league.as_deref()) {
                    return None;
                }
                Some((match_ref, m))
            })
            .collect()
    }

    async fn maybe_last5(&self, team_id: Option<i64>) -> Lookup {
        let id = team_id?;
        Some((id, self.team_last5(id).await))
    }

    async fn maybe_odds(&self, fixture_id: Option<i64>) -> Lookup {
        let id = fixture_id?;
        Some((id, self.fixture_odds(id).await))
    }

    async fn enrich_match(&self, match_ref: MatchRef, base: Value) -> EnrichedMatch {
        let (odds, home, away) = tokio::join!(
            self.maybe_odds(match_ref.fixture_id),
            self.maybe_last5(match_ref.home_id),
            self.maybe_last5(match_ref.away_id),
        );

        let mut enriched = EnrichedMatch {
            base,
            fixture_id: match_ref.fixture_id,
            home_id: match_ref.home_id,
            away_id: match_ref.away_id,
            odds: None,
            home_last5: Vec::new(),
            away_last5: Vec::new(),
            home_summary: None,
            away_summary: None,
            enrichment_errors: Vec::new(),
        };

        match odds {
            Some((id, Ok(entries))) => {
                enriched.odds = Some(odds_info(entries, &self.config.preferred_bookmaker, id));
            }
            Some((id, Err(e))) => {
                enriched.enrichment_errors.push(format!("odds for fixture {}: {}", id, e));
            }
            None => {}
        }

        match home {
            Some((id, Ok(fixtures))) => {
                enriched.home_summary = Some(summarize(&fixtures_from(&fixtures), id));
                enriched.home_last5 = fixtures;
            }
            Some((id, Err(e))) => {
                enriched.enrichment_errors.push(format!("last 5 for team {}: {}", id, e));
            }
            None => {}
        }

        match away {
            Some((id, Ok(fixtures))) => {
                enriched.away_summary = Some(summarize(&fixtures_from(&fixtures), id));
                enriched.away_last5 = fixtures;
            }
            Some((id, Err(e))) => {
                enriched.enrichment_errors.push(format!("last 5 for team {}: {}", id, e));
            }
            None => {}
        }

        enriched
    }

    /// Matches of `date` that pass the allow-lists, each with odds and both
    /// teams' recent form. Input order is preserved.
    pub async fn enrich_day(&self, date: &str, only_top: bool) -> Result<EnrichedDay, UpstreamFailure> {
        let source = self.source_matches(date).await?;
        let selected = self.select_matches(normalize::match_list(source), only_top);

        let matches: Vec<EnrichedMatch> = stream::iter(selected)
            .map(|(match_ref, base)| self.enrich_match(match_ref, base))
            .buffered(fan_out(&self.config))
            .collect()
            .await;

        let failed = matches.iter().filter(|m| !m.enrichment_errors.is_empty()).count();
        tracing::info!(
            "Enriched {} matches for {} (only_top={}, {} with partial failures, cached: {} teams, {} fixtures)",
            matches.len(),
            date,
            only_top,
            failed,
            self.history_cache.len(),
            self.odds_cache.len()
        );

        Ok(EnrichedDay {
            date: date.to_string(),
            matches_count: matches.len(),
            matches,
        })
    }

    /// Source matches of `date` whose country is allowed, reshaped.
    pub async fn filtered_day(&self, date: &str) -> Result<FilteredDay, UpstreamFailure> {
        let source = self.source_matches(date).await?;
        let matches: Vec<FilteredMatch> = normalize::match_list(source)
            .iter()
            .filter(|m| self.config.is_country_allowed(normalize::country_of(m).as_deref()))
            .map(normalize::filtered_match_of)
            .collect();

        Ok(FilteredDay {
            date: date.to_string(),
            matches_count: matches.len(),
            matches,
        })
    }

    async fn day_fixture(&self, fixture: Fixture) -> DayFixture {
        let home_id = fixture.teams.home.id.filter(|id| *id > 0);
        let away_id = fixture.teams.away.id.filter(|id| *id > 0);
        let (home, away) = tokio::join!(self.maybe_last5(home_id), self.maybe_last5(away_id));

        let mut enrichment_errors = Vec::new();
        let history = SideHistory {
            home: lines_or_error(home, &mut enrichment_errors),
            away: lines_or_error(away, &mut enrichment_errors),
        };

        DayFixture {
            fixture_id: fixture.fixture.id,
            home: fixture.teams.home.name,
            away: fixture.teams.away.name,
            home_id,
            away_id,
            score: score_text(&fixture.score.fulltime),
            status: fixture.fixture.status.short,
            league: fixture.league.name,
            league_id: fixture.league.id,
            date: fixture.fixture.date,
            history,
            enrichment_errors,
        }
    }

    /// Fixtures of `date` straight from API-Football, allowed countries only,
    /// each with both teams' last results. Input order is preserved.
    pub async fn fixtures_by_date(&self, date: &str) -> Result<FixtureDay, UpstreamFailure> {
        let url = format!("{}/fixtures", self.config.api_base_url);
        let body = self.limited_get(&url, &[("date", date.to_string())]).await?;
        let allowed: Vec<Value> = response_list(body)
            .into_iter()
            .filter(|f| self.config.is_country_allowed(normalize::country_of(f).as_deref()))
            .collect();

        let matches: Vec<DayFixture> = stream::iter(fixtures_from(&allowed))
            .map(|fixture| self.day_fixture(fixture))
            .buffered(fan_out(&self.config))
            .collect()
            .await;

        tracing::info!("Fetched {} fixtures for {} from API-Football", matches.len(), date);

        Ok(FixtureDay {
            date: date.to_string(),
            matches_count: matches.len(),
            matches,
        })
    }

    pub async fn team_form(&self, team_id: i64) -> Result<TeamForm, UpstreamFailure> {
        let fixtures = fixtures_from(&self.team_last5(team_id).await?);
        Ok(TeamForm {
            team_id,
            history: history_lines(&fixtures, team_id),
            summary: summarize(&fixtures, team_id),
        })
    }
}

fn lines_or_error(lookup: Lookup, errors: &mut Vec<String>) -> Vec<HistoryLine> {
    match lookup {
        Some((id, Ok(values))) => history_lines(&fixtures_from(&values), id),
        Some((id, Err(e))) => {
            errors.push(format!("last 5 for team {}: {}", id, e));
            Vec::new()
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::cache::tests::ManualClock;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Upstream that answers from a table keyed by `url?k=v&k=v`.
    #[derive(Default)]
    pub(crate) struct ScriptedUpstream {
        responses: Mutex<HashMap<String, FetchResult>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedUpstream {
        pub(crate) fn respond(self, key: &str, result: FetchResult) -> Self {
            self.responses.lock().unwrap().insert(key.to_string(), result);
            self
        }
    }

    impl Upstream for ScriptedUpstream {
        async fn get_json(&self, url: &str, query: &[(&str, String)]) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let key = format!("{}?{}", url, params.join("&"));
            self.responses.lock().unwrap().get(&key).cloned().unwrap_or_else(|| {
                Err(UpstreamFailure::Unavailable {
                    status: Some(404),
                    detail: format!("no script for {}", key),
                })
            })
        }
    }

    pub(crate) fn test_config() -> Config {
        let mut config = Config::new(
            vec!["England".to_string(), "Brazil".to_string()],
            vec!["Premier League".to_string()],
        );
        config.api_base_url = "http://api".to_string();
        config.matches_source_url = "http://source".to_string();
        config
    }

    fn played(home: i64, away: i64, hg: i64, ag: i64) -> Value {
        json!({
            "fixture": {"status": {"short": "FT"}},
            "teams": {"home": {"id": home, "name": format!("T{}", home)}, "away": {"id": away, "name": format!("T{}", away)}},
            "score": {"fulltime": {"home": hg, "away": ag}}
        })
    }

    pub(crate) fn scripted() -> ScriptedUpstream {
        ScriptedUpstream::default()
            .respond(
                "http://source/matches?date=2025-09-24",
                Ok(json!({"matches": [
                    {"country": "England", "league": "Championship", "fixture_id": 11, "home_id": 1, "away_id": 2},
                    {"country": "Japan", "league": "J1 League", "fixture_id": 12, "home_id": 5, "away_id": 6},
                    {"fixture": {"id": 13}, "league": {"name": "Premier League", "country": "England"},
                     "teams": {"home": {"id": 3}, "away": {"id": 1}}},
                    {"country": "Brazil", "league": "Serie A"}
                ]})),
            )
            .respond(
                "http://api/odds?fixture=11",
                Ok(json!({"response": [{"bookmaker": {"name": "Bet365"}}, {"bookmaker": {"name": "Betano"}}]})),
            )
            .respond(
                "http://api/odds?fixture=13",
                Err(UpstreamFailure::Unavailable { status: None, detail: "timeout".to_string() }),
            )
            .respond(
                "http://api/fixtures?team=1&last=5",
                Ok(json!({"response": [played(1, 9, 2, 1), played(9, 1, 0, 0)]})),
            )
            .respond("http://api/fixtures?team=2&last=5", Ok(json!({"response": [played(2, 9, 0, 3)]})))
            .respond("http://api/fixtures?team=3&last=5", Ok(json!({"response": []})))
            .respond(
                "http://api/fixtures?date=2025-09-24",
                Ok(json!({"errors": [], "response": [
                    {"fixture": {"id": 21, "date": "2025-09-24T19:00:00+00:00", "status": {"short": "FT"}},
                     "league": {"id": 40, "name": "Championship", "country": "England"},
                     "teams": {"home": {"id": 1, "name": "T1"}, "away": {"id": 4, "name": "T4"}},
                     "score": {"fulltime": {"home": 1, "away": 0}}},
                    {"fixture": {"id": 22}, "league": {"name": "J1 League", "country": "Japan"},
                     "teams": {"home": {"id": 5}, "away": {"id": 6}}},
                    {"fixture": {"id": 23, "status": {"short": "NS"}},
                     "league": {"id": 71, "name": "Serie A", "country": "Brazil"},
                     "teams": {"home": {"id": 2, "name": "T2"}, "away": {"id": 3, "name": "T3"}},
                     "score": {"fulltime": {"home": null, "away": null}}}
                ]})),
            )
    }

    #[tokio::test]
    async fn test_enrich_day_filters_and_keeps_order() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        let day = enricher.enrich_day("2025-09-24", false).await.unwrap();

        assert_eq!(day.matches_count, 3);
        let fixture_ids: Vec<_> = day.matches.iter().map(|m| m.fixture_id).collect();
        assert_eq!(fixture_ids, vec![Some(11), Some(13), None]);
    }

    #[tokio::test]
    async fn test_enrich_day_attaches_odds_and_form() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        let day = enricher.enrich_day("2025-09-24", false).await.unwrap();
        let first = &day.matches[0];

        let odds = first.odds.as_ref().unwrap();
        assert_eq!(odds.preferred, Some(json!({"bookmaker": {"name": "Betano"}})));
        assert_eq!(odds.all.len(), 2);

        let home = first.home_summary.as_ref().unwrap();
        assert_eq!(home.games_counted, 2);
        assert_eq!(home.win_rate, Some(0.5));
        assert_eq!(home.avg_goals_for, Some(1.0));
        assert_eq!(first.home_last5.len(), 2);

        let away = first.away_summary.as_ref().unwrap();
        assert_eq!(away.win_rate, Some(0.0));
        assert!(first.enrichment_errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_sub_fetch_degrades_single_match() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        let day = enricher.enrich_day("2025-09-24", false).await.unwrap();
        let second = &day.matches[1];

        assert!(second.odds.is_none());
        assert_eq!(second.enrichment_errors.len(), 1);
        assert!(second.enrichment_errors[0].contains("fixture 13"));
        assert_eq!(second.home_summary.as_ref().unwrap().games_counted, 0);
        assert_eq!(second.home_summary.as_ref().unwrap().win_rate, None);
        assert!(second.away_summary.is_some());

        // Brazil entry has no ids at all: nothing fetched, nothing failed.
        let third = &day.matches[2];
        assert!(third.odds.is_none() && third.home_summary.is_none());
        assert!(third.enrichment_errors.is_empty());
    }

    #[tokio::test]
    async fn test_only_top_restricts_leagues() {
        let config = Arc::new(test_config());
        let enricher = MatchEnricher::new(scripted(), config.clone());
        let day = enricher.enrich_day("2025-09-24", true).await.unwrap();

        assert_eq!(day.matches_count, 1);
        for m in &day.matches {
            let league = normalize::league_name_of(&m.base);
            assert!(config.is_top_league(league.as_deref()));
        }
    }

    #[tokio::test]
    async fn test_source_failure_is_an_error() {
        let enricher = MatchEnricher::new(ScriptedUpstream::default(), Arc::new(test_config()));
        let result = enricher.enrich_day("2025-09-24", false).await;
        assert!(matches!(result, Err(UpstreamFailure::Unavailable { status: Some(404), .. })));
    }

    #[tokio::test]
    async fn test_team_history_is_cached_until_ttl() {
        let clock = Arc::new(ManualClock::new());
        let ttl = Duration::from_secs(300);
        let enricher = MatchEnricher::with_caches(
            scripted(),
            Arc::new(test_config()),
            TtlCache::with_clock(ttl, clock.clone()),
            TtlCache::with_clock(ttl, clock.clone()),
        );

        enricher.team_last5(1).await.unwrap();
        enricher.team_last5(1).await.unwrap();
        assert_eq!(enricher.upstream.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(301));
        enricher.team_last5(1).await.unwrap();
        assert_eq!(enricher.upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        assert!(enricher.fixture_odds(13).await.is_err());
        assert!(enricher.fixture_odds(13).await.is_err());
        assert_eq!(enricher.upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shared_team_is_fetched_once_per_ttl() {
        // Team 1 plays in fixtures 11 and 13; a later request reuses the cache.
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        enricher.enrich_day("2025-09-24", false).await.unwrap();
        let after_first = enricher.upstream.calls.load(Ordering::SeqCst);

        enricher.enrich_day("2025-09-24", false).await.unwrap();
        let after_second = enricher.upstream.calls.load(Ordering::SeqCst);

        // Second run: source + the uncached failing odds call only.
        assert_eq!(after_second - after_first, 2);
    }

    #[tokio::test]
    async fn test_filtered_day_reshapes_allowed_fixtures() {
        let upstream = ScriptedUpstream::default().respond(
            "http://source/matches?date=2025-09-24",
            Ok(json!({"response": [
                {"fixture": {"id": 1, "date": "2025-09-24T19:00:00+00:00", "referee": "M. Oliver",
                             "status": {"short": "NS", "elapsed": null}, "venue": {"id": 556, "name": "Old Trafford", "city": "Manchester"}},
                 "league": {"id": 39, "name": "Premier League", "country": "England"},
                 "teams": {"home": {"id": 33, "name": "Manchester United"}, "away": {"id": 40, "name": "Liverpool"}},
                 "score": {"fulltime": {"home": null, "away": null}}},
                {"fixture": {"id": 2}, "league": {"name": "J1 League", "country": "Japan"}}
            ]})),
        );
        let enricher = MatchEnricher::new(upstream, Arc::new(test_config()));
        let day = enricher.filtered_day("2025-09-24").await.unwrap();

        assert_eq!(day.matches_count, 1);
        let m = &day.matches[0];
        assert_eq!(m.fixture_id, Some(1));
        assert_eq!(m.status.as_deref(), Some("NS"));
        assert_eq!(m.referee.as_deref(), Some("M. Oliver"));
        assert_eq!(m.venue.as_ref().and_then(|v| v.name.as_deref()), Some("Old Trafford"));
    }

    #[tokio::test]
    async fn test_filtered_day_accepts_flat_matches() {
        let source = json!({"matches": [
            {"country": "England", "league": "Premier League", "fixture_id": 11, "home_id": 1, "away_id": 2},
            {"country": "Japan", "league": "J1 League", "fixture_id": 12, "home_id": 5, "away_id": 6}
        ]});
        let upstream = ScriptedUpstream::default().respond("http://source/matches?date=2025-09-24", Ok(source));
        let enricher = MatchEnricher::new(upstream, Arc::new(test_config()));

        let filtered = enricher.filtered_day("2025-09-24").await.unwrap();
        let full = enricher.enrich_day("2025-09-24", false).await.unwrap();
        assert_eq!(filtered.matches_count, 1);
        assert_eq!(filtered.matches_count, full.matches_count);

        let m = &filtered.matches[0];
        assert_eq!(m.fixture_id, Some(11));
        assert_eq!(m.league.name.as_deref(), Some("Premier League"));
        assert_eq!(m.league.country.as_deref(), Some("England"));
        assert_eq!(m.teams.home.id, Some(1));
        assert_eq!(m.teams.away.id, Some(2));
    }

    #[tokio::test]
    async fn test_fixtures_by_date_attaches_history() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        let day = enricher.fixtures_by_date("2025-09-24").await.unwrap();

        assert_eq!(day.matches_count, 2);
        let ids: Vec<_> = day.matches.iter().map(|m| m.fixture_id).collect();
        assert_eq!(ids, vec![Some(21), Some(23)]);

        let first = &day.matches[0];
        assert_eq!(first.home.as_deref(), Some("T1"));
        assert_eq!(first.score, "1-0");
        assert_eq!(first.league.as_deref(), Some("Championship"));
        assert_eq!(first.league_id, Some(40));
        assert_eq!(first.history.home.len(), 2);
        assert_eq!(first.history.home[0].score, "2-1");
        assert_eq!(first.history.home[0].opponent.as_deref(), Some("T9"));
        // Team 4 has no script: its history is empty and the failure is reported.
        assert!(first.history.away.is_empty());
        assert_eq!(first.enrichment_errors.len(), 1);
        assert!(first.enrichment_errors[0].contains("team 4"));

        let second = &day.matches[1];
        assert_eq!(second.score, "-");
        assert_eq!(second.status.as_deref(), Some("NS"));
        assert_eq!(second.history.away.len(), 0);
        assert_eq!(second.history.home[0].score, "0-3");
        assert!(second.enrichment_errors.is_empty());
    }

    #[tokio::test]
    async fn test_fixtures_by_date_failure_is_an_error() {
        let enricher = MatchEnricher::new(ScriptedUpstream::default(), Arc::new(test_config()));
        let result = enricher.fixtures_by_date("2025-09-24").await;
        assert!(matches!(result, Err(UpstreamFailure::Unavailable { status: Some(404), .. })));
    }

    #[tokio::test]
    async fn test_oversized_concurrency_is_clamped() {
        let mut config = test_config();
        config.upstream_concurrency = usize::MAX;
        let enricher = MatchEnricher::new(scripted(), Arc::new(config));

        assert_eq!(enricher.permits.available_permits(), Semaphore::MAX_PERMITS);
        let day = enricher.enrich_day("2025-09-24", false).await.unwrap();
        assert_eq!(day.matches_count, 3);
    }

    #[tokio::test]
    async fn test_team_form() {
        let enricher = MatchEnricher::new(scripted(), Arc::new(test_config()));
        let form = enricher.team_form(1).await.unwrap();

        assert_eq!(form.team_id, 1);
        assert_eq!(form.history.len(), 2);
        assert_eq!(form.history[0].opponent.as_deref(), Some("T9"));
        assert_eq!(form.history[0].score, "2-1");
        assert_eq!(form.summary.games_counted, 2);
    }
}
