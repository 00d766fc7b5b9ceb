use std::cmp::Ordering;

use crate::models::{Fixture, FormSummary, Goals, HistoryLine, MatchResult};
use crate::utils::{mean, round_to};

/// Fixtures considered per team.
pub const FORM_WINDOW: usize = 5;

/// Goals for and against `team_id` in a played fixture.
/// `None` if the team did not play in it or the full-time score is incomplete.
fn goals_for_team(fixture: &Fixture, team_id: i64) -> Option<(i64, i64)> {
    let home = fixture.score.fulltime.home?;
    let away = fixture.score.fulltime.away?;

    if fixture.teams.home.id == Some(team_id) {
        Some((home, away))
    } else if fixture.teams.away.id == Some(team_id) {
        Some((away, home))
    } else {
        None
    }
}

fn classify(goals_for: i64, goals_against: i64) -> MatchResult {
    match goals_for.cmp(&goals_against) {
        Ordering::Greater => MatchResult::Win,
        Ordering::Equal => MatchResult::Draw,
        Ordering::Less => MatchResult::Loss,
    }
}

/// Summarize a team's recent fixtures. Input order is kept; only the first
/// `FORM_WINDOW` fixtures are looked at, unscored ones are not counted.
pub fn summarize(fixtures: &[Fixture], team_id: i64) -> FormSummary {
    let mut results = Vec::with_capacity(FORM_WINDOW);
    let mut goals_for = Vec::with_capacity(FORM_WINDOW);
    let mut goals_against = Vec::with_capacity(FORM_WINDOW);

    for fixture in fixtures.iter().take(FORM_WINDOW) {
        let Some((gf, ga)) = goals_for_team(fixture, team_id) else { continue };
        results.push(classify(gf, ga));
        goals_for.push(gf);
        goals_against.push(ga);
    }

    let games = results.len();
    let wins = results.iter().filter(|r| **r == MatchResult::Win).count();

    FormSummary {
        games_counted: games,
        avg_goals_for: mean(&goals_for).map(|v| round_to(v, 2)),
        avg_goals_against: mean(&goals_against).map(|v| round_to(v, 2)),
        win_rate: (games > 0).then(|| wins as f64 / games as f64),
        last_results: results,
    }
}

/// `"2-1"`, or `"-"` unless both sides are known.
pub fn score_text(goals: &Goals) -> String {
    match (goals.home, goals.away) {
        (Some(h), Some(a)) => format!("{}-{}", h, a),
        _ => "-".to_string(),
    }
}

/// Compact one-line view of each fixture from `team_id`'s point of view.
pub fn history_lines(fixtures: &[Fixture], team_id: i64) -> Vec<HistoryLine> {
    fixtures
        .iter()
        .take(FORM_WINDOW)
        .map(|f| {
            let opponent = if f.teams.home.id == Some(team_id) {
                f.teams.away.name.clone()
            } else {
                f.teams.home.name.clone()
            };
            HistoryLine {
                opponent,
                score: score_text(&f.score.fulltime),
                status: f.fixture.status.short.clone(),
            }
        })
        .collect()
}
