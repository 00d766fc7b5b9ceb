use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::{EnrichedMatch, FormSummary, HistoryLine, MatchResult};
use crate::services::normalize::league_name_of;
use crate::services::{MatchEnricher, UpstreamClient};

fn build_enricher() -> Result<MatchEnricher<UpstreamClient>> {
    let config = Arc::new(Config::from_env()?);
    if !config.has_api_key() {
        println!("⚠️  API_FOOTBALL_KEY not set, odds and history lookups will likely fail");
    }
    let upstream = UpstreamClient::from_config(&config)?;
    Ok(MatchEnricher::new(upstream, config))
}

fn form_string(summary: Option<&FormSummary>) -> String {
    let Some(summary) = summary else { return "-".to_string() };
    if summary.last_results.is_empty() {
        return "no games".to_string();
    }
    let form: String = summary
        .last_results
        .iter()
        .map(|r| match r {
            MatchResult::Win => 'W',
            MatchResult::Draw => 'D',
            MatchResult::Loss => 'L',
        })
        .collect();
    format!(
        "{} (win {:.0}%, gf {:.2}, ga {:.2})",
        form,
        summary.win_rate.unwrap_or(0.0) * 100.0,
        summary.avg_goals_for.unwrap_or(0.0),
        summary.avg_goals_against.unwrap_or(0.0)
    )
}

fn print_match(i: usize, m: &EnrichedMatch) {
    let league = league_name_of(&m.base).unwrap_or_else(|| "?".to_string());
    println!(
        "{}. fixture {} ({}) home {} vs away {}",
        i + 1,
        m.fixture_id.map_or("-".to_string(), |id| id.to_string()),
        league,
        m.home_id.map_or("-".to_string(), |id| id.to_string()),
        m.away_id.map_or("-".to_string(), |id| id.to_string()),
    );
    println!("   Home form: {}", form_string(m.home_summary.as_ref()));
    println!("   Away form: {}", form_string(m.away_summary.as_ref()));
    if let Some(odds) = &m.odds {
        println!("   Odds: {} bookmaker entries", odds.all.len());
    }
    for err in &m.enrichment_errors {
        println!("   ❌ {}", err);
    }
}

pub async fn show_matches(date: &str, only_top: bool) -> Result<()> {
    let enricher = build_enricher()?;

    println!("⚽ Enriching matches for {}...", date);

    let day = enricher
        .enrich_day(date, only_top)
        .await
        .context("Failed to fetch matches")?;

    if day.matches.is_empty() {
        println!("📭 No matches for {} in the allowed countries.", date);
        return Ok(());
    }

    println!("✅ {} matches:\n", day.matches_count);
    for (i, m) in day.matches.iter().enumerate() {
        print_match(i, m);
    }

    Ok(())
}

fn history_string(lines: &[HistoryLine]) -> String {
    if lines.is_empty() {
        return "-".to_string();
    }
    lines.iter().map(|l| l.score.as_str()).collect::<Vec<_>>().join(" ")
}

pub async fn show_fixtures(date: &str) -> Result<()> {
    let enricher = build_enricher()?;

    println!("📅 Fetching fixtures for {} from API-Football...", date);

    let day = enricher
        .fixtures_by_date(date)
        .await
        .context("Failed to fetch fixtures")?;

    if day.matches.is_empty() {
        println!("📭 No fixtures for {} in the allowed countries.", date);
        return Ok(());
    }

    for (i, f) in day.matches.iter().enumerate() {
        println!(
            "{}. {} {} {} [{}] ({})",
            i + 1,
            f.home.as_deref().unwrap_or("?"),
            f.score,
            f.away.as_deref().unwrap_or("?"),
            f.status.as_deref().unwrap_or("-"),
            f.league.as_deref().unwrap_or("?")
        );
        println!("   Home last: {}", history_string(&f.history.home));
        println!("   Away last: {}", history_string(&f.history.away));
        for err in &f.enrichment_errors {
            println!("   ❌ {}", err);
        }
    }

    Ok(())
}

pub async fn show_team_form(team_id: i64) -> Result<()> {
    let enricher = build_enricher()?;

    println!("📊 Last {} fixtures for team {}:", crate::services::form::FORM_WINDOW, team_id);

    let form = enricher
        .team_form(team_id)
        .await
        .context("Failed to fetch team history")?;

    for line in &form.history {
        println!(
            "   {} vs {} [{}]",
            line.score,
            line.opponent.as_deref().unwrap_or("?"),
            line.status.as_deref().unwrap_or("-")
        );
    }
    println!("\n   Form: {}", form_string(Some(&form.summary)));

    Ok(())
}
