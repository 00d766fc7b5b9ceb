mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::models::{ApiResponse, CountriesInfo, EnrichedDay, FilteredDay, FixtureDay, TeamForm};
use crate::services::{MatchEnricher, Upstream, UpstreamClient};
use crate::utils::{parse_flag, parse_match_date};

pub struct AppState<U> {
    enricher: Arc<MatchEnricher<U>>,
}

impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            enricher: self.enricher.clone(),
        }
    }
}

impl<U: Upstream> AppState<U> {
    pub fn new(enricher: MatchEnricher<U>) -> Self {
        Self {
            enricher: Arc::new(enricher),
        }
    }
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env()?);
    if !config.has_api_key() {
        tracing::warn!("API_FOOTBALL_KEY not set; upstream requests will be unauthenticated");
    }

    let upstream = UpstreamClient::from_config(&config)?;
    let app = create_router(AppState::new(MatchEnricher::new(upstream, config)));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Fixture relay listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router<U: Upstream>(state: AppState<U>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/test", get(liveness))
        .route("/health", get(health_check))
        .route("/matches", get(matches_handler::<U>))
        .route("/matches/full", get(matches_full_handler::<U>))
        .route("/matches_filtered/{date}", get(matches_filtered_handler::<U>))
        .route("/fixtures", get(fixtures_handler::<U>))
        .route("/teams/{id}/form", get(team_form_handler::<U>))
        .route("/debug/countries", get(countries_handler::<U>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn liveness() -> &'static str {
    "API Online"
}

async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Fixture relay is running"))
}

#[derive(Deserialize)]
struct MatchesQuery {
    date: Option<String>,
    only_top: Option<String>,
}

fn required_date(raw: Option<&str>) -> Result<String, ApiError> {
    let date = raw.map(str::trim).filter(|d| !d.is_empty());
    let date = date.ok_or(ApiError::MissingParameter("date"))?;
    if parse_match_date(date).is_none() {
        return Err(ApiError::InvalidParameter("date must be YYYY-MM-DD".to_string()));
    }
    Ok(date.to_string())
}

// GET /matches?date= - matches source passthrough
async fn matches_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<Value>, ApiError> {
    let date = required_date(params.date.as_deref())?;
    let data = state.enricher.source_matches(&date).await?;
    Ok(Json(data))
}

// GET /matches/full?date=&only_top= - matches with odds and team form
async fn matches_full_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<EnrichedDay>, ApiError> {
    let date = required_date(params.date.as_deref())?;
    let only_top = parse_flag(params.only_top.as_deref());
    let day = state.enricher.enrich_day(&date, only_top).await?;
    Ok(Json(day))
}

// GET /matches_filtered/{date}
async fn matches_filtered_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Path(date): Path<String>,
) -> Result<Json<FilteredDay>, ApiError> {
    let date = required_date(Some(date.as_str()))?;
    let day = state.enricher.filtered_day(&date).await?;
    Ok(Json(day))
}

// GET /fixtures?date= - the day's fixtures from API-Football with team history
async fn fixtures_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<FixtureDay>, ApiError> {
    let date = required_date(params.date.as_deref())?;
    let day = state.enricher.fixtures_by_date(&date).await?;
    Ok(Json(day))
}

// GET /teams/{id}/form - last 5 results of one team
async fn team_form_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Path(id): Path<String>,
) -> Result<Json<TeamForm>, ApiError> {
    let team_id = id
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidParameter("team id must be a positive integer".to_string()))?;
    let form = state.enricher.team_form(team_id).await?;
    Ok(Json(form))
}

// GET /debug/countries
async fn countries_handler<U: Upstream>(State(state): State<AppState<U>>) -> Json<CountriesInfo> {
    let config = state.enricher.config();
    Json(CountriesInfo {
        allowed_countries: config.allowed_countries.clone(),
        top_leagues: config.top_leagues.clone(),
    })
}
