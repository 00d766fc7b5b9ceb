mod api;
mod cli;
mod config;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fixture-relay")]
#[command(about = "Football fixtures proxy with odds and recent-form enrichment")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Print enriched matches for a date
    Matches {
        /// Date as YYYY-MM-DD
        #[arg(short, long)]
        date: String,
        /// Only keep the configured top leagues
        #[arg(long)]
        only_top: bool,
    },
    /// Print the day's fixtures from API-Football with each team's last results
    Fixtures {
        /// Date as YYYY-MM-DD
        #[arg(short, long)]
        date: String,
    },
    /// Print a team's recent form
    Form {
        #[arg(short, long)]
        team: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            api::serve(port).await?;
        }
        Some(Commands::Matches { date, only_top }) => {
            if utils::parse_match_date(&date).is_none() {
                anyhow::bail!("date must be YYYY-MM-DD, got '{}'", date);
            }
            cli::show_matches(&date, only_top).await?;
        }
        Some(Commands::Fixtures { date }) => {
            if utils::parse_match_date(&date).is_none() {
                anyhow::bail!("date must be YYYY-MM-DD, got '{}'", date);
            }
            cli::show_fixtures(&date).await?;
        }
        Some(Commands::Form { team }) => {
            tracing::info!("Querying form for team {}", team);
            cli::show_team_form(team).await?;
        }
        None => {
            // Default to serving
            api::serve(8000).await?;
        }
    }

    Ok(())
}
