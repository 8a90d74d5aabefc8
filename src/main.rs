pub mod board;
pub mod config;
pub mod credentials;
pub mod error;
pub mod geodata;
pub mod projection;
pub mod render;
pub mod server;
pub mod snapshot;
pub mod types;
pub mod view;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Fetch the live board and save it as a CSV snapshot
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "board_locations.csv")]
        output: PathBuf,
    },
    /// List the metro-area groups in the geometry file
    Groups {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

async fn fetch_live_board(
    app_config: &config::AppConfig,
    palette: &projection::StagePalette,
) -> anyhow::Result<Result<Vec<types::BoardItem>, error::BoardError>> {
    // Credential problems are fatal; board problems are reported to the UI
    let provider = credentials::from_config(&app_config.credentials);
    let transport = board::HttpTransport::new(&app_config.board, provider.as_ref())
        .context("Failed to set up board API client")?;

    Ok(board::fetch_board(&transport, &app_config.board, palette).await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "site_atlas=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let palette = projection::StagePalette::from_config(&app_config.stages);

            // 1. Load regions
            let regions = geodata::load_regions(&app_config)?;

            // 2. Load board items, from a snapshot if one is configured
            let board = match &app_config.input.board_csv {
                Some(path) => {
                    info!("Loading board snapshot from {:?}", path);
                    Ok(snapshot::load_snapshot(path, &palette)?)
                }
                None => fetch_live_board(&app_config, &palette).await?,
            };

            match &board {
                Ok(items) => info!("Loaded {} board items", items.len()),
                Err(err) => warn!("Serving without board items: {}", err),
            }

            // 3. Serve
            let state = server::AppState::new(app_config, regions, board);
            server::start_server(state).await?;
        }
        Commands::Export { config, output } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let palette = projection::StagePalette::from_config(&app_config.stages);

            let items = match fetch_live_board(&app_config, &palette).await? {
                Ok(items) => items,
                Err(err) => {
                    error!("Board export failed: {}", err);
                    return Err(err.into());
                }
            };

            snapshot::save_snapshot(&items, output)?;
            info!("Wrote {} board items to {:?}", items.len(), output);
        }
        Commands::Groups { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let regions = geodata::load_regions(&app_config)?;
            for group in regions.groups() {
                println!("{}", group);
            }
        }
    }

    Ok(())
}
