mod api;
mod config;
mod engine;
mod error;
mod types;
mod views;
mod web;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use api::{ApiClient, RegimeService};
use config::{Settings, DEFAULT_CONFIG_FILE};
use engine::{AnalysisController, WorkflowState};
use types::parse_date;
use views::DashboardView;
use web::{start_dashboard_server, AppState};

#[derive(Parser)]
#[command(name = "regime-dashboard")]
#[command(version = "0.1.0")]
#[command(about = "Market regime dashboard backed by a remote HMM analysis service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the browser dashboard
    Serve {
        /// Dashboard port (defaults to dashboard.port from the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List datasets known to the analysis service
    Datasets,
    /// Download market data for a ticker into a new dataset
    Fetch {
        /// Ticker symbol (case-insensitive)
        #[arg(short, long)]
        ticker: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: Option<String>,
    },
    /// Run the regime analysis on a dataset and print the report
    Analyze {
        /// Dataset filename (defaults to the first listed dataset)
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Regime Dashboard v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(&cli.config)?;
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!("Configuration error: {}", e);
        }
        bail!("invalid configuration ({} errors)", errors.len());
    }

    let client = Arc::new(ApiClient::new(&settings.service)?);
    info!("Analysis service at {}", client.base_url());
    let controller = Arc::new(AnalysisController::new(client.clone()));

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(settings.dashboard.port);
            start_dashboard_server(AppState::new(controller, settings), port).await?;
        }
        Commands::Datasets => {
            list_datasets(client.as_ref()).await?;
        }
        Commands::Fetch { ticker, start, end } => {
            run_fetch(&controller, &settings, ticker, start, end).await?;
        }
        Commands::Analyze { file } => {
            run_analysis(&controller, file).await?;
        }
    }

    Ok(())
}

async fn list_datasets(client: &ApiClient) -> Result<()> {
    // Listing through the controller would swallow the error.
    let files = client.list_datasets().await?;

    if files.is_empty() {
        info!("No datasets available");
    }
    for file in files {
        println!("{}", file);
    }
    Ok(())
}

async fn run_fetch(
    controller: &AnalysisController,
    settings: &Settings,
    ticker: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let (default_start, default_end) = settings.dashboard.default_range()?;
    let ticker = ticker.unwrap_or_else(|| settings.dashboard.default_ticker.clone());
    let start = match start {
        Some(s) => parse_date(&s).with_context(|| format!("invalid start date '{}'", s))?,
        None => default_start,
    };
    let end = match end {
        Some(s) => parse_date(&s).with_context(|| format!("invalid end date '{}'", s))?,
        None => default_end,
    };
    if start > end {
        bail!("start date {} is after end date {}", start, end);
    }

    controller.run_fetch(&ticker, start, end).await?;

    match controller.state().await {
        WorkflowState::Error { message } => Err(anyhow!(message)),
        _ => {
            let selected = controller.selected().await.unwrap_or_default();
            info!("Dataset ready: {}", selected);
            println!("{}", selected);
            Ok(())
        }
    }
}

async fn run_analysis(controller: &AnalysisController, file: Option<String>) -> Result<()> {
    controller.refresh_dataset_list().await;
    if let Some(file) = file {
        controller.select_dataset(file).await;
    }

    let Some(filename) = controller.selected().await else {
        bail!("no dataset selected and the service lists none; run `fetch` first");
    };

    controller.run_analyze(&filename).await?;

    match controller.state().await {
        WorkflowState::Ready { snapshot } => {
            print_report(&DashboardView::build(&snapshot));
            Ok(())
        }
        WorkflowState::Error { message } => Err(anyhow!(message)),
        other => {
            warn!("Analysis ended in unexpected state {}", other.status());
            Err(anyhow!("analysis did not complete"))
        }
    }
}

fn print_report(view: &DashboardView) {
    println!();
    println!("=== {} ===", view.filename);
    println!(
        "Current regime: {} [{}]  ({} observations, {}-state model)",
        view.status.regime, view.status.class.category, view.status.total_days, view.status.n_states
    );
    println!(
        "Model quality:  {}  (persistence {:.1}%, avg regime life {:.1} days)",
        view.quality.quality.tier.as_str(),
        view.quality.persistence_score * 100.0,
        view.quality.avg_duration
    );

    println!();
    println!("Regime stability:");
    for entry in &view.stability {
        println!(
            "  {:<24} {:>6.1}d mean lifespan ({} runs) [{}]",
            entry.row.regime, entry.row.avg, entry.row.count, entry.class.category
        );
    }

    let p = &view.prediction;
    println!();
    println!(
        "Next phase (t+1): {} [{}]  confidence {:.1}% ({:?})",
        p.next_regime,
        p.next_class.category,
        p.confidence * 100.0,
        p.confidence_level
    );
    println!(
        "  expected return {:+.2}%, expected volatility {:.2}%",
        p.expected_return * 100.0,
        p.expected_volatility * 100.0
    );
    for prob in &p.probabilities {
        println!("  {:<24} {:>5.1}%", prob.regime, prob.probability * 100.0);
    }

    println!();
    match &view.timeline {
        Some(timeline) => {
            println!("Regime timeline ({} regimes):", timeline.categories.len());
            for segment in timeline.segments() {
                println!(
                    "  {} .. {}  {:<24} ({} obs)",
                    segment.start_date,
                    segment.end_date,
                    segment.regime,
                    segment.observations()
                );
            }
        }
        None => println!("Regime timeline unavailable"),
    }
}
