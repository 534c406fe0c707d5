use analytics::{AggregationEngine, Dashboard, DashboardReport, SourceVersion};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use configuration::{Config, LoggingSettings, SourceKind};
use core_types::{FilterSelection, RawRow};
use database::{connect, is_managed_table, run_migrations, StockRepository};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// The main entry point for the stock dashboard.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file, if present.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = configuration::load_config_from(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(kind) = cli.source {
        config.source.kind = kind;
    }
    if let Some(path) = cli.input.clone() {
        config.source.kind = SourceKind::File;
        config.source.path = Some(path);
    }
    config.validate()?;

    let _log_guard = init_tracing(&config.logging)?;
    let source = RowSource::open(&config).await?;
    let mut dashboard = Dashboard::new(AggregationEngine::new(config.rankings.clone()));

    // Execute the appropriate command
    match cli.command {
        Commands::Options => {
            refresh(&mut dashboard, &source).await?;
            print_options(&dashboard)?;
        }
        Commands::Report(args) => handle_report(args, &mut dashboard, &source).await?,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Filter daily stock records and print the derived dashboard tables.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `source.kind` from the configuration.
    #[arg(long, global = true, value_enum)]
    source: Option<SourceKind>,

    /// Reads rows from this JSON file instead of the configured source.
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selectable tickers, sectors, months and years.
    Options,
    /// Apply a filter selection and print every derived table.
    Report(ReportArgs),
}

#[derive(Parser)]
struct ReportArgs {
    /// Ticker to keep (repeatable). Omit or pass "All" for every ticker.
    #[arg(long = "ticker")]
    tickers: Vec<String>,

    /// Sector to keep (repeatable). Omit or pass "All" for every sector.
    #[arg(long = "sector")]
    sectors: Vec<String>,

    /// Month name, e.g. "March". Also enables monthly gainers and losers.
    #[arg(long)]
    month: Option<String>,

    /// Four-digit year.
    #[arg(long)]
    year: Option<String>,

    /// Print the report as JSON instead of tables.
    #[arg(long)]
    json: bool,

    /// Re-check the source every N seconds and print again when it changes.
    #[arg(long, value_name = "SECONDS")]
    watch: Option<u64>,
}

// ==============================================================================
// Logging
// ==============================================================================

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level. The
/// returned guard must live as long as file logging should keep flushing.
fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("invalid logging level")?;

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "stock-dashboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

// ==============================================================================
// Row Sources
// ==============================================================================

enum RowSource {
    Database(StockRepository),
    File(PathBuf),
}

impl RowSource {
    async fn open(config: &Config) -> Result<Self> {
        match config.source.kind {
            SourceKind::Database => {
                let pool = connect().await?;
                if is_managed_table(&config.source.table) {
                    run_migrations(&pool).await?;
                } else {
                    tracing::info!(table = %config.source.table, "Custom source table, migrations skipped.");
                }
                Ok(Self::Database(StockRepository::new(pool, config.source.table.clone())))
            }
            SourceKind::File => {
                let path = config
                    .source
                    .path
                    .clone()
                    .context("source.path is required for the file source")?;
                Ok(Self::File(path))
            }
        }
    }

    async fn version(&self) -> Result<SourceVersion> {
        let version = match self {
            Self::Database(repo) => repo.data_version().await?,
            Self::File(path) => file_version(path)?,
        };
        Ok(SourceVersion::new(version))
    }

    async fn fetch(&self) -> Result<Vec<RawRow>> {
        match self {
            Self::Database(repo) => Ok(repo.fetch_rows().await?),
            Self::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("{} is not a JSON array of row objects", path.display()))
            }
        }
    }
}

fn file_version(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_nanos());
    Ok(format!("{}:{}:{}", path.display(), metadata.len(), modified))
}

/// Loads the store when the source version moved. Returns whether it did.
async fn refresh(dashboard: &mut Dashboard, source: &RowSource) -> Result<bool> {
    let version = source.version().await?;
    if dashboard.is_current(&version) {
        return Ok(false);
    }

    let rows = source.fetch().await?;
    dashboard.install(version, &rows)?;
    Ok(true)
}

// ==============================================================================
// Report Command
// ==============================================================================

async fn handle_report(args: ReportArgs, dashboard: &mut Dashboard, source: &RowSource) -> Result<()> {
    let selection = FilterSelection::from_choices(
        &args.tickers,
        &args.sectors,
        args.month.as_deref(),
        args.year.as_deref(),
    )?;

    refresh(dashboard, source).await?;
    emit(&*dashboard.render(&selection)?, args.json)?;

    let Some(seconds) = args.watch else {
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(seconds.max(1)));
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match refresh(dashboard, source).await {
                    Ok(true) => emit(&*dashboard.render(&selection)?, args.json)?,
                    Ok(false) => tracing::debug!("Source unchanged."),
                    Err(e) => tracing::error!(error = ?e, "Failed to refresh the record store."),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch.");
                return Ok(());
            }
        }
    }
}

fn emit(report: &DashboardReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }
    Ok(())
}

fn print_options(dashboard: &Dashboard) -> Result<()> {
    let options = dashboard.options()?;
    let mut table = new_table(vec!["Filter", "Values"]);
    let join = |values: Vec<String>| values.join(", ");
    table.add_row(vec!["Ticker".to_string(), join(options.tickers)]);
    table.add_row(vec!["Sector".to_string(), join(options.sectors)]);
    table.add_row(vec!["Month".to_string(), join(options.months)]);
    table.add_row(vec![
        "Year".to_string(),
        join(options.years.iter().map(i32::to_string).collect()),
    ]);
    println!("{table}");
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    table
}

fn number(value: Option<f64>) -> Cell {
    Cell::new(value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v)))
}

fn print_report(report: &DashboardReport) {
    println!("Rows matching the selection: {}", report.filtered_rows);

    if !report.preview.is_empty() {
        let mut table = new_table(vec!["Ticker", "Date", "Sector", "Close", "Volatility", "Yearly", "Monthly", "Cumulative"]);
        for record in &report.preview {
            table.add_row(vec![
                Cell::new(record.ticker()),
                Cell::new(record.date()),
                Cell::new(record.sector().unwrap_or("-")),
                number(record.close()),
                number(record.volatility()),
                number(record.yearly_return()),
                number(record.monthly_return()),
                number(record.cumulative_return()),
            ]);
        }
        println!("\nRaw Data Preview\n{table}");
    }

    if !report.volatility.is_empty() {
        let mut table = new_table(vec!["Ticker", "Mean Volatility", "Rows"]);
        for entry in &report.volatility {
            table.add_row(vec![
                Cell::new(&entry.ticker),
                number(Some(entry.mean_volatility)),
                Cell::new(entry.observations),
            ]);
        }
        println!("\nMost Volatile Stocks\n{table}");
    }

    if !report.sector_returns.is_empty() {
        let mut table = new_table(vec!["Sector", "Average Yearly Return", "Rows"]);
        for entry in &report.sector_returns {
            table.add_row(vec![
                Cell::new(&entry.sector),
                number(Some(entry.mean_yearly_return)),
                Cell::new(entry.observations),
            ]);
        }
        println!("\nAverage Yearly Return by Sector\n{table}");
    }

    if !report.correlation.is_empty() {
        let mut header = vec![""];
        header.extend(report.correlation.tickers.iter().map(String::as_str));
        let mut table = new_table(header);
        for (ticker, row) in report.correlation.tickers.iter().zip(&report.correlation.values) {
            let mut cells = vec![Cell::new(ticker)];
            cells.extend(row.iter().map(|value| number(*value)));
            table.add_row(cells);
        }
        println!("\nClose Price Correlation\n{table}");
    }

    if !report.cumulative.is_empty() {
        let mut table = new_table(vec!["Rank", "Ticker", "As Of", "Cumulative Return", "Points"]);
        for (rank, leader) in report.cumulative.leaders.iter().enumerate() {
            let points = report
                .cumulative
                .series
                .iter()
                .filter(|p| p.ticker == leader.ticker)
                .count();
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(&leader.ticker),
                Cell::new(leader.date),
                number(Some(leader.value)),
                Cell::new(points),
            ]);
        }
        println!("\nTop Stocks by Cumulative Return\n{table}");
    }

    if !report.yearly.is_empty() {
        let mut table = new_table(vec!["Best", "Yearly Return", "Worst", "Yearly Return"]);
        for (best, worst) in report.yearly.best.iter().zip(&report.yearly.worst) {
            table.add_row(vec![
                Cell::new(&best.ticker),
                number(Some(best.value)),
                Cell::new(&worst.ticker),
                number(Some(worst.value)),
            ]);
        }
        println!("\nBest and Worst Performing Stocks\n{table}");
    }

    if let Some(movers) = &report.monthly_movers {
        let mut table = new_table(vec!["Gainer", "Monthly Return", "Loser", "Monthly Return"]);
        for (gainer, loser) in movers.gainers.iter().zip(&movers.losers) {
            table.add_row(vec![
                Cell::new(&gainer.ticker),
                number(Some(gainer.value)),
                Cell::new(&loser.ticker),
                number(Some(loser.value)),
            ]);
        }
        println!("\nTop Gainers and Losers - {}\n{table}", movers.month);
    }
}
