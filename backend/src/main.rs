//! LedgerFlow CLI - Turn general-ledger exports into financial statements
//!
//! # Main Commands
//!
//! ```bash
//! ledgerflow serve                     # Start HTTP server (port 3000)
//! ledgerflow process ledger.csv        # Full pipeline, artifacts in the results store
//! ledgerflow process ledger.csv -o out # Full pipeline, artifacts in ./out
//! ledgerflow jobs list                 # Stored runs
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! ledgerflow clean ledger.csv          # Cleaned entries and rejected rows as JSON
//! ledgerflow ratios ledger.csv         # Ratio table on stdout
//! ledgerflow chart export              # Built-in chart of accounts as JSON
//! ledgerflow chart check chart.json    # Validate a chart file
//! ledgerflow chart classify 1020 3200  # Look account codes up
//! ```
//!
//! Environment variables (see [`AppConfig`]) set the defaults; flags win.

use clap::{Parser, Subcommand};
use ledgerflow::config::parse_delimiter;
use ledgerflow::export::{chart_data, Artifact};
use ledgerflow::{
    clean_file, run_file, shape, shape_all, AppConfig, ArtifactStore, ChartOfAccounts,
    CsvTableWriter, Granularity, LedgerReport, PipelineOptions, TableWriter,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledgerflow")]
#[command(about = "Clean general-ledger exports and build financial statements and ratios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: ledger CSV → statements, ratios and summaries
    Process {
        /// Input ledger file
        input: PathBuf,

        /// Chart of accounts JSON file (default: built-in chart)
        #[arg(short, long)]
        chart: Option<PathBuf>,

        /// Period granularity: year, quarter or month
        #[arg(short, long)]
        granularity: Option<Granularity>,

        /// Write artifacts to this directory instead of the results store
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Export delimiter (a single character, or "tab")
        #[arg(short, long)]
        delimiter: Option<String>,
    },

    /// Clean a ledger without classifying it
    Clean {
        /// Input ledger file
        input: PathBuf,

        /// Period granularity: year, quarter or month
        #[arg(short, long)]
        granularity: Option<Granularity>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the ratio table of a ledger
    Ratios {
        /// Input ledger file
        input: PathBuf,

        /// Chart of accounts JSON file (default: built-in chart)
        #[arg(short, long)]
        chart: Option<PathBuf>,

        /// Period granularity: year, quarter or month
        #[arg(short, long)]
        granularity: Option<Granularity>,
    },

    /// Inspect charts of accounts
    Chart {
        #[command(subcommand)]
        action: ChartAction,
    },

    /// Manage stored pipeline runs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: LEDGERFLOW_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ChartAction {
    /// Write the built-in chart as JSON, as a starting point for a custom one
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a chart file and report what it defines
    Check {
        /// Chart JSON file
        file: PathBuf,
    },

    /// Classify account codes
    Classify {
        /// Account codes
        #[arg(required = true)]
        codes: Vec<String>,

        /// Chart of accounts JSON file (default: built-in chart)
        #[arg(short, long)]
        chart: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// List stored runs, newest first
    List,

    /// Delete a stored run
    Delete {
        /// Job ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let result = match cli.command {
        Commands::Process {
            input,
            chart,
            granularity,
            output_dir,
            delimiter,
        } => cmd_process(
            &config,
            &input,
            chart.as_deref(),
            granularity,
            output_dir.as_deref(),
            delimiter.as_deref(),
        ),

        Commands::Clean {
            input,
            granularity,
            output,
        } => cmd_clean(&config, &input, granularity, output.as_deref()),

        Commands::Ratios {
            input,
            chart,
            granularity,
        } => cmd_ratios(&config, &input, chart.as_deref(), granularity),

        Commands::Chart { action } => cmd_chart(&config, action),

        Commands::Jobs { action } => cmd_jobs(&config, action),

        Commands::Serve { port } => cmd_serve(config, port).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_chart(config: &AppConfig, path: Option<&Path>) -> Result<ChartOfAccounts, Box<dyn std::error::Error>> {
    let chart = match path {
        Some(p) => ChartOfAccounts::load(p)?,
        None => config.load_chart()?,
    };
    Ok(chart)
}

fn options(config: &AppConfig, granularity: Option<Granularity>) -> PipelineOptions {
    PipelineOptions {
        granularity: granularity.unwrap_or(config.granularity),
    }
}

fn cmd_process(
    config: &AppConfig,
    input: &Path,
    chart: Option<&Path>,
    granularity: Option<Granularity>,
    output_dir: Option<&Path>,
    delimiter: Option<&str>,
) -> CliResult {
    let chart = load_chart(config, chart)?;
    let writer = match delimiter {
        Some(d) => CsvTableWriter {
            delimiter: parse_delimiter(d).ok_or_else(|| format!("Invalid delimiter: '{}'", d))?,
        },
        None => config.writer(),
    };

    let report = run_file(input, &chart, &options(config, granularity))?;
    print_report(&report);

    match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            for (artifact, table) in shape_all(&report) {
                let path = dir.join(format!("{}.{}", artifact.slug(), writer.extension()));
                writer.write_file(&table, &path)?;
            }
            let charts = serde_json::to_string_pretty(&chart_data(&report))?;
            fs::write(dir.join("charts.json"), charts)?;
            eprintln!("Artifacts written to: {}", dir.display());
        }
        None => {
            let source_name = input.file_name().and_then(|n| n.to_str());
            let manifest = config.store().save_report(&report, &writer, source_name)?;
            eprintln!("Job stored: {}", manifest.job_id);
            eprintln!(
                "   {}",
                config.store().root().join(&manifest.job_id).display()
            );
        }
    }

    Ok(())
}

fn print_report(report: &LedgerReport) {
    let periods: Vec<String> = report.periods().iter().map(|p| p.to_string()).collect();

    eprintln!("Chart: {}", report.chart_name);
    eprintln!("Periods ({}): {}", report.granularity, periods.join(", "));
    eprintln!(
        "Entries: {} kept, {} rejected, {} blank",
        report.entries.len(),
        report.rejected.len(),
        report.blank_rows
    );
    if !report.unclassified_accounts.is_empty() {
        let codes: Vec<&str> = report.unclassified_accounts.iter().map(String::as_str).collect();
        eprintln!("Unclassified accounts: {}", codes.join(", "));
    }

    let net_income = report.statements.net_income();
    for (check, income) in report.statements.balance_checks.iter().zip(&net_income) {
        eprintln!(
            "   {}: assets {:.2}, liabilities and equity {:.2}, net income {:.2}{}",
            check.period,
            check.assets,
            check.liabilities_and_equity,
            income,
            if check.balanced { "" } else { " (out of balance)" }
        );
    }
}

fn cmd_clean(
    config: &AppConfig,
    input: &Path,
    granularity: Option<Granularity>,
    output: Option<&Path>,
) -> CliResult {
    let cleaned = clean_file(input, &options(config, granularity))?;
    eprintln!(
        "Cleaned {} entries ({} rejected, {} blank)",
        cleaned.entries.len(),
        cleaned.rejected.len(),
        cleaned.blank_rows
    );
    for row in cleaned.rejected.iter().take(10) {
        eprintln!("   line {}: {}", row.line, row.reason);
    }

    let json = serde_json::to_string_pretty(&cleaned)?;
    write_output(&json, output)
}

fn cmd_ratios(
    config: &AppConfig,
    input: &Path,
    chart: Option<&Path>,
    granularity: Option<Granularity>,
) -> CliResult {
    let chart = load_chart(config, chart)?;
    let report = run_file(input, &chart, &options(config, granularity))?;

    let table = shape(&report, Artifact::Ratios);
    config.writer().write(&table, &mut std::io::stdout().lock())?;
    Ok(())
}

fn cmd_chart(config: &AppConfig, action: ChartAction) -> CliResult {
    match action {
        ChartAction::Export { output } => {
            let json = serde_json::to_string_pretty(&ChartOfAccounts::swiss_sme().to_file())?;
            write_output(&json, output.as_deref())?;
        }

        ChartAction::Check { file } => {
            let chart = ChartOfAccounts::load(&file)?;
            println!("{}", chart.name());
            println!("   Accounts: {}", chart.account_count());
            println!("   Prefix rules: {}", chart.prefix_count());
        }

        ChartAction::Classify { codes, chart } => {
            let chart = load_chart(config, chart.as_deref())?;
            for code in codes {
                match chart.classify(&code) {
                    Some(class) => println!(
                        "{}\t{}\t{}\t{}",
                        code,
                        class.category,
                        class.subcategory,
                        chart.account_name(&code).unwrap_or("")
                    ),
                    None => println!("{}\tunclassified", code),
                }
            }
        }
    }

    Ok(())
}

fn cmd_jobs(config: &AppConfig, action: JobsAction) -> CliResult {
    let store: ArtifactStore = config.store();

    match action {
        JobsAction::List => {
            let jobs = store.list()?;
            if jobs.is_empty() {
                eprintln!("No stored jobs in {}", store.root().display());
                return Ok(());
            }

            for job in jobs {
                println!("{} ({})", job.job_id, job.created_at);
                println!("   Source: {}", job.source_name.as_deref().unwrap_or("upload"));
                println!("   Periods: {}", job.periods.join(", "));
                println!(
                    "   Entries: {}, rejected: {}, balanced: {}",
                    job.entry_count, job.rejected_count, job.balanced
                );
            }
        }

        JobsAction::Delete { id } => {
            store.delete(&id)?;
            eprintln!("Job deleted: {}", id);
        }
    }

    Ok(())
}

async fn cmd_serve(mut config: AppConfig, port: Option<u16>) -> CliResult {
    if let Some(port) = port {
        config.server.port = port;
    }
    ledgerflow::server::start_server(config).await
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
