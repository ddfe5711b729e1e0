use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use ri_coverage::config::Config;
use ri_coverage::display::ReportDisplay;
use ri_coverage::logging::init_logging;
use ri_coverage::{AnalysisRequest, CoverageAnalyzer, CoverageError};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ri-coverage")]
#[command(about = "Get AWS EC2 RI coverage for one hour of a detailed billing report")]
#[command(version)]
struct Cli {
    /// Path of the DBR file (zipped CSV; gzip and plain CSV also accepted)
    #[arg(short = 'd', long = "dbr", value_name = "PATH")]
    dbr_file: PathBuf,

    /// Path of the RI subscription JSON file
    #[arg(short = 's', long = "subscriptions", value_name = "PATH")]
    ri_sub_file: PathBuf,

    /// Hour to calculate, e.g. 2018-10-02/11 means 2018-10-02 11:00
    #[arg(short = 't', long = "hour", value_name = "YYYY-MM-DD/HH")]
    date_hour: String,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };
    let _log_guard = init_logging(&config);
    if let Some(path) = &config.source {
        info!(config_file = %path.display(), "Loaded configuration from file");
    }

    let request = match AnalysisRequest::new(&cli.dbr_file, &cli.ri_sub_file, &cli.date_hour) {
        Ok(request) => request,
        Err(e) => handle_error(e, cli.json),
    };

    let analyzer = CoverageAnalyzer::new(&config);
    match analyzer.analyze(&request) {
        Ok(outcome) => {
            ReportDisplay::new(&config.output).display(&outcome, cli.json);
            Ok(())
        }
        Err(e) => handle_error(e, cli.json),
    }
}

fn handle_error(e: CoverageError, json: bool) -> ! {
    error!(error = %e, "Coverage analysis failed");

    if json {
        println!("{}", serde_json::json!({ "error": e.to_string() }));
    } else if let Some(failure) = ReportDisplay::range_failure_for(&e) {
        println!("{}", failure.bright_red());
    } else {
        eprintln!("❌ Error: {}", e);
    }
    process::exit(e.exit_code());
}
