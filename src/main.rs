use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lumi_api_tester::{parser, report, runner, utils};

#[derive(Parser)]
#[command(name = "lumi-api-tester")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Black-box API test harness for the Test Series service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario suite against the service
    Run {
        /// Suite file or directory (built-in suite if omitted)
        path: Option<PathBuf>,

        /// Base URL of the API, e.g. http://localhost:3000/api
        #[arg(short, long)]
        base_url: Option<String>,

        /// YAML config with actors, credentials and variables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only run these categories (comma-separated or repeated)
        #[arg(long, value_delimiter = ',')]
        category: Vec<String>,

        /// Only run scenarios whose name contains this text
        #[arg(short, long)]
        scenario: Option<String>,

        /// Filter scenarios by tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Reports to write (json, junit); none if empty
        #[arg(long, value_delimiter = ',')]
        report: Vec<String>,
    },

    /// List the scenarios of a suite
    List {
        /// Suite file or directory (built-in suite if omitted)
        path: Option<PathBuf>,

        /// Only list these categories
        #[arg(long, value_delimiter = ',')]
        category: Vec<String>,

        /// Filter scenarios by tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Re-render a saved results.json
    Report {
        /// Path to results JSON
        results: PathBuf,

        /// Output format (json, junit, summary)
        #[arg(short, long, default_value = "summary")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match dispatch(Cli::parse()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` means the command ran but checks failed
async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            path,
            base_url,
            config,
            timeout,
            category,
            scenario,
            tags,
            output,
            report,
        } => {
            let mut config = utils::config::Config::load(config.as_deref())?;
            if let Some(url) = base_url {
                config.base_url = url;
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }

            let suite = parser::load_suite(path.as_deref())?;
            if !tags.is_empty() {
                println!("  Tags: {}", tags.join(", ").yellow());
            }
            if !report.is_empty() {
                println!("  Reports: {} -> {}", report.join(", ").green(), output.display());
            }

            let options = runner::RunOptions {
                filter: runner::ScenarioFilter {
                    categories: category,
                    name: scenario,
                    tags,
                },
                output: Some(output),
                reports: report,
            };
            runner::run_suite(&config, &suite, &options).await
        }

        Commands::List {
            path,
            category,
            tags,
        } => {
            let suite = parser::load_suite(path.as_deref())?;
            let filter = runner::ScenarioFilter {
                categories: category,
                name: None,
                tags,
            };
            runner::list_scenarios(&suite, &filter);
            Ok(true)
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
            Ok(true)
        }
    }
}
