mod preview;
mod run;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "circrep-cli")]
#[command(about = "Hourly circuit usage reports from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate reports for every circuit in a spreadsheet and save the archive
    Run {
        /// Circuit spreadsheet (.xlsx, .xls, .ods or .csv)
        #[arg(long, short)]
        input: PathBuf,

        /// Directory the finished archive is copied into
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
    },
    /// Fetch one circuit and print its reporting period and grand total
    Preview {
        /// Telemetry node id
        #[arg(long)]
        node: String,

        /// Telemetry interface id
        #[arg(long)]
        interface: String,

        /// Date used for the previous-month fallback (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("circrep-cli: nothing to do; see --help");
        return Ok(());
    };

    let config = circrep_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Run { input, output } => run::run_report_job(&config, &input, &output).await,
        Commands::Preview {
            node,
            interface,
            today,
        } => preview::run_preview(&config, &node, &interface, today).await,
    }
}
