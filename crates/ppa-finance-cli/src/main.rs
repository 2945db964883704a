mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::analysis::{DebtArgs, ExitArgs};
use commands::model::{ProjectArgs, SolveArgs};
use commands::reference::{CapexArgs, FxTableArgs, PolicyArgs};

/// Solar PPA tenor search with decimal precision
#[derive(Parser)]
#[command(
    name = "ppa",
    version,
    about = "Solar PPA tenor search, debt sizing and exit analysis",
    long_about = "Finds the shortest power purchase agreement tenor at which a solar \
                  project reaches a target unlevered IRR, with the full annual ledger, \
                  offtaker savings comparison, sculpted debt schedule and exit scenarios."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace); logs go to stderr
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the shortest PPA tenor meeting the target IRR
    Solve(SolveArgs),
    /// Project the unlevered ledger for a fixed tenor
    Project(ProjectArgs),
    /// Build a DSCR-sculpted debt schedule from unlevered cash flows
    Debt(DebtArgs),
    /// Exit values and IRRs for a cash flow series
    Exit(ExitArgs),
    /// Compounded FX curves for years 1-25
    FxTable(FxTableArgs),
    /// Piecewise project management CAPEX for a plant size
    Capex(CapexArgs),
    /// Show the normalised policy table
    Policy(PolicyArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Solve(args) => commands::model::run_solve(args),
        Commands::Project(args) => commands::model::run_project(args),
        Commands::Debt(args) => commands::analysis::run_debt(args),
        Commands::Exit(args) => commands::analysis::run_exit(args),
        Commands::FxTable(args) => commands::reference::run_fx_table(args),
        Commands::Capex(args) => commands::reference::run_capex(args),
        Commands::Policy(args) => commands::reference::run_policy(args),
        Commands::Version => {
            println!("ppa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
