//! Consilium CLI - verify, rebuild and mint the credit ledger.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;

use commands::{balance, mint, rebuild, show, verify};

#[derive(Parser)]
#[command(name = "consilium", version)]
#[command(about = "Hash-chained contribution credit ledger reconciled against GitHub")]
struct Cli {
    /// Ledger directory
    #[arg(long, global = true, env = "CONSILIUM_LEDGER_DIR", default_value = "ledger")]
    ledger_dir: PathBuf,
    /// Configuration file (missing file means defaults)
    #[arg(long, global = true, env = "CONSILIUM_CONFIG", default_value = "consilium.yaml")]
    config: PathBuf,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the local chain and index, optionally against GitHub
    Verify {
        /// Also compare with the comments published on GitHub
        #[arg(long, requires = "repo")]
        github: bool,
        /// Repository as OWNER/REPO
        #[arg(long)]
        repo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the ledger from comments published on GitHub
    ///
    /// Credits are hashed as minimal decimal strings ("14.29"), not as
    /// floats. A comment written by a tool that hashed float credits fails
    /// hash verification, and rebuild stops at it as an invalid record.
    ///
    /// An incremental rebuild refuses to overwrite a local entry that
    /// differs from its published comment. Use `--full` to discard local
    /// state and take the published chain instead; every dropped or
    /// replaced local entry is reported as a warning.
    Rebuild {
        /// Repository as OWNER/REPO
        #[arg(long)]
        repo: String,
        /// Replace the local ledger with the published chain
        #[arg(long)]
        full: bool,
    },
    /// Show one balance, or the leaderboard
    Balance {
        /// Actor login; omit for the leaderboard
        actor: Option<String>,
        /// Show at most N rows of the leaderboard
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show an entry by sequence number (1-based)
    Show {
        /// Sequence number
        seq: u64,
        /// Output the entry JSON
        #[arg(long)]
        json: bool,
    },
    /// Record credit for a merged pull request and publish it
    Mint {
        /// Repository as OWNER/REPO
        #[arg(long)]
        repo: String,
        /// Pull-request number
        #[arg(long, required_unless_present = "event_file", conflicts_with = "event_file")]
        pr: Option<u64>,
        /// `pull_request` webhook payload (e.g. $GITHUB_EVENT_PATH)
        #[arg(long)]
        event_file: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Verify { github, repo, json } => {
            let repo = repo.filter(|_| github);
            verify::run(&cli.ledger_dir, &cli.config, repo.as_deref(), json)
        }
        Commands::Rebuild { repo, full } => rebuild::run(&cli.ledger_dir, &cli.config, &repo, full),
        Commands::Balance { actor, limit } => balance::run(&cli.ledger_dir, actor.as_deref(), limit),
        Commands::Show { seq, json } => show::run(&cli.ledger_dir, seq, json),
        Commands::Mint {
            repo,
            pr,
            event_file,
        } => mint::run(&cli.ledger_dir, &cli.config, &repo, pr, event_file.as_deref()),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
