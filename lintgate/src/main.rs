//! lintgate - post-edit hook CLI.
//!
//! Runs the project's lint or test command after an agent edits a file,
//! without ever overlapping two runs of the same check on one project.
//! Requests go to `lintgated` when it is running and are handled
//! in-process otherwise, with identical results.

#![forbid(unsafe_code)]

mod hook;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lintgate_common::logging::{self, LogOptions};
use lintgate_common::{
    CheckType, Client, EXIT_INTERNAL, HookConfig, Paths, ProcessRunner, Request, SkipType, method,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "lintgate")]
#[command(author, version, about = "lintgate - coordinated lint/test runs for agent edit hooks")]
struct Cli {
    /// Path to the daemon socket
    #[arg(long, global = true, env = "LINTGATE_SOCKET")]
    socket: Option<PathBuf>,

    /// Handle the request in-process without contacting the daemon
    #[arg(long, global = true)]
    no_daemon: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the project's lint command
    Lint(CheckArgs),

    /// Run the project's test command
    Test(CheckArgs),

    /// Manage per-directory opt-outs
    Skip {
        #[command(subcommand)]
        action: SkipAction,
    },

    /// Show request counters of whichever side answered
    Stats,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Directory to start project discovery from
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SkipAction {
    /// Stop running the given checks for a directory
    Add {
        #[arg(required = true)]
        types: Vec<SkipType>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Resume running the given checks for a directory
    Remove {
        #[arg(required = true)]
        types: Vec<SkipType>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List every skipped directory
    List,
    /// Remove all skips for a directory
    Clear {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(&LogOptions {
        default_level: "warn",
        verbose: cli.verbose,
        log_dir: None,
        file_prefix: "lintgate.log",
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("lintgate: failed to initialize logging: {e:#}");
            None
        }
    };

    let code = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    match code {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("lintgate: {e:#}");
            ExitCode::from(EXIT_INTERNAL as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let paths = Paths::resolve();
    let mut config = HookConfig::load(&paths).context("Failed to load configuration")?;
    if let Some(socket) = cli.socket {
        config.general.socket_path = Some(socket);
    }
    if cli.no_daemon {
        config.general.no_daemon = true;
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let (request, list_output) = match cli.command {
        Commands::Lint(args) => (check(CheckType::Lint, args, &cwd, &config)?, false),
        Commands::Test(args) => (check(CheckType::Test, args, &cwd, &config)?, false),
        Commands::Skip { action } => match action {
            SkipAction::Add { types, dir } => (
                hook::skip_request(method::SKIP_ADD, target_dir(dir, &cwd), types)?,
                false,
            ),
            SkipAction::Remove { types, dir } => (
                hook::skip_request(method::SKIP_REMOVE, target_dir(dir, &cwd), types)?,
                false,
            ),
            SkipAction::List => (Request::bare(method::SKIP_LIST), true),
            SkipAction::Clear { dir } => (
                hook::skip_request(method::SKIP_CLEAR, target_dir(dir, &cwd), Vec::new())?,
                false,
            ),
        },
        Commands::Stats => (Request::bare(method::STATS), false),
    };

    let client = Client::from_config(config, &paths, ProcessRunner);
    let outcome = client.call(&request).await;
    debug!(method = %request.method, path = ?outcome.path, exit_code = outcome.exit_code, "Request handled");

    if !outcome.result.is_empty() {
        if list_output {
            println!("{}", hook::format_skip_list(&outcome.result)?);
        } else {
            println!("{}", outcome.result);
        }
    }
    if let Some(error) = &outcome.error {
        eprintln!("lintgate: {error}");
    }
    Ok(outcome.exit_code)
}

fn check(check: CheckType, args: CheckArgs, cwd: &Path, config: &HookConfig) -> Result<Request> {
    let payload = match args.dir {
        Some(_) => None,
        None => hook::read_stdin_payload(),
    };
    let dir = hook::start_dir(args.dir.as_deref(), payload.as_deref(), cwd);
    debug!(check = %check, dir = %dir.display(), "Starting discovery");
    hook::check_request(check, dir, hook::caller_env(), config)
}

fn target_dir(dir: Option<PathBuf>, cwd: &Path) -> PathBuf {
    hook::start_dir(dir.as_deref(), None, cwd)
}
