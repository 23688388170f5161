//! sbs — entry point.
//!
//! Argument parsing, help text, and human-readable table rendering live
//! here; they are explicitly out of scope for the core (spec.md §1). Every
//! subcommand is a thin call into `sbs::commands`.

use std::io::Read as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sbs::commands::{cancel, cleanup, hold, release, run as run_cmd, shutdown, status, submit};
use sbs::dispatcher::DispatcherConfig;
use sbs::error::SbsError;
use sbs::job::JobId;
use sbs::store::{self, Store};

#[derive(Debug, Parser)]
#[command(name = "sbs")]
#[command(about = "Single-host batch job scheduler", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Override the store root (default: $SBSHOME, else ./.sbs).
    #[arg(long, global = true)]
    root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a script as a new job.
    Submit {
        /// Path to the script file; reads stdin when omitted.
        script: Option<String>,

        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mem: Option<String>,
        #[arg(long)]
        mail: Option<String>,
        #[arg(long)]
        procs: Option<String>,
        #[arg(long)]
        afterok: Option<String>,
        #[arg(long)]
        stdout: Option<String>,
        #[arg(long)]
        stderr: Option<String>,
        #[arg(long)]
        wd: Option<String>,
        /// Submit directly into USERHOLD instead of HOLD.
        #[arg(long)]
        hold: bool,
    },

    /// Show the job table.
    Status {
        /// Job ids to show; all jobs when omitted.
        ids: Vec<u64>,
    },

    /// Put jobs into USERHOLD.
    Hold { ids: Vec<u64> },

    /// Release jobs from USERHOLD back to HOLD.
    Release { ids: Vec<u64> },

    /// Cancel jobs; kills the child if running.
    Cancel { ids: Vec<u64> },

    /// Remove terminal jobs no longer referenced by a pending dependent.
    Cleanup {
        /// Restrict cleanup to a single job id.
        id: Option<u64>,
    },

    /// Run the dispatcher loop.
    Run {
        /// Maximum concurrent procs (default: host CPU count).
        #[arg(long)]
        max_procs: Option<u32>,
        /// Maximum total memory in MB, or "-1"/"unlimited" (default).
        #[arg(long)]
        max_mem: Option<String>,
        /// Keep running even after the queue is empty.
        #[arg(long)]
        forever: bool,
    },

    /// Signal the dispatcher to exit on its next tick.
    Shutdown {
        /// Also kill every currently running job.
        #[arg(long)]
        kill: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run(cli) {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<SbsError>() {
        Some(SbsError::JobNotFound { id }) => eprintln!("sbs: job {id} not found"),
        Some(SbsError::DependencyMissing { id }) => {
            eprintln!("sbs: afterok dependency {id} does not exist")
        }
        Some(SbsError::ScriptMissing) => eprintln!("sbs: script is empty"),
        Some(SbsError::LockUnavailable { path }) => {
            eprintln!("sbs: could not acquire lock at {path}")
        }
        Some(SbsError::ChildInterrupted) => eprintln!("sbs: child process wait interrupted"),
        None => eprintln!("sbs: {e:#}"),
    }
}

fn parse_ids(raw: &[u64]) -> Vec<JobId> {
    raw.iter().copied().map(JobId).collect()
}

fn parse_max_mem(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if raw == "-1" || raw.eq_ignore_ascii_case("unlimited") {
        return Ok(-1);
    }
    if let Some(digits) = raw.strip_suffix('G').or_else(|| raw.strip_suffix('g')) {
        return digits.trim().parse::<i64>().map(|g| g * 1000).context("parse --max-mem");
    }
    if let Some(digits) = raw.strip_suffix('M').or_else(|| raw.strip_suffix('m')) {
        return digits.trim().parse::<i64>().context("parse --max-mem");
    }
    raw.parse::<i64>().context("parse --max-mem")
}

fn run(cli: Cli) -> Result<()> {
    let root = store::resolve_root(cli.root.as_deref());
    let store = Store::open(&root)?;

    match cli.command {
        Command::Submit {
            script,
            name,
            mem,
            mail,
            procs,
            afterok,
            stdout,
            stderr,
            wd,
            hold,
        } => {
            let body = match script {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read script {path}"))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("read script from stdin")?;
                    buf
                }
            };
            let id = submit::execute(
                &store,
                &body,
                submit::SubmitOpts {
                    name,
                    mem,
                    mail,
                    procs,
                    afterok,
                    stdout,
                    stderr,
                    wd,
                    hold,
                },
            )?;
            println!("{id}");
        }

        Command::Status { ids } => {
            let rows = status::execute(&store, &parse_ids(&ids))?;
            print_status_table(&rows);
        }

        Command::Hold { ids } => hold::execute(&store, &parse_ids(&ids))?,
        Command::Release { ids } => release::execute(&store, &parse_ids(&ids))?,
        Command::Cancel { ids } => cancel::execute(&store, &parse_ids(&ids))?,

        Command::Cleanup { id } => {
            let report = cleanup::execute(&store, id.map(JobId))?;
            for id in &report.removed {
                println!("removed {id}");
            }
            for id in &report.kept {
                println!("kept {id} (still referenced by a pending dependent)");
            }
        }

        Command::Run {
            max_procs,
            max_mem,
            forever,
        } => {
            let mut config = DispatcherConfig::default();
            if let Some(max_procs) = max_procs {
                config.max_procs = max_procs;
            }
            if let Some(raw) = max_mem {
                config.max_mem_mb = parse_max_mem(&raw)?;
            }
            config.forever = forever;
            run_cmd::execute(Arc::new(store), config)?;
        }

        Command::Shutdown { kill } => shutdown::execute(&store, kill)?,
    }
    Ok(())
}

fn print_status_table(rows: &[status::StatusRow]) {
    println!("{:<6} {:<2} {:<20} {:<8} {}", "ID", "ST", "NAME", "RC", "BECAUSE_OF");
    for row in rows {
        println!(
            "{:<6} {:<2} {:<20} {:<8} {}",
            row.id,
            row.status.code(),
            row.name.as_deref().unwrap_or("-"),
            row.return_code.map(|rc| rc.to_string()).unwrap_or_else(|| "-".to_string()),
            row.because_of.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
}
