//! bridge - feeds a host console's input queue from a POSIX terminal
//!
//! bridge runs a console program and makes it readable from a POSIX
//! terminal: the child's output is relayed to the terminal, while
//! keystrokes are decoded and injected into the console's shared input
//! queue as native key events. When the child switches its console to
//! line-buffered input, keystrokes are collected by a local line editor
//! (with history) and whole lines are injected at once.
//!
//! # Quick Start
//!
//! ```text
//! bridge cmd /c dir          # Run a console program
//! bridge --codeset SJIS cmd  # Force the codepage negotiation
//! ```
//!
//! The bridge is transparent to job control: signals sent to it are
//! forwarded to the child, and its exit status mirrors the child's, down
//! to dying by the same signal.

mod charset;
mod config;
mod console;
mod core;
mod editor;
#[cfg(unix)]
mod sys;

use std::env;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
struct CliArgs {
    /// Codeset override for codepage negotiation
    codeset: Option<String>,
    /// Program to run
    command: String,
    /// Its arguments, verbatim
    args: Vec<String>,
}

fn print_version() {
    eprintln!("bridge {}", VERSION);
}

fn print_help() {
    eprintln!("bridge {} - feeds a console input queue from a POSIX terminal", VERSION);
    eprintln!();
    eprintln!("Usage: bridge [OPTIONS] COMMAND [ARGS]...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --codeset NAME   Override the locale codeset for codepage negotiation");
    eprintln!("  -h, --help       Show this help");
    eprintln!("  -V, --version    Show version");
    eprintln!();
    eprintln!("Everything after COMMAND is passed to it untouched.");
}

fn parse_args() -> Result<CliArgs, String> {
    let argv: Vec<String> = env::args().skip(1).collect();
    let mut codeset = None;
    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--codeset" => {
                i += 1;
                let value = argv.get(i).ok_or("--codeset requires a value")?;
                codeset = Some(value.clone());
            }
            "--" => {
                i += 1;
                break;
            }
            s if s.starts_with('-') => {
                return Err(format!("Unknown option: {}", s));
            }
            _ => break,
        }
        i += 1;
    }

    let mut rest = argv[i..].iter();
    let command = rest.next().ok_or("No command given")?.clone();
    let args = rest.cloned().collect();
    Ok(CliArgs {
        codeset,
        command,
        args,
    })
}

fn init_logging() {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(std::path::PathBuf::from);

    let log_path = home
        .map(|h| h.join(".conbridge").join("bridge.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("bridge.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Append mode; stdout and stderr belong to the relayed child output.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    init_logging();
    info!("bridge {} starting", VERSION);

    let mut config = Config::load();
    if cli.codeset.is_some() {
        config.codeset = cli.codeset;
    }

    #[cfg(unix)]
    {
        let outcome = sys::Supervisor::start(&config, &cli.command, &cli.args)
            .map_err(anyhow::Error::new)
            .and_then(|supervisor| supervisor.run().map_err(anyhow::Error::new));
        return match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("fatal: {:#}", e);
                Err(e)
            }
        };
    }

    #[cfg(not(unix))]
    {
        let _ = config;
        anyhow::bail!("a POSIX terminal side is required; this build has none");
    }
}
