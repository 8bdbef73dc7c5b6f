//! kioskctl: command-line tooling for the kiosk runtime.
//!
//! ## Subcommands
//!
//! - `hash-password`: Print the digest to store as `lockoutPasswordHash`
//! - `check-config`: Strictly validate a kiosk document and summarize it
//! - `status`: Show the daemon's session snapshot
//! - `send`: Forward a raw host event (JSON) to the daemon
//! - `unlock`: Submit the lockout password
//! - `poll`: Drain and print queued host commands

mod check_config;
mod daemon_client;
mod logging;

use clap::{Parser, Subcommand};
use kiosk_protocol::{parse_host_event, HostCommand, HostEvent};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kioskctl")]
#[command(about = "Kiosk runtime control and configuration tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 hex digest of a lockout password
    HashPassword {
        #[arg(value_name = "PASSWORD")]
        password: String,
    },

    /// Validate a kiosk configuration file and print its site partition
    CheckConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Print the daemon's session snapshot as JSON
    Status,

    /// Send a host event, e.g. '{"type":"next_site"}'
    Send {
        #[arg(value_name = "JSON")]
        event: String,
    },

    /// Submit the lockout password to unlock the kiosk
    Unlock {
        #[arg(value_name = "PASSWORD")]
        password: String,
    },

    /// Drain queued host commands
    Poll,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::HashPassword { password } => {
            println!("{}", kiosk_core::hash_password(&password));
            Ok(())
        }
        Commands::CheckConfig { path } => check_config::run(&path).map(|summary| {
            print!("{}", summary);
        }),
        Commands::Status => status(),
        Commands::Send { event } => send(&event),
        Commands::Unlock { password } => unlock(password),
        Commands::Poll => {
            daemon_client::poll_commands().and_then(|commands| print_commands(&commands))
        }
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "kioskctl failed");
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn status() -> Result<(), String> {
    let health = daemon_client::health()?;
    let snapshot = daemon_client::snapshot()?;
    let output = serde_json::json!({ "health": health, "session": snapshot });
    print_json(&output)
}

fn send(raw: &str) -> Result<(), String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|err| format!("Event is not valid JSON: {}", err))?;
    let event = parse_host_event(value).map_err(|err| format!("{}: {}", err.code, err.message))?;
    tracing::info!(event = event.name(), "Forwarding host event");
    let commands = daemon_client::send_event(&event)?;
    print_commands(&commands)
}

fn unlock(password: String) -> Result<(), String> {
    let commands = daemon_client::send_event(&HostEvent::PasswordSubmitted { password })?;
    if commands.contains(&HostCommand::PasswordRejected) {
        tracing::warn!("Unlock rejected by daemon");
        return Err("Incorrect password".to_string());
    }
    if commands.is_empty() {
        println!("Kiosk is not locked");
    } else {
        println!("Unlocked");
    }
    Ok(())
}

fn print_commands(commands: &[HostCommand]) -> Result<(), String> {
    print_json(&commands)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to format output: {}", err))?;
    println!("{}", text);
    Ok(())
}
