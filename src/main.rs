//! Hotspot Monitor - CLI entry point
//!
//! Runs the hotspot watchdog in the foreground or performs one-shot queries
//! (status, client count, client listing) against the host.

use clap::{Parser, Subcommand};
use hotspot_monitor::config::{default, xdg, Config, ConfigLoader};
use hotspot_monitor::daemon::{self, logging};
use hotspot_monitor::status_line;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Keeps the host network sharing feature alive
#[derive(Parser)]
#[command(name = "hotspot-monitor")]
#[command(version, about = "Keeps the host hotspot alive and reports attached clients")]
struct Cli {
    /// Configuration file (defaults to the XDG config path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the hotspot-monitor CLI
#[derive(Subcommand)]
enum Commands {
    /// Run the monitor in the foreground until Ctrl+C or SIGTERM
    Run,

    /// Check whether the hotspot is up
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the number of attached clients (-1 when unknown)
    Count,

    /// List attached clients as tab-separated Device, IP, MAC rows
    Clients {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Actions for the `config` subcommand.
#[derive(Subcommand)]
enum ConfigAction {
    /// Create default configuration file
    Init {
        /// Overwrite existing configuration (creates backup)
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
    /// Validate configuration file
    Validate,
}

/// Loads configuration, initialises logging and runs `f`.
fn with_config<F>(path: Option<&Path>, f: F) -> ExitCode
where
    F: FnOnce(&Config) -> ExitCode,
{
    let config = match ConfigLoader::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&config.daemon) {
        eprintln!("Error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }
    f(&config)
}

fn run_config_command(action: ConfigAction, path: Option<&Path>) -> ExitCode {
    let result = match action {
        ConfigAction::Init { force } => match path {
            Some(path) => default::create_default_config_at(path, force),
            None => default::create_default_config(force),
        }
        .map(|path| {
            println!("Created configuration at {}", path.display());
        }),
        ConfigAction::Path => {
            let path = path.map(Path::to_path_buf).unwrap_or_else(xdg::config_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Validate => ConfigLoader::load(path).and_then(|config| {
            config.monitor_settings()?;
            println!("Configuration is valid");
            println!("{config:#?}");
            Ok(())
        }),
    };
    if let Err(e) = result {
        eprintln!("Config error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_status_command(config: &Config, json: bool) -> ExitCode {
    let result = daemon::with_worker(config, |worker| async move {
        let healthy = worker.check_status().await;
        let count = worker.connected_client_count().await;
        (healthy, count)
    });
    match result {
        Ok((healthy, count)) => {
            if json {
                let value = serde_json::json!({ "healthy": healthy, "clients": count });
                println!("{value}");
            } else {
                println!("{}", status_line(healthy, Some(count)));
            }
            if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_count_command(config: &Config) -> ExitCode {
    match daemon::with_worker(config, |worker| async move {
        worker.connected_client_count().await
    }) {
        Ok(count) => {
            println!("{count}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_clients_command(config: &Config, json: bool) -> ExitCode {
    let result = daemon::with_worker(config, |worker| async move {
        worker.fetch_connected_clients().await
    });
    let clients = match result {
        Ok(Ok(clients)) => clients,
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&clients) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: failed to serialize clients: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for client in &clients {
            println!("{}", client.to_row());
        }
    }
    ExitCode::SUCCESS
}

fn run_monitor_command(config: &Config) -> ExitCode {
    if let Err(e) = daemon::run_monitor(config) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { action } => run_config_command(action, config_path),
        Commands::Run => with_config(config_path, run_monitor_command),
        Commands::Status { json } => {
            with_config(config_path, |config| run_status_command(config, json))
        }
        Commands::Count => with_config(config_path, run_count_command),
        Commands::Clients { json } => {
            with_config(config_path, |config| run_clients_command(config, json))
        }
    }
}
