#![deny(unsafe_code)]

//! wpactl: query and drive wpa_supplicant over its control socket.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wpactl_config::AppConfig;
use wpactl_core::{ConfiguredNetwork, Connection, ParseError, ScanResult, StatusResult, WpaEvent};

/// wpactl: a client for the wpa_supplicant control interface.
#[derive(Parser)]
#[command(name = "wpactl", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "wpactl.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Network interface whose control socket to use.
    #[arg(short, long, default_value = "wlan0")]
    interface: String,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    #[command(flatten)]
    Control(ControlCommand),

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Subcommands that talk to the daemon.
#[derive(Subcommand, Debug, PartialEq)]
enum ControlCommand {
    /// Check that the daemon answers.
    Ping,

    /// Show the current association state.
    Status,

    /// Request a scan.
    Scan {
        /// Wait for the scan to finish and print the results.
        #[arg(long)]
        wait: bool,
    },

    /// Print the latest scan results.
    ScanResults,

    /// List configured networks.
    Networks,

    /// Read one variable of a configured network.
    Get {
        /// Network id.
        id: u32,
        /// Variable name (e.g. ssid, key_mgmt).
        variable: String,
    },

    /// Print events as they arrive.
    Events {
        /// Stop after this many events.
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Send a raw control command and print the reply.
    Raw {
        /// Command words, joined with spaces.
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
}

impl ControlCommand {
    /// Whether the command listens for events (and so needs `ATTACH`).
    fn wants_events(&self) -> bool {
        matches!(self, Self::Events { .. } | Self::Scan { wait: true })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config).await?;
    init_tracing(cli.verbose, loaded.as_ref().map(|c| c.logging.level.as_str()));
    let mut config = loaded.unwrap_or_else(|| {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
        AppConfig::default()
    });

    let command = match cli.command {
        Commands::Config { show } => return cmd_config(&cli.config, &config, show),
        Commands::Control(command) => command,
    };

    config.control.attach_events = command.wants_events();
    let mut conn = Connection::connect(&cli.interface, &config.control)
        .await
        .with_context(|| format!("failed to connect to {}", cli.interface))?;

    let mut stdout = io::stdout().lock();
    let result = run(&mut conn, &command, cli.json, &mut stdout).await;
    if let Err(err) = conn.close().await {
        warn!(error = %err, "failed to close control connection cleanly");
    }
    result
}

/// `RUST_LOG` wins, then `-v`, then `logging.level` from the config file.
fn init_tracing(verbose: u8, configured: Option<&str>) {
    let fallback = match verbose {
        0 => configured.unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

async fn run(conn: &mut Connection, command: &ControlCommand, json: bool, out: &mut impl Write) -> Result<()> {
    match command {
        ControlCommand::Ping => {
            conn.ping().await?;
            if json {
                writeln!(out, "{}", json!({ "interface": conn.interface(), "reply": "PONG" }))?;
            } else {
                writeln!(out, "PONG")?;
            }
        }
        ControlCommand::Status => {
            let status = conn.status().await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
            } else {
                write!(out, "{}", format_status(&status))?;
            }
        }
        ControlCommand::Scan { wait: false } => {
            conn.scan().await?;
            writeln!(out, "OK")?;
        }
        ControlCommand::Scan { wait: true } => {
            let mut events = conn
                .take_events()
                .context("event stream already taken")?;
            conn.scan().await?;
            info!("Scan requested, waiting for results");
            loop {
                match events.recv().await {
                    Some(event) if event.name == "SCAN-RESULTS" => break,
                    Some(event) if event.name == "SCAN-FAILED" => {
                        anyhow::bail!("scan failed: {}", event.line)
                    }
                    Some(_) => {}
                    None => anyhow::bail!("connection closed while waiting for scan results"),
                }
            }
            print_scan_results(conn, json, out).await?;
        }
        ControlCommand::ScanResults => print_scan_results(conn, json, out).await?,
        ControlCommand::Networks => {
            let (networks, errors) = conn.list_networks().await?;
            report_row_errors(&errors);
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&networks)?)?;
            } else {
                write!(out, "{}", format_networks(&networks))?;
            }
        }
        ControlCommand::Get { id, variable } => {
            let value = conn.get_network(*id, variable).await?;
            let value = String::from_utf8_lossy(&value);
            if json {
                writeln!(out, "{}", json!({ "id": id, "variable": variable, "value": value }))?;
            } else {
                writeln!(out, "{value}")?;
            }
        }
        ControlCommand::Events { count } => {
            let mut events = conn
                .take_events()
                .context("event stream already taken")?;
            let mut seen = 0;
            while count.is_none_or(|limit| seen < limit) {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = tokio::signal::ctrl_c() => break,
                };
                let Some(event) = event else { break };
                if json {
                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                } else {
                    writeln!(out, "{}", format_event(&event))?;
                }
                out.flush()?;
                seen += 1;
            }
        }
        ControlCommand::Raw { command } => {
            let reply = conn.execute(&command.join(" ")).await?;
            let text = String::from_utf8_lossy(&reply);
            if json {
                writeln!(out, "{}", json!({ "reply": text }))?;
            } else {
                write!(out, "{text}")?;
                if !text.ends_with('\n') {
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

async fn print_scan_results(conn: &Connection, json: bool, out: &mut impl Write) -> Result<()> {
    let (results, errors) = conn.scan_results().await?;
    report_row_errors(&errors);
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
    } else {
        write!(out, "{}", format_scan_results(&results))?;
    }
    Ok(())
}

fn report_row_errors(errors: &[ParseError]) {
    for err in errors {
        warn!(error = %err, "skipped malformed row");
    }
}

fn format_scan_results(results: &[ScanResult]) -> String {
    let mut table = format!("{:<17}  {:>5}  {:>6}  {:<32}  flags\n", "bssid", "freq", "signal", "ssid");
    for r in results {
        let bssid = r.bssid.map(|b| b.to_string()).unwrap_or_default();
        table.push_str(&format!(
            "{:<17}  {:>5}  {:>6}  {:<32}  {}\n",
            bssid,
            r.frequency,
            r.signal_level,
            r.ssid,
            r.flags.join(",")
        ));
    }
    table
}

fn format_networks(networks: &[ConfiguredNetwork]) -> String {
    let mut table = format!("{:>3}  {:<32}  {:<17}  flags\n", "id", "ssid", "bssid");
    for n in networks {
        let bssid = n.bssid.map(|b| b.to_string()).unwrap_or_else(|| "any".to_string());
        let marker = if n.is_current() { " *" } else { "" };
        table.push_str(&format!(
            "{:>3}  {:<32}  {:<17}  {}{}\n",
            n.id,
            n.ssid,
            bssid,
            n.flags.join(","),
            marker
        ));
    }
    table
}

fn format_status(status: &StatusResult) -> String {
    let mut lines = String::new();
    let mut field = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            lines.push_str(&format!("{name:<11} {value}\n"));
        }
    };
    field("state", status.wpa_state.clone());
    field("ssid", status.ssid.as_ref().map(|s| s.to_string()));
    field("bssid", status.bssid.map(|b| b.to_string()));
    field("frequency", status.frequency.map(|f| f.to_string()));
    field("key_mgmt", status.key_mgmt.clone());
    field("ip_address", status.ip_address.clone());
    field("address", status.address.map(|a| a.to_string()));
    field("id_str", status.id_str.clone());
    lines
}

fn format_event(event: &WpaEvent) -> String {
    format!("<{}> {:<20} {}", event.priority, event.name, event.line)
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load the config file, or `None` if it does not exist.
async fn load_config(path: &Path) -> Result<Option<AppConfig>> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration at '{}'", path.display()))?;
        Ok(Some(config))
    } else {
        Ok(None)
    }
}
