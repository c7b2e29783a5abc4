//! Netgraph CLI - drive network scans and explore the device topology
//!
//! This binary wires the core library's scan controller to a real HTTP
//! backend and renders the resulting topology as text:
//! - Start a scan and watch it progress (Ctrl-C cancels it cleanly)
//! - Validate a target without touching the backend
//! - Show configuration paths and settings

mod render;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use netgraph_core::backend::{self, HttpBackend, ScanRequest, ScanType};
use netgraph_core::session::{Phase, PollOptions, ScanController};
use netgraph_core::topology::build_topology;
use netgraph_core::validate::validate_target;
use netgraph_core::view::GraphView;
use render::TextRenderer;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser)]
#[command(name = "netgraph")]
#[command(version)]
#[command(about = "Scan a private network and explore the device topology")]
#[command(long_about = "
Netgraph drives long-running network scans on a scan backend and renders
the discovered devices as a severity-tiered topology graph.

Quick start:
  1. Check the target:  netgraph validate 192.168.1.0/24
  2. Run a scan:        netgraph scan 192.168.1.0/24 --consent
  3. Configuration:     netgraph config

Only private (RFC 1918), loopback, and link-local ranges can be scanned.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScanTypeArg {
    /// Fast scan of common ports
    Quick,
    /// Full port range, slower
    Deep,
    /// Host discovery only
    Discovery,
    /// User-supplied port range (requires --ports)
    Custom,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Quick => ScanType::Quick,
            ScanTypeArg::Deep => ScanType::Deep,
            ScanTypeArg::Discovery => ScanType::Discovery,
            ScanTypeArg::Custom => ScanType::Custom,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a network scan and render the topology
    Scan {
        /// IP address or CIDR range, e.g. 192.168.1.0/24
        target: String,

        /// Type of scan to perform
        #[arg(short = 't', long, default_value = "quick")]
        scan_type: ScanTypeArg,

        /// Custom port range for --scan-type custom, e.g. "22,80,443"
        #[arg(short, long)]
        ports: Option<String>,

        /// Gateway IP for the topology's star center
        #[arg(short, long)]
        gateway: Option<String>,

        /// Seconds between status polls
        #[arg(long, default_value = "2")]
        interval: u64,

        /// Confirm you own or may scan this network
        #[arg(long)]
        consent: bool,
    },

    /// Validate a scan target without contacting the backend
    Validate {
        /// IP address or CIDR range to check
        target: String,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("netgraph={},netgraph_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Scan {
            target,
            scan_type,
            ports,
            gateway,
            interval,
            consent,
        } => {
            cmd_scan(
                &cli,
                target.clone(),
                *scan_type,
                ports.clone(),
                gateway.clone(),
                *interval,
                *consent,
            )
            .await
        }
        Commands::Validate { target } => cmd_validate(&cli, target),
        Commands::Config => cmd_config(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_scan(
    cli: &Cli,
    target: String,
    scan_type: ScanTypeArg,
    ports: Option<String>,
    gateway: Option<String>,
    interval: u64,
    consent: bool,
) -> Result<()> {
    let config = backend::load_backend_config();
    tracing::debug!("Using scan backend at {}", config.api_url);
    let backend = Arc::new(HttpBackend::new(config.api_url.as_str())?);
    let controller = ScanController::new(
        backend,
        PollOptions {
            interval: Duration::from_secs(interval.max(1)),
            ..PollOptions::default()
        },
    );

    let mut request = ScanRequest::new(target, scan_type.into());
    request.port_range = ports;
    request.user_consent = consent;

    let session = match controller.start(request).await {
        Ok(session) => session,
        Err(e) => anyhow::bail!(e.user_message()),
    };

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Scan {} started on {} ({})",
                session.session_id, session.target, session.scan_type
            );
            println!("Press Ctrl-C to cancel.");
        }
        OutputFormat::Json => {}
    }

    // Watch progress until the controller reaches a terminal phase
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    loop {
        let phase = controller.phase();
        if phase.is_terminal() {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("\nCancelling scan...");
                controller.cancel();
            }
            _ = sleep(Duration::from_millis(250)) => {
                if matches!(cli.format, OutputFormat::Text) {
                    if let Some(s) = controller.session() {
                        print!(
                            "\rScanning... {:>3.0}% ({} devices found)",
                            s.progress, s.device_count
                        );
                        std::io::stdout().flush().ok();
                    }
                }
            }
        }
    }

    if matches!(cli.format, OutputFormat::Text) {
        println!();
    }

    let session = controller
        .session()
        .ok_or_else(|| anyhow::anyhow!("no session after scan"))?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        OutputFormat::Text => match controller.phase() {
            Phase::Completed => {
                println!(
                    "Scan completed: {} devices on {}",
                    session.devices.len(),
                    session.target
                );
                println!();
                print_device_table(&session.devices);
                println!();

                let model = build_topology(&session.devices, gateway.as_deref());
                let mut view = GraphView::new(TextRenderer::stdout());
                view.set_model(model);
                view.render()?;
            }
            Phase::Cancelled => {
                println!("Scan cancelled.");
            }
            Phase::Failed => {
                let message = session
                    .error_message
                    .as_deref()
                    .unwrap_or("unknown error");
                anyhow::bail!("Scan failed: {}", message);
            }
            _ => {}
        },
    }

    Ok(())
}

fn print_device_table(devices: &[netgraph_core::backend::Device]) {
    println!(
        "{:<16} {:<18} {:<24} {:<12} {:>6}",
        "IP", "MAC", "HOSTNAME", "TYPE", "VULNS"
    );
    println!("{}", "-".repeat(80));
    for device in devices {
        println!(
            "{:<16} {:<18} {:<24} {:<12} {:>6}",
            device.ip,
            device.mac.as_deref().unwrap_or("-"),
            device.hostname.as_deref().unwrap_or("-"),
            device.device_type.as_deref().unwrap_or("-"),
            device.vulnerability_count,
        );
    }
}

fn cmd_validate(cli: &Cli, target: &str) -> Result<()> {
    match validate_target(target) {
        Ok(validated) => {
            match cli.format {
                OutputFormat::Text => {
                    println!(
                        "{} is valid ({} address{})",
                        validated.target,
                        validated.num_hosts,
                        if validated.num_hosts == 1 { "" } else { "es" }
                    );
                }
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "valid": true,
                            "target": validated.target,
                            "num_hosts": validated.num_hosts,
                        })
                    );
                }
            }
            Ok(())
        }
        Err(e) => match cli.format {
            OutputFormat::Text => anyhow::bail!(e.user_message()),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "target": target,
                        "error": e.to_string(),
                    })
                );
                std::process::exit(1);
            }
        },
    }
}

fn cmd_config() -> Result<()> {
    let config = backend::load_backend_config();

    println!("Netgraph Configuration");
    println!("======================");
    println!();
    println!("Backend API URL: {} (from {})", config.api_url, config.source);
    println!("Config file:     {}", backend::get_config_file_path_string());
    println!();
    println!("Example config file:");
    println!("{}", backend::generate_example_config());

    Ok(())
}
