//! Operator-assisted discovery of IO-Link masters.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use iolink_discovery::DiscoveryConfig;
use iolink_discovery::prompt::LinePrompt;
use iolink_discovery::registry::DeviceRegistry;
use iolink_discovery::scanner::{DiscoveryScanner, HostLookup};
use iolink_discovery::summary::format_summary;
use iolink_discovery::workflow::ValidationWorkflow;

#[derive(Parser, Debug)]
#[command(about = "Discover and register IO-Link masters")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format). Defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry file to write.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Subnet (third octet) to scan; repeatable.
    #[arg(short, long = "subnet")]
    subnets: Vec<u8>,

    /// Look up the device ID of one master instead of scanning.
    #[arg(long, value_name = "IP")]
    host: Option<Ipv4Addr>,

    /// Never run the active network scan.
    #[arg(long)]
    no_active_scan: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DiscoveryConfig::load(path)
            .with_context(|| format!("Cannot load {}", path.display()))?,
        None => DiscoveryConfig::default(),
    };
    if let Some(output) = args.output {
        config.output = output;
    }
    if !args.subnets.is_empty() {
        config.subnets = args.subnets;
    }
    if args.no_active_scan {
        config.active_scan = false;
    }

    let logging = config.logging.with_level_override(args.log_level.as_deref());
    iolink_common::init_tracing(&logging)?;

    let registry = DeviceRegistry::new(config.output.clone());
    let scanner = DiscoveryScanner::from_config(config)?;

    if let Some(ip) = args.host {
        return lookup_host(&scanner, ip).await;
    }

    let devices = scanner.discover_all().await;

    let outcome = tokio::task::spawn_blocking(move || {
        ValidationWorkflow::new(LinePrompt::stdio()).run(devices)
    })
    .await??;

    if outcome.aborted {
        tracing::info!(
            validated = outcome.validated.len(),
            "Validation stopped early, saving devices validated so far"
        );
    }

    if registry.save_session(&outcome.validated)? {
        println!("\nResults saved to {}", registry.path().display());
        print!("{}", format_summary(&outcome.validated));
    } else {
        println!(
            "\nNo devices validated, {} left unchanged",
            registry.path().display()
        );
    }

    Ok(())
}

async fn lookup_host(scanner: &DiscoveryScanner, ip: Ipv4Addr) -> Result<()> {
    println!("IO-Link device ID lookup for {}", ip);

    match scanner.lookup_device_id(ip).await {
        HostLookup::Unreachable => anyhow::bail!(
            "Cannot reach {}: check that it is powered, cabled, on this network and that the address is right",
            ip
        ),
        HostLookup::NotFound => {
            println!("Could not discover the device ID automatically.");
            println!("Read it from the master's web interface and enter it by hand.");
        }
        HostLookup::Found { device_id, path } => {
            println!("Device ID: {} (from {})", device_id, path);
        }
    }

    Ok(())
}
