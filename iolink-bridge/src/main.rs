//! Zenoh bridge for IO-Link masters.
//!
//! Polls the configured devices and publishes their readings to Zenoh, and
//! relays output commands received on the bus.

use anyhow::Result;
use iolink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use iolink_bridge::commands::CommandIntake;
use iolink_bridge::config::IolinkBridgeConfig;
use iolink_bridge::context::BridgeContext;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("iolink.json5");

    let config = IolinkBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new_with_args("iolink", config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut runner = runner.with_status_publishing();

    let iolink_config = runner.config().iolink.clone();
    let setup = BridgeContext::build(runner.publisher(), iolink_config)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let ctx = setup.context;

    for poller in setup.pollers {
        tracing::info!(device = %poller.key(), url = %poller.url(), "Starting poller");
        runner.spawn(poller.run());
    }

    if ctx.config().commands.enabled {
        let intake = CommandIntake::new(ctx.clone());
        runner.spawn_with_error("command-intake".to_string(), intake.run());
    }

    let metadata = serde_json::json!({
        "unit": ctx.config().unit.name,
        "subnet": ctx.config().unit.subnet,
        "devices": ctx.config().devices.iter().map(|d| &d.key).collect::<Vec<_>>(),
        "poll_interval_ms": ctx.config().poll_interval_ms,
        "commands": ctx.config().commands.enabled,
    });

    tracing::info!(
        "IO-Link bridge running (unit: {}, {} device(s))",
        ctx.config().unit.name,
        ctx.config().devices.len()
    );

    runner
        .run_with_metadata(Some(metadata))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
