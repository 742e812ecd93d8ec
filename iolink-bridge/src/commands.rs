//! Output commands received from the bus.
//!
//! Dashboards publish `1` or `0` on `instrument/<device>/iolink/<port>`. The
//! intake task drains those samples one at a time, relays them to the device's
//! master and publishes the outcome on `<key_prefix>/@/commands/result`.

use std::sync::Arc;

use thiserror::Error;

use iolink_bridge_framework::BridgeError;

use crate::context::BridgeContext;
use crate::relay::RelayResult;

/// Key suffix command outcomes are published under.
pub const RESULT_SUFFIX: &str = "@/commands/result";

/// Key expression for command outcomes.
pub fn result_key(prefix: &str) -> String {
    format!("{}/{}", prefix, RESULT_SUFFIX)
}

/// Command parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unrecognized command key '{0}' (expected .../<device>/iolink/<port>)")]
    Key(String),
    #[error("Invalid port '{0}'")]
    Port(String),
    #[error("Invalid output state '{0}' (expected 1, 0, true, false, on or off)")]
    State(String),
}

/// A parsed output command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCommand {
    pub device: String,
    pub port: u8,
    pub state: bool,
}

/// Parse a command from its key and payload.
pub fn parse_command(key: &str, payload: &str) -> Result<OutputCommand, CommandError> {
    let segments: Vec<&str> = key.split('/').collect();
    let n = segments.len();

    if n < 3 || segments[n - 2] != "iolink" || segments[n - 3].is_empty() {
        return Err(CommandError::Key(key.to_string()));
    }

    Ok(OutputCommand {
        device: segments[n - 3].to_string(),
        port: parse_port(segments[n - 1])?,
        state: parse_state(payload)?,
    })
}

/// Accepts `6`, `port6` and `port[6]`.
pub fn parse_port(segment: &str) -> Result<u8, CommandError> {
    let digits = segment.strip_prefix("port").unwrap_or(segment);
    let digits = digits
        .strip_prefix('[')
        .and_then(|d| d.strip_suffix(']'))
        .unwrap_or(digits);

    match digits.parse::<u8>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(CommandError::Port(segment.to_string())),
    }
}

pub fn parse_state(payload: &str) -> Result<bool, CommandError> {
    match payload.trim().trim_matches('"').to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(CommandError::State(payload.to_string())),
    }
}

/// Task that drains command samples and relays them.
pub struct CommandIntake {
    ctx: Arc<BridgeContext>,
}

impl CommandIntake {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self { ctx }
    }

    /// Subscribe and process commands until the subscriber closes.
    pub async fn run(self) -> Result<(), BridgeError> {
        let key_expr = self.ctx.config().commands.key_expr.clone();
        let subscriber = self
            .ctx
            .publisher()
            .session()
            .declare_subscriber(key_expr.as_str())
            .await?;

        tracing::info!(key_expr = %key_expr, "Listening for output commands");

        while let Ok(sample) = subscriber.recv_async().await {
            let key = sample.key_expr().as_str().to_string();
            let bytes = sample.payload().to_bytes();
            let payload = String::from_utf8_lossy(&bytes);

            let Some(result) = self.handle(&key, &payload).await else {
                continue;
            };

            let result_key = result_key(self.ctx.config().key_prefix.as_str());
            if let Err(e) = self.ctx.publisher().publish_json(&result_key, &result).await {
                tracing::warn!(error = %e, "Failed to publish command result");
            }
        }

        tracing::info!("Command subscriber closed");
        Ok(())
    }

    /// Handle one command sample. Malformed commands are logged and dropped.
    pub async fn handle(&self, key: &str, payload: &str) -> Option<RelayResult> {
        let command = match parse_command(key, payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping command");
                return None;
            }
        };

        let host = self.ctx.device_host(&command.device);
        if host.is_none() {
            tracing::debug!(
                device = %command.device,
                "Unknown device, using default address"
            );
        }

        let result = self
            .ctx
            .relay()
            .set_output(command.port, command.state, host)
            .await;

        tracing::info!(
            device = %command.device,
            port = command.port,
            state = command.state,
            ok = result.is_ok(),
            "Handled output command"
        );

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("iolink"), "iolink/@/commands/result");
    }

    #[test]
    fn test_parse_command() {
        let cmd = parse_command("instrument/htr_a/iolink/6", "1").unwrap();
        assert_eq!(
            cmd,
            OutputCommand {
                device: "htr_a".to_string(),
                port: 6,
                state: true,
            }
        );

        let cmd = parse_command("plant/instrument/htr_b/iolink/port[2]", "off").unwrap();
        assert_eq!(cmd.device, "htr_b");
        assert_eq!(cmd.port, 2);
        assert!(!cmd.state);
    }

    #[test]
    fn test_parse_port_forms() {
        assert_eq!(parse_port("6"), Ok(6));
        assert_eq!(parse_port("port6"), Ok(6));
        assert_eq!(parse_port("port[6]"), Ok(6));
        assert!(parse_port("0").is_err());
        assert!(parse_port("port[]").is_err());
        assert!(parse_port("x").is_err());
    }

    #[test]
    fn test_parse_state() {
        for on in ["1", "true", "ON", "\"1\""] {
            assert_eq!(parse_state(on), Ok(true), "{on}");
        }
        for off in ["0", "false", "Off"] {
            assert_eq!(parse_state(off), Ok(false), "{off}");
        }
        assert!(parse_state("2").is_err());
    }

    #[test]
    fn test_parse_bad_keys() {
        assert!(matches!(
            parse_command("instrument/htr_a/temperature", "1"),
            Err(CommandError::Key(_))
        ));
        assert!(matches!(
            parse_command("iolink/6", "1"),
            Err(CommandError::Key(_))
        ));
    }
}
