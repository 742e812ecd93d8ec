//! Output command relay.
//!
//! Translates "switch port N on/off" into the master's `pdout` request and
//! forwards it synchronously. Every outcome, including unresolvable targets,
//! comes back as a [`RelayResult`].

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{AddressError, AddressResolver};

/// Correlation id sent with every request.
pub const REQUEST_CID: u32 = 4711;

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Invalid port {0} (ports start at 1)")]
    InvalidPort(u8),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Master returned HTTP {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Body(String),
}

/// Which `pdout` service to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputVerb {
    Set,
    Get,
}

impl OutputVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputVerb::Set => "setdata",
            OutputVerb::Get => "getdata",
        }
    }
}

/// Master service address of a port's output data.
pub fn pdout_address(port: u8, verb: OutputVerb) -> String {
    format!("iolinkmaster/port[{}]/iolinkdevice/pdout/{}", port, verb.as_str())
}

/// Request body understood by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub code: String,
    pub cid: u32,
    pub adr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NewValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValue {
    pub newvalue: String,
}

impl RelayRequest {
    /// Request switching a port's output.
    pub fn set(port: u8, state: bool) -> Self {
        Self {
            code: "request".to_string(),
            cid: REQUEST_CID,
            adr: pdout_address(port, OutputVerb::Set),
            data: Some(NewValue {
                newvalue: if state { "01" } else { "00" }.to_string(),
            }),
        }
    }

    /// Request reading a port's output.
    pub fn get(port: u8) -> Self {
        Self {
            code: "request".to_string(),
            cid: REQUEST_CID,
            adr: pdout_address(port, OutputVerb::Get),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Ok,
    Error,
}

/// Outcome of a relayed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResult {
    pub status: RelayStatus,
    /// Resolved master address, or the target as given when it did not resolve.
    pub ip: String,
    pub port: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RelayResult {
    pub fn ok(ip: impl Into<String>, port: u8, response: serde_json::Value) -> Self {
        Self {
            status: RelayStatus::Ok,
            ip: ip.into(),
            port,
            response: Some(response),
            message: None,
        }
    }

    pub fn error(ip: impl Into<String>, port: u8, error: &RelayError) -> Self {
        Self {
            status: RelayStatus::Error,
            ip: ip.into(),
            port,
            response: None,
            message: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RelayStatus::Ok
    }
}

/// Forwards output commands to masters.
#[derive(Debug, Clone)]
pub struct CommandRelay {
    client: reqwest::Client,
    resolver: AddressResolver,
    http_port: Option<u16>,
    timeout: Duration,
}

impl CommandRelay {
    pub fn new(
        client: reqwest::Client,
        resolver: AddressResolver,
        http_port: Option<u16>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            resolver,
            http_port,
            timeout,
        }
    }

    /// Switch a port's output on or off.
    pub async fn set_output(&self, port: u8, state: bool, target: Option<&str>) -> RelayResult {
        self.relay(port, RelayRequest::set(port, state), OutputVerb::Set, target)
            .await
    }

    /// Read back a port's output.
    pub async fn get_output(&self, port: u8, target: Option<&str>) -> RelayResult {
        self.relay(port, RelayRequest::get(port), OutputVerb::Get, target)
            .await
    }

    async fn relay(
        &self,
        port: u8,
        request: RelayRequest,
        verb: OutputVerb,
        target: Option<&str>,
    ) -> RelayResult {
        let ip = match self.resolver.normalize(target) {
            Ok(ip) => ip,
            Err(e) => {
                let e = RelayError::from(e);
                tracing::warn!(requested = ?target, error = %e, "Cannot relay command");
                return RelayResult::error(target.unwrap_or_default(), port, &e);
            }
        };

        match self.send(ip, port, &request, verb).await {
            Ok(response) => {
                tracing::info!(%ip, port, adr = %request.adr, "Relayed command");
                RelayResult::ok(ip.to_string(), port, response)
            }
            Err(e) => {
                tracing::warn!(%ip, port, adr = %request.adr, error = %e, "Relay failed");
                RelayResult::error(ip.to_string(), port, &e)
            }
        }
    }

    async fn send(
        &self,
        ip: Ipv4Addr,
        port: u8,
        request: &RelayRequest,
        verb: OutputVerb,
    ) -> Result<serde_json::Value, RelayError> {
        if port == 0 {
            return Err(RelayError::InvalidPort(port));
        }

        let url = format!(
            "{}/{}",
            master_base_url(ip, self.http_port),
            pdout_address(port, verb)
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;

        serde_json::from_slice(&body).map_err(|e| RelayError::Body(e.to_string()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else {
            RelayError::Http(e.to_string())
        }
    }
}

/// `http://ip[:port]` of a master.
pub fn master_base_url(ip: Ipv4Addr, http_port: Option<u16>) -> String {
    match http_port {
        Some(port) => format!("http://{}:{}", ip, port),
        None => format!("http://{}", ip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_body() {
        let json = serde_json::to_value(RelayRequest::set(6, true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "request",
                "cid": 4711,
                "adr": "iolinkmaster/port[6]/iolinkdevice/pdout/setdata",
                "data": { "newvalue": "01" }
            })
        );

        let off = RelayRequest::set(2, false);
        assert_eq!(off.data.unwrap().newvalue, "00");
    }

    #[test]
    fn test_get_request_omits_data() {
        let json = serde_json::to_value(RelayRequest::get(3)).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["adr"], "iolinkmaster/port[3]/iolinkdevice/pdout/getdata");
    }

    #[test]
    fn test_base_url() {
        let ip = Ipv4Addr::new(192, 168, 20, 29);
        assert_eq!(master_base_url(ip, None), "http://192.168.20.29");
        assert_eq!(master_base_url(ip, Some(8080)), "http://192.168.20.29:8080");
    }

    #[test]
    fn test_result_serialization() {
        let err = RelayResult::error("192.168.20.29", 6, &RelayError::Status(503));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Master returned HTTP 503");
        assert!(json.get("response").is_none());

        let ok = RelayResult::ok("192.168.20.29", 6, serde_json::json!({ "code": 200 }));
        assert!(ok.is_ok());
        assert_eq!(serde_json::to_value(&ok).unwrap()["status"], "ok");
    }

    #[tokio::test]
    async fn test_unresolvable_target_is_error_result() {
        let relay = CommandRelay::new(
            reqwest::Client::new(),
            AddressResolver::new("192.168", 20, "29").unwrap(),
            None,
            Duration::from_millis(100),
        );

        let result = relay.set_output(6, true, Some("not-a-host")).await;
        assert_eq!(result.status, RelayStatus::Error);
        assert_eq!(result.ip, "not-a-host");
        assert!(result.message.unwrap().contains("not-a-host"));
    }

    #[tokio::test]
    async fn test_port_zero_is_error_result() {
        let relay = CommandRelay::new(
            reqwest::Client::new(),
            AddressResolver::new("127.0", 0, "1").unwrap(),
            None,
            Duration::from_millis(100),
        );

        let result = relay.get_output(0, None).await;
        assert_eq!(result.status, RelayStatus::Error);
        assert_eq!(result.ip, "127.0.0.1");
    }
}
