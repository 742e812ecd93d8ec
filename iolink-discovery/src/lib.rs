//! Discovery of IO-Link masters.
//!
//! A session runs in four steps:
//!
//! 1. [`scanner`] probes the candidate hosts of each subnet for the master
//!    device-info endpoint and resolves each responder's MAC via [`identity`].
//! 2. [`workflow`] asks the operator to confirm each master and assign it a
//!    unit and a role ([`prompt`] abstracts the terminal).
//! 3. [`registry`] writes the validated devices to a JSON file.
//! 4. [`summary`] prints them grouped by unit.
//!
//! With `--host <ip>` the tool instead looks up the device ID of a single
//! master ([`scanner::DiscoveryScanner::lookup_device_id`]), the value the
//! bridge needs as a device's `device_id`.

pub mod config;
pub mod device;
pub mod device_id;
pub mod error;
pub mod identity;
pub mod mac;
pub mod prompt;
pub mod registry;
pub mod scanner;
pub mod summary;
pub mod workflow;

pub use config::DiscoveryConfig;
pub use device::{DeviceRecord, DiscoveredDevice, RoleCode};
pub use error::{DiscoveryError, Result};
pub use mac::MacAddress;
