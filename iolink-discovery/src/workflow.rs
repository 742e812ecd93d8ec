//! Operator validation of discovered masters.

use tracing::{info, warn};

use crate::device::DiscoveredDevice;
use crate::prompt::{Confirmation, Prompt, PromptError};

/// Result of a validation session.
#[derive(Debug, Default)]
pub struct WorkflowOutcome {
    /// Accepted devices, with unit and role assigned, in discovery order.
    pub validated: Vec<DiscoveredDevice>,
    /// Number of devices the operator rejected.
    pub rejected: usize,
    /// The operator quit (or input closed) before the last device.
    pub aborted: bool,
}

/// Walks the operator through each device, one at a time.
pub struct ValidationWorkflow<P> {
    prompt: P,
}

impl<P: Prompt> ValidationWorkflow<P> {
    pub fn new(prompt: P) -> Self {
        Self { prompt }
    }

    pub fn into_prompt(self) -> P {
        self.prompt
    }

    /// Validate `devices` in order.
    ///
    /// Quitting drops the remaining devices but keeps those already accepted.
    pub fn run(&mut self, devices: Vec<DiscoveredDevice>) -> Result<WorkflowOutcome, PromptError> {
        let mut outcome = WorkflowOutcome::default();

        if devices.is_empty() {
            self.prompt.notify("No IO-Link masters to validate.")?;
            return Ok(outcome);
        }

        let total = devices.len();
        for (index, mut device) in devices.into_iter().enumerate() {
            match self.prompt.confirm(&device)? {
                Confirmation::Quit => {
                    info!(remaining = total - index, "Validation aborted by operator");
                    outcome.aborted = true;
                    break;
                }
                Confirmation::Reject => {
                    info!(ip = %device.ip, "Device rejected");
                    outcome.rejected += 1;
                }
                Confirmation::Accept => match self.assign(&mut device) {
                    Ok(()) => {
                        info!(
                            ip = %device.ip,
                            unit = ?device.unit_number,
                            role = ?device.role,
                            "Device validated"
                        );
                        outcome.validated.push(device);
                    }
                    Err(PromptError::Closed) => {
                        warn!(ip = %device.ip, "Input closed during assignment");
                        outcome.aborted = true;
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(outcome)
    }

    fn assign(&mut self, device: &mut DiscoveredDevice) -> Result<(), PromptError> {
        let unit = self.prompt.choose_unit(device)?;
        let role = self.prompt.choose_role()?;
        let name = self.prompt.device_name()?;

        device.unit_number = Some(unit);
        device.role = Some(role);
        device.device_name = name;
        device.is_validated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RoleCode;
    use crate::prompt::LinePrompt;
    use std::io::Cursor;
    use std::net::Ipv4Addr;

    fn devices(count: u8) -> Vec<DiscoveredDevice> {
        (0..count)
            .map(|i| {
                DiscoveredDevice::new(
                    Ipv4Addr::new(192, 168, 20, 29 + i),
                    format!("00:02:01:00:00:{:02X}", i + 1).parse().unwrap(),
                    20,
                )
            })
            .collect()
    }

    fn workflow(input: &str) -> ValidationWorkflow<LinePrompt<Cursor<Vec<u8>>, Vec<u8>>> {
        ValidationWorkflow::new(LinePrompt::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
        ))
    }

    #[test]
    fn test_quit_keeps_already_validated() {
        let mut wf = workflow("y\n1\na\nHeater north\nq\n");
        let outcome = wf.run(devices(5)).unwrap();

        assert!(outcome.aborted);
        assert_eq!(outcome.validated.len(), 1);

        let device = &outcome.validated[0];
        assert_eq!(device.ip, Ipv4Addr::new(192, 168, 20, 29));
        assert!(device.is_validated);
        assert_eq!(device.unit_number, Some(1));
        assert_eq!(device.role, Some(RoleCode::A));
        assert_eq!(device.device_name.as_deref(), Some("Heater north"));
    }

    #[test]
    fn test_reject_and_accept() {
        let mut wf = workflow("n\nyes\n2\nT\n\n");
        let outcome = wf.run(devices(2)).unwrap();

        assert!(!outcome.aborted);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.validated.len(), 1);
        assert_eq!(outcome.validated[0].ip, Ipv4Addr::new(192, 168, 20, 30));
        assert_eq!(outcome.validated[0].device_name, None);
    }

    #[test]
    fn test_eof_behaves_like_quit() {
        let mut wf = workflow("y\n3\n");
        let outcome = wf.run(devices(3)).unwrap();

        assert!(outcome.aborted);
        assert!(outcome.validated.is_empty());
    }

    #[test]
    fn test_no_devices() {
        let mut wf = workflow("");
        let outcome = wf.run(Vec::new()).unwrap();
        assert!(outcome.validated.is_empty());
        assert!(!outcome.aborted);

        let out = String::from_utf8(wf.into_prompt().into_output()).unwrap();
        assert!(out.contains("No IO-Link masters"));
    }
}
