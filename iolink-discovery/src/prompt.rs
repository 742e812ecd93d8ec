//! Operator prompts.
//!
//! The validation workflow only talks to a [`Prompt`]. [`LinePrompt`] drives
//! it over any line-oriented reader and writer: the terminal in production,
//! in-memory buffers in tests.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::device::{DiscoveredDevice, RoleCode};

/// Answer to "is this the right device?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accept,
    Reject,
    Quit,
}

#[derive(Debug, Error)]
pub enum PromptError {
    /// Input closed (EOF) before an answer was given.
    #[error("Input closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Questions asked while validating a device.
pub trait Prompt {
    /// Show the device and ask for accept, reject or quit.
    fn confirm(&mut self, device: &DiscoveredDevice) -> Result<Confirmation, PromptError>;

    /// Ask for a unit number (1 or higher).
    fn choose_unit(&mut self, device: &DiscoveredDevice) -> Result<u32, PromptError>;

    /// Ask for the device's role.
    fn choose_role(&mut self) -> Result<RoleCode, PromptError>;

    /// Ask for an optional name; blank means none.
    fn device_name(&mut self) -> Result<Option<String>, PromptError>;

    /// Print an informational line.
    fn notify(&mut self, message: &str) -> Result<(), PromptError>;
}

const RULE: &str = "============================================================";

/// [`Prompt`] over a line reader and a writer.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl LinePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process terminal.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the writer (tests inspect what was printed).
    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `question` and read one trimmed line.
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn confirm(&mut self, device: &DiscoveredDevice) -> Result<Confirmation, PromptError> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", RULE)?;
        writeln!(self.output, "DEVICE DISCOVERED")?;
        writeln!(self.output, "{}", RULE)?;
        writeln!(self.output, "IP Address:  {}", device.ip)?;
        writeln!(self.output, "MAC Address: {}", device.mac)?;
        let [a, b, _, _] = device.ip.octets();
        writeln!(self.output, "Subnet:      {}.{}.{}.x", a, b, device.subnet)?;
        writeln!(self.output, "Device Type: {}", device.device_type)?;
        writeln!(self.output, "{}", RULE)?;

        loop {
            let answer = match self.ask("Does this MAC address match the device? (y/n/q to quit): ") {
                Ok(answer) => answer.to_ascii_lowercase(),
                Err(PromptError::Closed) => return Ok(Confirmation::Quit),
                Err(e) => return Err(e),
            };

            match answer.as_str() {
                "y" | "yes" => return Ok(Confirmation::Accept),
                "n" | "no" => return Ok(Confirmation::Reject),
                "q" | "quit" => return Ok(Confirmation::Quit),
                _ => writeln!(self.output, "Please enter 'y', 'n', or 'q'.")?,
            }
        }
    }

    fn choose_unit(&mut self, device: &DiscoveredDevice) -> Result<u32, PromptError> {
        writeln!(self.output)?;
        writeln!(self.output, "UNIT ASSIGNMENT: {} ({})", device.ip, device.mac)?;

        loop {
            let answer = self.ask("Enter unit number (1, 2, 3, etc.): ")?;
            match answer.parse::<u32>() {
                Ok(unit) if unit > 0 => return Ok(unit),
                _ => writeln!(self.output, "Please enter a valid unit number (1 or higher).")?,
            }
        }
    }

    fn choose_role(&mut self) -> Result<RoleCode, PromptError> {
        writeln!(self.output)?;
        writeln!(self.output, "Heater types:")?;
        for role in RoleCode::ALL {
            writeln!(self.output, "{} - {}", role, role.description())?;
        }

        loop {
            let answer = self.ask("Enter heater type (A/B/C/T/O): ")?;
            match answer.parse::<RoleCode>() {
                Ok(role) => return Ok(role),
                Err(_) => writeln!(self.output, "Please enter a valid heater type.")?,
            }
        }
    }

    fn device_name(&mut self) -> Result<Option<String>, PromptError> {
        match self.ask("Enter device name (optional): ") {
            Ok(name) if name.is_empty() => Ok(None),
            Ok(name) => Ok(Some(name)),
            Err(PromptError::Closed) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn notify(&mut self, message: &str) -> Result<(), PromptError> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}
