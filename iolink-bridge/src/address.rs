//! Resolution of unit-relative master addresses.
//!
//! Masters are addressed as `<network_prefix>.<subnet>.<host>`. Configuration
//! and commands may give any of:
//!
//! - a full dotted quad (`192.168.20.29`), used as is
//! - a legacy `subnet.host` pair (`20.29`)
//! - a bare host octet (`29`), placed in the unit's subnet
//! - nothing, meaning the unit's default host

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::config::UnitConfig;

/// Address resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid network prefix '{0}' (expected two octets, e.g. 192.168)")]
    InvalidPrefix(String),
    #[error("Invalid address '{0}'")]
    Invalid(String),
}

/// Resolves host, `subnet.host` and dotted-quad forms into IPv4 addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResolver {
    prefix: [u8; 2],
    subnet: u8,
    default: Ipv4Addr,
}

impl AddressResolver {
    /// Create a resolver for a network prefix, subnet and default host.
    pub fn new(network_prefix: &str, subnet: u8, default_host: &str) -> Result<Self, AddressError> {
        let prefix = match parse_octets(network_prefix).as_deref() {
            Some([a, b]) => [*a, *b],
            _ => return Err(AddressError::InvalidPrefix(network_prefix.to_string())),
        };

        let mut resolver = Self {
            prefix,
            subnet,
            default: Ipv4Addr::UNSPECIFIED,
        };
        resolver.default = resolver.resolve(default_host)?;
        Ok(resolver)
    }

    /// Create a resolver from unit configuration.
    pub fn from_unit(unit: &UnitConfig) -> Result<Self, AddressError> {
        Self::new(&unit.network_prefix, unit.subnet, &unit.default_host)
    }

    /// The address used when no target is given.
    pub fn default_address(&self) -> Ipv4Addr {
        self.default
    }

    /// The unit's subnet octet.
    pub fn subnet(&self) -> u8 {
        self.subnet
    }

    /// Normalize an optional target into a canonical address.
    pub fn normalize(&self, target: Option<&str>) -> Result<Ipv4Addr, AddressError> {
        match target.map(str::trim) {
            None | Some("") => Ok(self.default),
            Some(target) => self.resolve(target),
        }
    }

    fn resolve(&self, target: &str) -> Result<Ipv4Addr, AddressError> {
        let target = target.trim();
        let [a, b] = self.prefix;

        match parse_octets(target).as_deref() {
            Some([host]) => Ok(Ipv4Addr::new(a, b, self.subnet, *host)),
            Some([subnet, host]) => Ok(Ipv4Addr::new(a, b, *subnet, *host)),
            Some([o1, o2, o3, o4]) => Ok(Ipv4Addr::new(*o1, *o2, *o3, *o4)),
            _ => Err(AddressError::Invalid(target.to_string())),
        }
    }
}

fn parse_octets(s: &str) -> Option<Vec<u8>> {
    s.split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<u8>().ok()
            }
        })
        .collect()
}
