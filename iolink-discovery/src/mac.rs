//! Hardware (MAC) addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid MAC address '{0}'")]
pub struct MacParseError(pub String);

/// A 48-bit hardware address. Never all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Wrap raw bytes; `None` for the all-zero placeholder.
    pub fn from_bytes(bytes: [u8; 6]) -> Option<Self> {
        if bytes == [0; 6] {
            None
        } else {
            Some(Self(bytes))
        }
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `:` or `-` separated hex pairs in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError(s.to_string());
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split([':', '-']).collect();

        if parts.len() != 6 {
            return Err(err());
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(err());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }

        Self::from_bytes(bytes).ok_or_else(err)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_uppercase() {
        let mac: MacAddress = "00:02:01:1a:2b:3c".parse().unwrap();
        assert_eq!(mac.to_string(), "00:02:01:1A:2B:3C");

        let dashed: MacAddress = "00-02-01-1A-2B-3C".parse().unwrap();
        assert_eq!(dashed, mac);
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!("00:00:00:00:00:00".parse::<MacAddress>().is_err());
        assert!("00:02:01:1a:2b".parse::<MacAddress>().is_err());
        assert!("00:02:01:1a:2b:zz".parse::<MacAddress>().is_err());
        assert!("0:2:1:1a:2b:3c".parse::<MacAddress>().is_err());
        assert!(MacAddress::from_bytes([0; 6]).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let mac = MacAddress::from_bytes([0x00, 0x02, 0x01, 0xAA, 0xBB, 0xCC]).unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00:02:01:AA:BB:CC\"");
        assert_eq!(serde_json::from_str::<MacAddress>(&json).unwrap(), mac);
    }
}
