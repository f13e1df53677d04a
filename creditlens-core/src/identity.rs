//! Identity types for dashboard selections

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Portfolio company identifier as exposed by `GET /companies`.
    CompanyId
);

string_id!(
    /// Product identifier, scoped to a company.
    ProductId
);

string_id!(
    /// Snapshot (tape) identifier sent as the `snapshot` query parameter.
    ///
    /// The backend matches tapes by their extraction date, so this is the
    /// tape date whenever the backend reports one and the filename otherwise.
    SnapshotId
);

/// ISO-4217 style display currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Reporting currency every product can be converted into.
    pub const USD: &'static str = "USD";

    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn usd() -> Self {
        Self(Self::USD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_usd(&self) -> bool {
        self.0 == Self::USD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidCurrency(s.to_string()));
        }
        Ok(Self::new(code))
    }
}

/// Derived identity of a selection state.
///
/// Two selections share a fingerprint exactly when every level they cover
/// holds the same value (including "unset").
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash an ordered list of level values. `None` marks an unset level.
    pub fn of<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut hasher = Sha256::new();
        for (position, part) in parts.into_iter().enumerate() {
            hasher.update((position as u32).to_be_bytes());
            match part {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update((value.len() as u64).to_be_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalizes_case() {
        assert_eq!(Currency::new(" aed ").as_str(), "AED");
        assert!(Currency::new("usd").is_usd());
    }

    #[test]
    fn test_currency_parse_rejects_garbage() {
        assert!("AED".parse::<Currency>().is_ok());
        assert!("AE".parse::<Currency>().is_err());
        assert!("A1D".parse::<Currency>().is_err());
    }

    #[test]
    fn test_fingerprint_distinguishes_unset_from_empty() {
        let unset = Fingerprint::of([Some("acme"), None]);
        let empty = Fingerprint::of([Some("acme"), Some("")]);
        assert_ne!(unset, empty);
    }

    #[test]
    fn test_fingerprint_is_position_sensitive() {
        let a = Fingerprint::of([Some("ab"), Some("c")]);
        let b = Fingerprint::of([Some("a"), Some("bc")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_hex_roundtrip_length() {
        let fp = Fingerprint::of([Some("acme")]);
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(fp.short().len(), 12);
    }
}
