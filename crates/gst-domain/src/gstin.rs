//! GST Identification Number.
//!
//! Structure: 2-digit state code, 10-char PAN, entity number, `Z`, checksum char.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static GSTIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").expect("valid GSTIN regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid GSTIN: {0:?}")]
pub struct InvalidGstin(pub String);

/// A syntactically valid GSTIN. Construction is the only validation point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gstin(String);

impl Gstin {
    pub fn parse(value: &str) -> Result<Self, InvalidGstin> {
        let value = value.trim();
        if GSTIN_PATTERN.is_match(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(InvalidGstin(value.to_owned()))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        GSTIN_PATTERN.is_match(value.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit state code prefix (e.g. `"29"` for Karnataka).
    pub fn state_code(&self) -> &str {
        &self.0[..2]
    }

    /// Embedded PAN (characters 3–12).
    pub fn pan(&self) -> &str {
        &self.0[2..12]
    }
}

impl fmt::Display for Gstin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Gstin {
    type Err = InvalidGstin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Gstin {
    type Error = InvalidGstin;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Gstin> for String {
    fn from(value: Gstin) -> Self {
        value.0
    }
}
