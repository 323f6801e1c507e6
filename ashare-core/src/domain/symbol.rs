//! Canonical symbol: the single provider-facing spelling of a security.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange a security is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Shanghai Stock Exchange (`sh`, `.XSHG`).
    Sh,
    /// Shenzhen Stock Exchange (`sz`, `.XSHE`).
    Sz,
}

impl Market {
    pub fn prefix(self) -> &'static str {
        match self {
            Market::Sh => "sh",
            Market::Sz => "sz",
        }
    }

    /// Market inferred from a bare code: `3xxxxx` is Shenzhen, everything else Shanghai.
    pub fn infer(code: &str) -> Self {
        if code.starts_with('3') {
            Market::Sz
        } else {
            Market::Sh
        }
    }
}

/// A normalized `{market}{digits}` identifier such as `sz300718`.
///
/// Every accepted spelling of the same security maps to one value:
///
/// | input          | canonical   |
/// |----------------|-------------|
/// | `300718`       | `sz300718`  |
/// | `sz300718`     | `sz300718`  |
/// | `300718.XSHE`  | `sz300718`  |
/// | `600000.XSHG`  | `sh600000`  |
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSymbol(String);

impl CanonicalSymbol {
    /// Normalize any accepted spelling. Never fails: malformed input goes
    /// through the bare-code rule as a best-effort guess.
    pub fn normalize(input: &str) -> Self {
        let input = input.trim();

        if let Some(code) = input.strip_suffix(".XSHG") {
            return Self::with_market(Market::Sh, code.trim_end());
        }
        if let Some(code) = input.strip_suffix(".XSHE") {
            return Self::with_market(Market::Sz, code.trim_end());
        }
        if input.starts_with("sh") || input.starts_with("sz") {
            return Self(input.to_string());
        }
        Self::with_market(Market::infer(input), input)
    }

    fn with_market(market: Market, code: &str) -> Self {
        Self(format!("{}{code}", market.prefix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn market(&self) -> Market {
        if self.0.starts_with("sz") {
            Market::Sz
        } else {
            Market::Sh
        }
    }

    /// The code without its market prefix (`300718` for `sz300718`).
    pub fn code(&self) -> &str {
        self.0.get(2..).unwrap_or_default()
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalSymbol {
    fn from(input: &str) -> Self {
        Self::normalize(input)
    }
}

impl AsRef<str> for CanonicalSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
