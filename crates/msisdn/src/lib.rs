//! Account identifier normalization.
//!
//! The linking front-end accepts free-form phone number input ("+49 170 123
//! 4567", "49-170-1234567", ...) and must hand the core a normalized
//! identifier: the E.164 number without the leading plus, digits only. This
//! crate owns that normalization. Downstream components assume it already
//! happened and never re-validate format.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum number of digits for a plausible E.164 number (national
/// significant number included).
pub const MIN_DIGITS: usize = 7;

/// Maximum number of digits permitted by E.164.
pub const MAX_DIGITS: usize = 15;

/// Errors from identifier normalization.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MsisdnError {
    #[error("identifier contains no digits")]
    Empty,
    #[error("identifier too short: {0} digits (minimum {MIN_DIGITS})")]
    TooShort(usize),
    #[error("identifier too long: {0} digits (maximum {MAX_DIGITS})")]
    TooLong(usize),
    #[error("identifier cannot start with zero; include the country code")]
    LeadingZero,
}

/// A normalized account identifier: digits only, E.164 without the plus.
///
/// Serializes as its plain string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Msisdn(String);

impl Msisdn {
    /// Normalize raw user input into an identifier.
    ///
    /// Strips every non-digit character, then checks E.164 length bounds and
    /// rejects numbers without a country code (leading zero).
    pub fn normalize(raw: &str) -> Result<Self, MsisdnError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(MsisdnError::Empty);
        }
        if digits.len() < MIN_DIGITS {
            return Err(MsisdnError::TooShort(digits.len()));
        }
        if digits.len() > MAX_DIGITS {
            return Err(MsisdnError::TooLong(digits.len()));
        }
        if digits.starts_with('0') {
            return Err(MsisdnError::LeadingZero);
        }

        Ok(Self(digits))
    }

    /// The normalized identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Msisdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Msisdn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
