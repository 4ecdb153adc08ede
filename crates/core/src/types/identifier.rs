//! Unit identifier classification for serialized inventory.
//!
//! Every serialized unit (a phone, a tablet) is scanned at the receiving dock
//! as a raw string. The engine classifies that string as an IMEI or a serial
//! number using a simple shape heuristic; Luhn checksum validation is a
//! concern of the capture UI, not of this engine.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when classifying a [`UnitIdentifier`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum IdentifierError {
    /// The input string is empty (or whitespace only).
    #[error("identifier cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("identifier must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A classified unit identifier: an IMEI or a serial number.
///
/// An identifier is an IMEI when it is all digits and 14-17 characters long;
/// anything else is treated as a serial number. The same classification is
/// applied when the identifier is stored on a device record, so a scanned
/// string always lands in exactly one of the two columns.
///
/// ## Examples
///
/// ```
/// use reloop_core::UnitIdentifier;
///
/// let imei = UnitIdentifier::classify("355089912345678").unwrap();
/// assert!(imei.is_imei());
///
/// let serial = UnitIdentifier::classify("C02XK1ZXJGH5").unwrap();
/// assert!(!serial.is_imei());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UnitIdentifier {
    /// An IMEI: all digits, 14-17 characters.
    Imei(String),
    /// Anything that is not IMEI-shaped.
    Serial(String),
}

impl UnitIdentifier {
    /// Minimum length of an IMEI-shaped identifier.
    pub const IMEI_MIN_LENGTH: usize = 14;
    /// Maximum length of an IMEI-shaped identifier.
    pub const IMEI_MAX_LENGTH: usize = 17;
    /// Maximum length of any identifier accepted by the engine.
    pub const MAX_LENGTH: usize = 64;

    /// Classify a scanned identifier string.
    ///
    /// Leading and trailing whitespace is trimmed before classification.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn classify(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(IdentifierError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let imei_shaped = trimmed.len() >= Self::IMEI_MIN_LENGTH
            && trimmed.len() <= Self::IMEI_MAX_LENGTH
            && trimmed.chars().all(|c| c.is_ascii_digit());

        if imei_shaped {
            Ok(Self::Imei(trimmed.to_owned()))
        } else {
            Ok(Self::Serial(trimmed.to_owned()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Imei(s) | Self::Serial(s) => s,
        }
    }

    /// Returns `true` if the identifier was classified as an IMEI.
    #[must_use]
    pub const fn is_imei(&self) -> bool {
        matches!(self, Self::Imei(_))
    }
}

impl fmt::Display for UnitIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_imei() {
        // 14-17 digit strings are IMEIs
        assert!(UnitIdentifier::classify("12345678901234").unwrap().is_imei());
        assert!(
            UnitIdentifier::classify("355089912345678")
                .unwrap()
                .is_imei()
        );
        assert!(
            UnitIdentifier::classify("35508991234567890")
                .unwrap()
                .is_imei()
        );
    }

    #[test]
    fn test_classify_serial() {
        // Too short, too long, or non-digit strings are serials
        assert!(!UnitIdentifier::classify("1234567890123").unwrap().is_imei());
        assert!(
            !UnitIdentifier::classify("123456789012345678")
                .unwrap()
                .is_imei()
        );
        assert!(!UnitIdentifier::classify("C02XK1ZXJGH5").unwrap().is_imei());
        assert!(
            !UnitIdentifier::classify("35508991234567A")
                .unwrap()
                .is_imei()
        );
    }

    #[test]
    fn test_classify_trims_whitespace() {
        let id = UnitIdentifier::classify("  355089912345678 ").unwrap();
        assert!(id.is_imei());
        assert_eq!(id.as_str(), "355089912345678");
    }

    #[test]
    fn test_classify_empty() {
        assert!(matches!(
            UnitIdentifier::classify("   "),
            Err(IdentifierError::Empty)
        ));
    }

    #[test]
    fn test_classify_too_long() {
        let long = "x".repeat(65);
        assert!(matches!(
            UnitIdentifier::classify(&long),
            Err(IdentifierError::TooLong { .. })
        ));
    }

    #[test]
    fn test_display() {
        let id = UnitIdentifier::classify("C02XK1ZXJGH5").unwrap();
        assert_eq!(id.to_string(), "C02XK1ZXJGH5");
    }
}
