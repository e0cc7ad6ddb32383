//! Error types for decimal string validation
//!
//! Malformed literals are rejected at the loading boundary; nothing past it
//! ever sees an unvalidated price or size.

use thiserror::Error;

/// Reasons a price or size literal is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("Empty decimal literal")]
    Empty,

    #[error("Invalid character {character:?} in decimal literal {literal:?}")]
    InvalidCharacter { literal: String, character: char },

    #[error("Missing integer part in decimal literal {0:?}")]
    MissingIntegerPart(String),

    #[error("Empty fractional part in decimal literal {0:?}")]
    EmptyFraction(String),

    #[error("Leading zero in decimal literal {0:?}")]
    LeadingZero(String),

    #[error("Negative size {0:?}")]
    NegativeSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_character_display() {
        let err = DecimalError::InvalidCharacter {
            literal: "1e5".to_string(),
            character: 'e',
        };
        assert!(err.to_string().contains("'e'"));
        assert!(err.to_string().contains("1e5"));
    }
}
