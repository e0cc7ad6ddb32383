//! Decimal string types for prices and sizes
//!
//! Prices and sizes travel as the exact text the exchange sent. Ordering is
//! decided digit by digit on that text. Nothing in this module converts a
//! literal to a binary float or a fixed-width integer, so arbitrarily long
//! literals keep every distinguishing digit.
//!
//! Accepted grammar: `-?(0|[1-9][0-9]*)(\.[0-9]+)?`. Sizes must not carry a
//! sign.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter;

use serde::{Deserialize, Serialize};

use crate::errors::DecimalError;

/// Compare two validated decimal literals numerically.
///
/// Forms a total order. Literals that differ only by trailing fractional
/// zeros compare equal (`"50000.00"` == `"50000"`), and negative zero
/// compares equal to zero.
pub fn compare_decimal(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (a_negative, a_abs) = split_sign(a);
    let (b_negative, b_abs) = split_sign(b);

    match (a_negative, b_negative) {
        (false, false) => compare_magnitude(a_abs, b_abs),
        (true, true) => compare_magnitude(b_abs, a_abs),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    }
}

/// Whether a validated literal denotes zero (`"0"`, `"0.000"`, `"-0"`).
pub fn is_zero_literal(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0' | b'.' | b'-'))
}

/// Textual normal form of a validated literal.
///
/// Trailing fractional zeros and a bare point are dropped and negative zero
/// folds to `"0"`. Two literals share a normal form exactly when
/// [`compare_decimal`] reports them equal.
pub fn canonical_form(s: &str) -> String {
    let (negative, abs) = split_sign(s);
    let trimmed = match abs.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                int.to_string()
            } else {
                format!("{int}.{frac}")
            }
        }
        None => abs.to_string(),
    };

    if negative {
        format!("-{trimmed}")
    } else {
        trimmed
    }
}

/// Check a literal against the decimal grammar.
pub fn validate_decimal(s: &str) -> Result<(), DecimalError> {
    if s.is_empty() {
        return Err(DecimalError::Empty);
    }

    let abs = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match abs.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (abs, None),
    };

    let digits = int.chars().chain(frac.unwrap_or("").chars());
    for c in digits {
        if !c.is_ascii_digit() {
            return Err(DecimalError::InvalidCharacter {
                literal: s.to_string(),
                character: c,
            });
        }
    }

    if int.is_empty() {
        return Err(DecimalError::MissingIntegerPart(s.to_string()));
    }
    if int.len() > 1 && int.starts_with('0') {
        return Err(DecimalError::LeadingZero(s.to_string()));
    }
    if frac == Some("") {
        return Err(DecimalError::EmptyFraction(s.to_string()));
    }

    Ok(())
}

/// Returns `(is_negative, magnitude)`. Negative zero reports as non-negative.
fn split_sign(s: &str) -> (bool, &str) {
    match s.strip_prefix('-') {
        Some(abs) if !is_zero_literal(abs) => (true, abs),
        Some(abs) => (false, abs),
        None => (false, s),
    }
}

fn compare_magnitude(a: &str, b: &str) -> Ordering {
    let (a_int, a_frac) = a.split_once('.').unwrap_or((a, ""));
    let (b_int, b_frac) = b.split_once('.').unwrap_or((b, ""));

    // No leading zeros, so a longer integer part is a larger number.
    a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(b_int))
        .then_with(|| compare_fraction(a_frac, b_frac))
}

/// Lexicographic comparison with the shorter side right-padded with zeros.
fn compare_fraction(a: &str, b: &str) -> Ordering {
    let width = a.len().max(b.len());
    let a_digits = a.bytes().chain(iter::repeat(b'0')).take(width);
    let b_digits = b.bytes().chain(iter::repeat(b'0')).take(width);
    a_digits.cmp(b_digits)
}

/// A validated price literal.
///
/// Equality, hashing and ordering are numeric: `Price("50000.00")` equals
/// `Price("50000")`. The original literal is kept for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Price(String);

impl Price {
    pub fn new(literal: impl Into<String>) -> Result<Self, DecimalError> {
        let s = literal.into();
        validate_decimal(&s)?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normal form shared by every literal equal to this price.
    pub fn canonical_key(&self) -> String {
        canonical_form(&self.0)
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        compare_decimal(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Price {}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_decimal(&self.0, &other.0)
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for Price {
    type Error = DecimalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Price {
    type Error = DecimalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Price> for String {
    fn from(p: Price) -> Self {
        p.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, non-negative size literal.
///
/// Equality is textual; the literal is reproduced verbatim in views and
/// digests. A zero size marks a level for removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Size(String);

impl Size {
    pub fn new(literal: impl Into<String>) -> Result<Self, DecimalError> {
        let s = literal.into();
        validate_decimal(&s)?;
        if s.starts_with('-') {
            return Err(DecimalError::NegativeSize(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        is_zero_literal(&self.0)
    }
}

impl TryFrom<String> for Size {
    type Error = DecimalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Size {
    type Error = DecimalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Size> for String {
    fn from(s: Size) -> Self {
        s.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
