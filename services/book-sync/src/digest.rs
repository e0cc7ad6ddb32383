//! Canonical views and SHA-256 digest of a book
//!
//! Bids are sorted descending and asks ascending with the decimal
//! comparator; storage order never leaks into the output. The digest is the
//! SHA-256 of the compact JSON body `{"asks":[[p,s],...],"bids":[[p,s],...]}`
//! with the two fields in exactly that order, rendered as lowercase hex.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::side::Side;

use crate::events::Level;
use crate::order_book::{BookSide, BookState};

/// Sorted views of a book plus their digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBook {
    /// Bid levels, highest price first.
    pub bids: Vec<Level>,
    /// Ask levels, lowest price first.
    pub asks: Vec<Level>,
    /// 64-character lowercase hex SHA-256.
    pub digest: String,
}

/// Serialized body. Field order is part of the digest contract.
#[derive(Serialize)]
struct DigestBody<'a> {
    asks: &'a [Level],
    bids: &'a [Level],
}

/// Produce the sorted views and digest of a book.
pub fn canonicalize(book: &BookState) -> CanonicalBook {
    let bids = sorted_view(book.bids(), Side::Bid);
    let asks = sorted_view(book.asks(), Side::Ask);
    let digest = digest_views(&bids, &asks);

    CanonicalBook { bids, asks, digest }
}

/// Digest of already-sorted views.
pub fn digest_views(bids: &[Level], asks: &[Level]) -> String {
    let body = canonical_body(bids, asks);
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// The exact text that gets hashed.
pub fn canonical_body(bids: &[Level], asks: &[Level]) -> String {
    // Level serializes as a pair of strings; this cannot fail.
    serde_json::to_string(&DigestBody { asks, bids }).unwrap_or_default()
}

/// Recompute the digest of `book` and compare it with `expected`.
pub fn verify_digest(book: &BookState, expected: &str) -> bool {
    canonicalize(book).digest == expected.to_ascii_lowercase()
}

/// Short prefix of a digest for diagnostics.
pub fn digest_prefix(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

fn sorted_view(side: &BookSide, which: Side) -> Vec<Level> {
    let mut levels: Vec<Level> = side
        .iter()
        .filter(|level| !level.size.is_zero())
        .cloned()
        .collect();

    match which {
        Side::Bid => levels.sort_by(|a, b| b.price.cmp(&a.price)),
        Side::Ask => levels.sort_by(|a, b| a.price.cmp(&b.price)),
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(price: &str, size: &str) -> Level {
        Level::new(price, size).unwrap()
    }

    fn sample_book() -> BookState {
        BookState::from_levels(
            &[lvl("49000", "1.0"), lvl("48999.5", "2"), lvl("9", "4")],
            &[lvl("50000", "1.0"), lvl("100000", "0.1"), lvl("50000.25", "3")],
        )
    }

    #[test]
    fn test_views_are_sorted_numerically() {
        let canonical = canonicalize(&sample_book());

        let bids: Vec<&str> = canonical.bids.iter().map(|l| l.price.as_str()).collect();
        let asks: Vec<&str> = canonical.asks.iter().map(|l| l.price.as_str()).collect();
        assert_eq!(bids, vec!["49000", "48999.5", "9"]);
        assert_eq!(asks, vec!["50000", "50000.25", "100000"]);
    }

    #[test]
    fn test_body_shape_asks_before_bids() {
        let body = canonical_body(&[lvl("49000", "1.0")], &[lvl("50000", "1.0")]);
        assert_eq!(body, r#"{"asks":[["50000","1.0"]],"bids":[["49000","1.0"]]}"#);
    }

    #[test]
    fn test_empty_book_digest() {
        let canonical = canonicalize(&BookState::new());
        assert!(canonical.bids.is_empty());
        assert!(canonical.asks.is_empty());
        assert_eq!(
            canonical.digest,
            hex::encode(Sha256::digest(br#"{"asks":[],"bids":[]}"#))
        );
    }

    #[test]
    fn test_digest_is_lowercase_hex() {
        let digest = canonicalize(&sample_book()).digest;
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_deterministic_digest() {
        let book = sample_book();
        let d1 = canonicalize(&book);
        let d2 = canonicalize(&book);
        assert_eq!(d1, d2);
    }

    #[test]
    fn test_digest_independent_of_insertion_order() {
        let mut forward = BookState::new();
        let mut backward = BookState::new();
        let levels = [lvl("1", "1"), lvl("2", "2"), lvl("3", "3"), lvl("4", "4")];

        for level in &levels {
            forward.apply(Side::Ask, level);
        }
        for level in levels.iter().rev() {
            backward.apply(Side::Ask, level);
        }

        assert_eq!(canonicalize(&forward).digest, canonicalize(&backward).digest);
    }

    #[test]
    fn test_digest_sensitive_to_size_change() {
        let book = sample_book();
        let before = canonicalize(&book).digest;

        let mut changed = book.clone();
        changed.apply(Side::Bid, &lvl("48999.5", "2.1"));
        assert_ne!(canonicalize(&changed).digest, before);
    }

    #[test]
    fn test_digest_sensitive_to_side() {
        let a = BookState::from_levels(&[lvl("1", "1")], &[]);
        let b = BookState::from_levels(&[], &[lvl("1", "1")]);
        assert_ne!(canonicalize(&a).digest, canonicalize(&b).digest);
    }

    #[test]
    fn test_zero_entry_round_trip_leaves_digest_unchanged() {
        let book = sample_book();
        let before = canonicalize(&book).digest;

        let mut touched = book.clone();
        touched.apply(Side::Ask, &lvl("60000", "5"));
        touched.apply(Side::Ask, &lvl("60000", "0"));
        touched.apply(Side::Bid, &lvl("1", "0"));

        assert_eq!(canonicalize(&touched).digest, before);
    }

    #[test]
    fn test_verify_digest() {
        let book = sample_book();
        let digest = canonicalize(&book).digest;
        assert!(verify_digest(&book, &digest));
        assert!(verify_digest(&book, &digest.to_uppercase()));
        assert!(!verify_digest(&book, "deadbeef"));
    }

    #[test]
    fn test_digest_prefix() {
        assert_eq!(digest_prefix("0123456789abcdef"), "0123456789ab");
        assert_eq!(digest_prefix("abc"), "abc");
    }
}
