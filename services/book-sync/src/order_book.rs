//! In-memory order book state
//!
//! Each side maps a price to its resting size. Keys are the textual normal
//! form of the price literal (see [`Price::canonical_key`]), so `"50000"`
//! and `"50000.00"` address the same level without ever parsing the price
//! into a number. The stored level keeps the most recent literal.
//!
//! Storage is a `HashMap`; nothing here depends on iteration order. Sorted
//! views are produced by the digest module with the decimal comparator.
//!
//! A zero size removes the level. Zero-size entries are never stored.

use std::collections::HashMap;

use types::numeric::Price;
use types::side::Side;

use crate::events::Level;

/// One side (bids or asks) of the book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSide {
    levels: HashMap<String, Level>,
}

impl BookSide {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, overwrite, or (for a zero size) remove a level.
    pub fn apply(&mut self, level: &Level) {
        let key = level.price.canonical_key();
        if level.size.is_zero() {
            self.levels.remove(&key);
        } else {
            self.levels.insert(key, level.clone());
        }
    }

    /// Replace the whole side. Zero-size entries are dropped on load.
    pub fn load(&mut self, levels: &[Level]) {
        self.levels.clear();
        for level in levels {
            self.apply(level);
        }
    }

    /// Resting level at `price`, matched numerically.
    pub fn get(&self, price: &Price) -> Option<&Level> {
        self.levels.get(&price.canonical_key())
    }

    /// Levels in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.values()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn max_price(&self) -> Option<&Level> {
        self.levels.values().max_by(|a, b| a.price.cmp(&b.price))
    }

    fn min_price(&self) -> Option<&Level> {
        self.levels.values().min_by(|a, b| a.price.cmp(&b.price))
    }
}

/// Both sides of a limit order book for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookState {
    bids: BookSide,
    asks: BookSide,
}

impl BookState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from snapshot levels.
    pub fn from_levels(bids: &[Level], asks: &[Level]) -> Self {
        let mut book = Self::new();
        book.snapshot(bids, asks);
        book
    }

    /// Apply a single `(price, size)` change to one side.
    pub fn apply(&mut self, side: Side, level: &Level) {
        self.side_mut(side).apply(level);
    }

    /// Apply an incremental update: bids first, then asks, each in order.
    pub fn apply_levels(&mut self, bids: &[Level], asks: &[Level]) {
        for level in bids {
            self.bids.apply(level);
        }
        for level in asks {
            self.asks.apply(level);
        }
    }

    /// Clear both sides and bulk-load the given entries.
    pub fn snapshot(&mut self, bids: &[Level], asks: &[Level]) {
        self.bids.load(bids);
        self.asks.load(asks);
    }

    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Highest resting bid.
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.max_price()
    }

    /// Lowest resting ask.
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.min_price()
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(price: &str, size: &str) -> Level {
        Level::new(price, size).unwrap()
    }

    fn price(s: &str) -> Price {
        Price::new(s).unwrap()
    }

    #[test]
    fn test_apply_insert_and_overwrite() {
        let mut side = BookSide::new();
        side.apply(&lvl("50000", "1.0"));
        side.apply(&lvl("50000", "2.5"));

        assert_eq!(side.len(), 1);
        assert_eq!(side.get(&price("50000")).unwrap().size.as_str(), "2.5");
    }

    #[test]
    fn test_zero_size_removes_level() {
        let mut side = BookSide::new();
        side.apply(&lvl("49000", "1.0"));
        side.apply(&lvl("49000", "0"));

        assert!(side.is_empty());
        assert!(side.get(&price("49000")).is_none());
    }

    #[test]
    fn test_zero_size_for_absent_price_is_noop() {
        let mut side = BookSide::new();
        side.apply(&lvl("49000", "1.0"));
        let before = side.clone();
        side.apply(&lvl("48000", "0.000"));
        assert_eq!(side, before);
    }

    #[test]
    fn test_numerically_equal_literals_share_a_level() {
        let mut side = BookSide::new();
        side.apply(&lvl("50000", "1.0"));
        side.apply(&lvl("50000.00", "3"));

        assert_eq!(side.len(), 1);
        let level = side.get(&price("50000.0")).unwrap();
        assert_eq!(level.price.as_str(), "50000.00");
        assert_eq!(level.size.as_str(), "3");

        side.apply(&lvl("50000.000", "0"));
        assert!(side.is_empty());
    }

    #[test]
    fn test_snapshot_replaces_and_drops_zero_entries() {
        let mut book = BookState::new();
        book.apply(Side::Bid, &lvl("1", "1"));
        book.apply(Side::Ask, &lvl("2", "1"));

        book.snapshot(
            &[lvl("49000", "1.0"), lvl("48900", "0")],
            &[lvl("50000", "1.0")],
        );

        assert_eq!(book.bid_depth(), 1);
        assert_eq!(book.ask_depth(), 1);
        assert!(book.bids().get(&price("1")).is_none());
        assert!(book.bids().get(&price("48900")).is_none());
    }

    #[test]
    fn test_apply_levels_updates_both_sides() {
        let mut book = BookState::from_levels(&[lvl("49000", "1.0")], &[lvl("50000", "1.0")]);
        book.apply_levels(&[lvl("49000", "0")], &[lvl("50100", "0.5")]);

        assert_eq!(book.bid_depth(), 0);
        assert_eq!(book.ask_depth(), 2);
    }

    #[test]
    fn test_best_prices_use_numeric_order() {
        let book = BookState::from_levels(
            &[lvl("9", "1"), lvl("10", "1"), lvl("9.5", "1")],
            &[lvl("11", "1"), lvl("100", "1"), lvl("11.05", "1")],
        );

        assert_eq!(book.best_bid().unwrap().price.as_str(), "10");
        assert_eq!(book.best_ask().unwrap().price.as_str(), "11");
    }

    #[test]
    fn test_empty_book() {
        let book = BookState::new();
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.side(Side::Ask).is_empty());
    }
}
