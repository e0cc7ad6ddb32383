//! Book side tag

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a limit order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Resting buy interest, best = highest price
    Bid,
    /// Resting sell interest, best = lowest price
    Ask,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Bid => "bids",
            Side::Ask => "asks",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
