//! Types library for the order-book reconstruction engine
//!
//! Core value types shared by every alignment component: validated decimal
//! literals and their comparator, sequence and session identifiers, and the
//! book side tag.
//!
//! # Modules
//! - `numeric`: Decimal string types (Price, Size) and the total-order comparator
//! - `ids`: Identifiers (SeqId, SessionId, InstrumentId)
//! - `side`: Book side tag (Bid, Ask)
//! - `errors`: Decimal validation errors

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod side;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::side::*;
}
