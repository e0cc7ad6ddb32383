//! Book Sync Service
//!
//! Reconstructs a level-2 order book from a REST snapshot plus a buffer of
//! sequenced incremental updates, and certifies the result:
//! - Drops duplicate deliveries by sequence id
//! - Repairs bounded out-of-order arrival with a fixed reorder window
//! - Bridges the buffer onto the snapshot and enforces the sequence chain
//! - Hashes the resulting book into a reproducible SHA-256 digest
//! - Optionally verifies the run against an expected-stats lock
//!
//! Any gap, malformed input or lock mismatch terminates the session; no
//! partial book is ever published.
//!
//! # Architecture
//!
//! ```text
//!   snapshot.json        buffer.jsonl
//!        │                    │
//!        │               ┌────▼────┐
//!        │               │ Dedup   │  ← drops repeated seqIds
//!        │               └────┬────┘
//!        │               ┌────▼────┐
//!        │               │ Reorder │  ← sorts bounded windows
//!        │               └────┬────┘
//!   ┌────▼────────────────────▼──┐
//!   │        Alignment           │  DISCARD → ALIGN_FIRST_EVENT → STRICT
//!   └────────────┬───────────────┘
//!           ┌────▼────┐
//!           │ Digest  │  ← canonical JSON, SHA-256
//!           └────┬────┘
//!           ┌────▼────┐
//!           │  Lock   │  ← optional verify-or-fail
//!           └─────────┘
//! ```

pub mod alignment;
pub mod batch;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod events;
pub mod loader;
pub mod lock;
pub mod order_book;
pub mod reorder;
pub mod session;

pub use error::SyncError;
pub use session::{run_session, AlignmentSession, RunStats, SessionReport};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
