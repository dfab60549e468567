//! Report Cache: at most one generation per key, atomic publication
//!
//! # Flow
//!
//! ```text
//! get_or_refresh(key, force)
//!   ├─ !force and stored ─────────────▶ Hit
//!   └─ acquire key lock
//!        ├─ stored meanwhile ─────────▶ Coalesced
//!        └─ generate (blocking pool, timeout)
//!             ├─ Err ─────────────────▶ error, store untouched
//!             └─ Ok ──publish──────────▶ Generated
//! ```
//!
//! The key lock travels with the generator onto the blocking pool. A caller
//! that times out or is dropped returns at once, but the key stays locked
//! until the generator itself returns.

pub mod clock;
pub mod coordinator;
pub mod locks;
pub mod store;

pub use clock::next_timestamp;
pub use coordinator::{CacheConfig, CacheCoordinator, Fetched, Source, WarmSummary};
pub use locks::{KeyGuard, KeyLocks};
pub use store::{ArtifactStore, MemoryStore};
