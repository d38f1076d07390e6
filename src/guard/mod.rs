// Admission control: per-user exposure frequency caps backed by an external
// counter store, and per-ad pacing velocity caps held in atomically-published
// in-process snapshots.

pub mod frequency;
pub mod pacing;
pub mod store;

pub use frequency::{CapDecision, FrequencyCounters, FrequencyGuard};
pub use pacing::{PacingGuard, PacingState, PACING_ROTATION_PERIOD};
pub use store::{user_bucket, CounterNamespace, CounterStore, MemoryCounterStore};
