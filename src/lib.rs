// src/lib.rs

//! adserve - the request-time core of a mobile ad-serving backend.
//!
//! Given an ad request and a pool of eligible candidates selected by an
//! external boolean index, this crate picks the best-matching creative for
//! each candidate, renders it into a slot template via macro substitution,
//! enforces per-user exposure and per-ad velocity caps, and emits fully
//! assembled ad objects with tracking URLs attached.

/// Per-candidate orchestration: admission, matching, rendering, URL building.
pub mod assemble;
/// Defines the `Context`, which owns all process-wide shared serving state.
pub mod context;
/// Creative assets, pools and the size/ratio matching logic.
pub mod creative;
/// Defines custom error types used throughout the library.
pub mod error;
/// Frequency and pacing admission guards and the counter-store abstraction.
pub mod guard;
/// Template tokenization, the process-wide token cache and macro rendering.
pub mod template;

// Re-export the core surface for user convenience, making it accessible
// directly from the crate root (e.g., `adserve::Context`, `adserve::AdError`).
pub use assemble::{
  AdCandidate, AdFormat, AdRequest, AssembledAd, Assembler, BatchResult, CandidateIndex,
  ChannelRegistry, ChannelStrategy, DropReason, PassthroughStrategy,
};
pub use context::Context;
pub use creative::{match_icon, match_image, match_video, Creative, CreativePool, MatchPolicy, RenderFallback};
pub use error::AdError;
pub use guard::{
  CapDecision, CounterNamespace, CounterStore, FrequencyCounters, FrequencyGuard,
  MemoryCounterStore, PacingGuard, PacingState,
};
pub use template::{render, MacroBindings, TemplateCache, TokenStream};
