// Per-candidate orchestration: admission, creative matching, template
// rendering, channel URL building and commit.

pub mod assembler;
pub mod channel;
pub mod types;

pub use assembler::Assembler;
pub use channel::{ChannelRegistry, ChannelStrategy, PassthroughStrategy};
pub use types::{AdCandidate, AdFormat, AdRequest, AssembledAd, BatchResult, CandidateIndex, DropReason};
