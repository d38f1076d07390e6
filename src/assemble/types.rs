use serde::Serialize;

use crate::creative::{CreativePool, MatchPolicy};
use crate::template::MacroBindings;

/// Outbound ad format. All formats run the same assembly pipeline with
/// different template/macro sets and mandatory creative slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdFormat {
  Banner,
  Native,
  Interstitial,
  Video,
}

/// The per-request attributes the assembler needs: identity, placement,
/// requested creative size and matching policy.
#[derive(Debug, Clone)]
pub struct AdRequest {
  pub slot_id: String,
  pub user_id: String,
  pub language: String,
  pub country: String,
  pub width: u32,
  pub height: u32,
  pub policy: MatchPolicy,
  /// Counter-namespace dimension (e.g. "banner", "native").
  pub ad_type: String,
  /// Selects the overseas CDN mirror when resolving creative URLs.
  pub overseas: bool,
  /// Exempt contexts (reward wall) skip exposure caps entirely.
  pub freq_exempt: bool,
}

/// A targeting-eligible ad produced by the external boolean index, not yet
/// matched to a creative or rendered. Carries everything assembly needs so
/// the pipeline never reaches back into config stores.
#[derive(Debug, Clone)]
pub struct AdCandidate {
  pub id: u64,
  /// Channel code looked up in the strategy registry.
  pub channel: String,
  /// Capped dimension for per-user exposure counting.
  pub package_name: String,
  pub landing_type: u32,
  pub landing_url: String,
  pub format: AdFormat,
  /// Per-dimension exposure limit for this ad.
  pub freq_limit: i64,
  /// User-level limit over the sum of all dimensions; `0` disables.
  pub user_freq_limit: i64,
  /// Per-window pacing rate; negative means unlimited.
  pub pacing_rate: i64,
  pub template_b64: String,
  pub bindings: MacroBindings,
  pub creatives: CreativePool,
}

/// The external boolean retrieval index that turns targeting attributes
/// into a candidate set. Only the contract lives here; the index and its
/// data structures are an external collaborator.
///
/// `conditions` are ordered equality constraints; the predicate runs
/// in-process per candidate and carries the pre-filtering that is cheaper
/// to check before full assembly (creative availability, cap lookups
/// already in hand).
pub trait CandidateIndex: Send + Sync {
  fn search(&self, conditions: &[(String, String)], predicate: &dyn Fn(&AdCandidate) -> bool) -> Vec<u64>;
}

/// Why a candidate never reached ASSEMBLED. The first two are expected,
/// high-frequency outcomes; the rest indicate data or configuration faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
  FrequencyCapped,
  PacingCapped,
  NoCreative,
  UnknownChannel,
  Cancelled,
}

/// Fully assembled outbound ad object.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledAd {
  pub id: u64,
  pub impression_id: String,
  pub landing_type: u32,
  pub click_url: String,
  pub impression_tracking_urls: Vec<String>,
  pub click_tracking_urls: Vec<String>,
  /// Rendered creative markup, base64-encoded for transport.
  pub creative_html_b64: String,
  /// Ids of every creative the renderer chose, in substitution order.
  pub creative_ids: Vec<u64>,
}

/// Outcome of one batch. Dropped candidates carry their rejection reason for
/// debug tooling; a zero-size `ads` is a valid "no ads" result, not an error.
#[derive(Debug, Default)]
pub struct BatchResult {
  pub ads: Vec<AssembledAd>,
  pub dropped: Vec<(u64, DropReason)>,
}
