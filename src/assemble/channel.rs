use std::collections::HashMap;
use std::sync::Arc;

use crate::assemble::types::{AdCandidate, AdRequest};

/// A partner-specific URL builder: pure transforms from candidate and
/// request attributes to click/impression URLs. One implementation per ad
/// network, registered under its channel code at startup.
pub trait ChannelStrategy: Send + Sync {
  fn click_url(&self, candidate: &AdCandidate, request: &AdRequest) -> String;

  fn impression_trackers(&self, _candidate: &AdCandidate, _request: &AdRequest) -> Vec<String> {
    Vec::new()
  }

  fn click_trackers(&self, _candidate: &AdCandidate, _request: &AdRequest) -> Vec<String> {
    Vec::new()
  }
}

/// Direct-buy strategy: the candidate's landing URL, untransformed.
#[derive(Debug, Default)]
pub struct PassthroughStrategy;

impl ChannelStrategy for PassthroughStrategy {
  fn click_url(&self, candidate: &AdCandidate, _request: &AdRequest) -> String {
    candidate.landing_url.clone()
  }
}

/// Strategy lookup by channel code. Populated once at startup and read-only
/// afterwards; a lookup miss is a hard per-candidate failure, not a retry.
#[derive(Default)]
pub struct ChannelRegistry {
  strategies: HashMap<String, Arc<dyn ChannelStrategy>>,
}

impl std::fmt::Debug for ChannelRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChannelRegistry")
      .field("channels", &self.strategies.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl ChannelRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, code: impl Into<String>, strategy: Arc<dyn ChannelStrategy>) {
    self.strategies.insert(code.into(), strategy);
  }

  pub fn get(&self, code: &str) -> Option<Arc<dyn ChannelStrategy>> {
    self.strategies.get(code).cloned()
  }

  pub fn len(&self) -> usize {
    self.strategies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strategies.is_empty()
  }
}
