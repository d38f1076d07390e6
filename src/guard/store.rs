use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AdError;

/// Number of user-id hash buckets. The bucket is part of the external store
/// key, so the hash must be deterministic across processes and restarts.
const USER_BUCKETS: u64 = 1_000;

/// Maps a user id to its stable counter-store bucket.
pub fn user_bucket(user_id: &str) -> String {
  // Fixed seeds: bucket assignment must never change between deployments.
  let state = ahash::RandomState::with_seeds(0x5ad5, 0x3c6e_f372, 0x9e37_79b9, 0x7f4a_7c15);
  format!("u{}", state.hash_one(user_id.as_bytes()) % USER_BUCKETS)
}

/// The counter dimensions the guard tracks, each with its own external
/// namespace so limits apply independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterNamespace {
  /// Regular exposure frequency (`freq_<user>_<adtype>`).
  Exposure,
  /// Silent/background admissions (`pfreq_<user>`).
  Preclick,
  /// Completed video views (`vfreq_<user>_<adtype>`).
  VideoComplete,
  /// Video ad requests (`vreq_<user>_<adtype>`).
  VideoRequest,
}

impl CounterNamespace {
  pub fn key(&self, user_id: &str, ad_type: &str) -> String {
    match self {
      CounterNamespace::Exposure => format!("freq_{user_id}_{ad_type}"),
      CounterNamespace::Preclick => format!("pfreq_{user_id}"),
      CounterNamespace::VideoComplete => format!("vfreq_{user_id}_{ad_type}"),
      CounterNamespace::VideoRequest => format!("vreq_{user_id}_{ad_type}"),
    }
  }
}

/// External key-value counter service: atomic per-field increments with
/// per-key expiry, and a full read of one key's fields.
///
/// The production implementation wraps the shared cache cluster and lives
/// with the embedding service; this crate only depends on the contract.
#[async_trait]
pub trait CounterStore: Send + Sync {
  async fn incr_by(
    &self,
    bucket: &str,
    key: &str,
    field: &str,
    delta: i64,
    ttl: Duration,
  ) -> Result<(), AdError>;

  async fn get_all(&self, bucket: &str, key: &str) -> Result<HashMap<String, i64>, AdError>;
}

#[derive(Debug, Clone)]
struct Slot {
  count: i64,
  expires_at: Instant,
}

/// In-process `CounterStore` with real TTL behavior. Used by tests and local
/// runs; not shared across processes.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
  keys: DashMap<String, HashMap<String, Slot>>,
}

impl MemoryCounterStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn storage_key(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
  }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
  async fn incr_by(
    &self,
    bucket: &str,
    key: &str,
    field: &str,
    delta: i64,
    ttl: Duration,
  ) -> Result<(), AdError> {
    let now = Instant::now();
    let mut fields = self.keys.entry(Self::storage_key(bucket, key)).or_default();
    let slot = fields.entry(field.to_string()).or_insert(Slot {
      count: 0,
      expires_at: now + ttl,
    });
    if slot.expires_at <= now {
      slot.count = 0;
      slot.expires_at = now + ttl;
    }
    slot.count += delta;
    Ok(())
  }

  async fn get_all(&self, bucket: &str, key: &str) -> Result<HashMap<String, i64>, AdError> {
    let now = Instant::now();
    let counts = self
      .keys
      .get(&Self::storage_key(bucket, key))
      .map(|fields| {
        fields
          .iter()
          .filter(|(_, slot)| slot.expires_at > now)
          .map(|(field, slot)| (field.clone(), slot.count))
          .collect()
      })
      .unwrap_or_default();
    Ok(counts)
  }
}
