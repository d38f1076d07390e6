// tests/frequency.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use adserve::{
  AdError, CounterNamespace, CounterStore, FrequencyCounters, FrequencyGuard, MemoryCounterStore,
};

mod common;

/// A store that is always down, for exercising the fail-open path.
struct BrokenStore;

#[async_trait]
impl CounterStore for BrokenStore {
  async fn incr_by(
    &self,
    _bucket: &str,
    _key: &str,
    _field: &str,
    _delta: i64,
    _ttl: Duration,
  ) -> Result<(), AdError> {
    Err(AdError::StoreUnavailable("connection refused".into()))
  }

  async fn get_all(&self, _bucket: &str, _key: &str) -> Result<HashMap<String, i64>, AdError> {
    // Transport errors from a networked store come through the io conversion.
    Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
  }
}

#[test]
fn cap_boundary_at_limit_one() {
  let counters = FrequencyCounters::from_counts(HashMap::from([("com.app".to_string(), 1)]));
  let decision = counters.in_cap("com.app", 1, false);
  assert!(!decision.allowed);
  assert!(!decision.is_first);

  let empty = FrequencyCounters::from_counts(HashMap::new());
  let decision = empty.in_cap("com.app", 1, false);
  assert!(decision.allowed);
  assert!(decision.is_first);
}

#[test]
fn unobserved_dimension_is_allowed_regardless_of_limit() {
  let empty = FrequencyCounters::from_counts(HashMap::new());
  let decision = empty.in_cap("com.never.seen", 0, false);
  assert!(decision.allowed);
  assert!(decision.is_first);

  // Once observed, a non-positive limit denies as usual.
  let seen = FrequencyCounters::from_counts(HashMap::from([("com.never.seen".to_string(), 1)]));
  assert!(!seen.in_cap("com.never.seen", 0, false).allowed);
}

#[test]
fn exempt_caller_is_always_allowed() {
  let counters = FrequencyCounters::from_counts(HashMap::from([("com.app".to_string(), 99)]));
  assert!(counters.in_cap("com.app", 1, true).allowed);
}

#[test]
fn user_cap_sums_all_dimensions() {
  let counters = FrequencyCounters::from_counts(HashMap::from([
    ("com.a".to_string(), 2),
    ("com.b".to_string(), 3),
  ]));
  assert!(counters.user_cap(6));
  assert!(!counters.user_cap(5));
}

#[test]
fn video_cap_sentinels() {
  let counters = FrequencyCounters::from_counts(HashMap::from([("com.app".to_string(), 1_000)]));
  assert!(counters.video_cap("com.app", -1)); // unlimited
  assert!(!counters.video_cap("com.app", 0)); // always denied
  assert!(!counters.video_cap("com.app", 3));
  assert!(counters.video_cap("other", 3));
}

#[tokio::test]
async fn store_failure_fails_open() {
  let guard = FrequencyGuard::new(Arc::new(BrokenStore));
  let counters = guard.fetch(CounterNamespace::Exposure, "device-1", "banner").await;
  assert!(counters.is_degraded());
  assert!(counters.in_cap("com.app", 1, false).allowed);
  assert!(counters.user_cap(1));
}

#[tokio::test]
async fn commit_is_visible_on_next_fetch() {
  let store = Arc::new(MemoryCounterStore::new());
  let guard = FrequencyGuard::new(store.clone());

  guard.commit(CounterNamespace::Exposure, "device-1", "banner", "com.app".into());
  // The write-back is spawned; give it a beat to land.
  tokio::time::sleep(Duration::from_millis(20)).await;

  let counters = guard.fetch(CounterNamespace::Exposure, "device-1", "banner").await;
  assert_eq!(counters.count("com.app"), 1);
  assert!(!counters.in_cap("com.app", 1, false).allowed);

  // A different namespace is unaffected.
  let preclick = guard.fetch(CounterNamespace::Preclick, "device-1", "banner").await;
  assert_eq!(preclick.count("com.app"), 0);
}

#[tokio::test]
async fn memory_store_expires_counters() {
  let store = MemoryCounterStore::new();
  store
    .incr_by("u1", "freq_device-1_banner", "com.app", 2, Duration::from_millis(30))
    .await
    .unwrap();
  let before = store.get_all("u1", "freq_device-1_banner").await.unwrap();
  assert_eq!(before.get("com.app"), Some(&2));

  tokio::time::sleep(Duration::from_millis(60)).await;
  let after = store.get_all("u1", "freq_device-1_banner").await.unwrap();
  assert!(after.is_empty());
}
