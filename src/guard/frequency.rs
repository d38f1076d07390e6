use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::guard::store::{user_bucket, CounterNamespace, CounterStore};

/// Default deadline for a counter-store read before the guard fails open.
pub const STORE_TIMEOUT: Duration = Duration::from_millis(200);
/// Default rolling period for exposure counters.
pub const COUNTER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a single cap check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapDecision {
  pub allowed: bool,
  /// Whether this dimension had never been observed for the user.
  pub is_first: bool,
}

/// A point-in-time read of one user's counters in one namespace.
///
/// Fetched once per request; every admission check within the request reuses
/// this snapshot. Mutation happens only through the guard's commit path
/// after an ad is finally chosen.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCounters {
  counts: HashMap<String, i64>,
  degraded: bool,
}

impl FrequencyCounters {
  pub fn from_counts(counts: HashMap<String, i64>) -> Self {
    Self {
      counts,
      degraded: false,
    }
  }

  /// Snapshot standing in for an unreachable store. Every cap check passes:
  /// availability is prioritized over strict cap accuracy.
  pub fn degraded() -> Self {
    Self {
      counts: HashMap::new(),
      degraded: true,
    }
  }

  pub fn is_degraded(&self) -> bool {
    self.degraded
  }

  pub fn count(&self, field: &str) -> i64 {
    self.counts.get(field).copied().unwrap_or(0)
  }

  /// Per-dimension exposure cap. `exempt` callers (e.g. a reward-wall
  /// context) are always allowed.
  pub fn in_cap(&self, field: &str, limit: i64, exempt: bool) -> CapDecision {
    let is_first = self.count(field) == 0;
    if exempt || self.degraded {
      return CapDecision {
        allowed: true,
        is_first,
      };
    }
    // A never-observed dimension is always admitted, even at a zero or
    // negative limit; the count comparison only applies once it has history.
    CapDecision {
      allowed: is_first || self.count(field) < limit,
      is_first,
    }
  }

  /// User-level cap over the sum of every counted dimension.
  pub fn user_cap(&self, limit: i64) -> bool {
    self.degraded || self.counts.values().sum::<i64>() < limit
  }

  /// Video-completion style cap: `-1` is unlimited, `0` always denies,
  /// otherwise an observed-count comparison.
  pub fn video_cap(&self, field: &str, limit: i64) -> bool {
    match limit {
      -1 => true,
      0 => false,
      _ => self.degraded || self.count(field) < limit,
    }
  }
}

/// Read/commit front-end over the external counter store.
///
/// Reads are bounded by a short timeout and fail open; commits are spawned
/// fire-and-forget so a slow store never blocks candidate processing.
pub struct FrequencyGuard {
  store: Arc<dyn CounterStore>,
  timeout: Duration,
  ttl: Duration,
}

impl std::fmt::Debug for FrequencyGuard {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FrequencyGuard")
      .field("store", &"<dyn CounterStore>")
      .field("timeout", &self.timeout)
      .field("ttl", &self.ttl)
      .finish()
  }
}

impl FrequencyGuard {
  pub fn new(store: Arc<dyn CounterStore>) -> Self {
    Self {
      store,
      timeout: STORE_TIMEOUT,
      ttl: COUNTER_TTL,
    }
  }

  pub fn with_timings(store: Arc<dyn CounterStore>, timeout: Duration, ttl: Duration) -> Self {
    Self { store, timeout, ttl }
  }

  /// Fetches the user's counter snapshot for one namespace. Store errors and
  /// timeouts degrade to an all-allowing snapshot, logged at warn.
  pub async fn fetch(
    &self,
    namespace: CounterNamespace,
    user_id: &str,
    ad_type: &str,
  ) -> FrequencyCounters {
    let bucket = user_bucket(user_id);
    let key = namespace.key(user_id, ad_type);
    match tokio::time::timeout(self.timeout, self.store.get_all(&bucket, &key)).await {
      Ok(Ok(counts)) => FrequencyCounters::from_counts(counts),
      Ok(Err(e)) => {
        warn!(%key, error = %e, "counter store read failed, failing open");
        FrequencyCounters::degraded()
      }
      Err(_) => {
        warn!(%key, timeout_ms = self.timeout.as_millis() as u64, "counter store read timed out, failing open");
        FrequencyCounters::degraded()
      }
    }
  }

  /// Best-effort increment after an ad reaches ASSEMBLED. Never blocks the
  /// request and never fails it.
  pub fn commit(&self, namespace: CounterNamespace, user_id: &str, ad_type: &str, field: String) {
    let store = self.store.clone();
    let bucket = user_bucket(user_id);
    let key = namespace.key(user_id, ad_type);
    let ttl = self.ttl;
    tokio::spawn(async move {
      if let Err(e) = store.incr_by(&bucket, &key, &field, 1, ttl).await {
        debug!(%key, %field, error = %e, "counter write-back dropped");
      }
    });
  }
}
