//! Per-ad, per-country admission velocity caps.
//!
//! Counters live inside a `PacingState` snapshot published through an atomic
//! pointer swap. A background task replaces the snapshot with a brand-new,
//! empty one on a fixed period, which both resets the velocity window and
//! keeps counter growth bounded. A batch captures one snapshot up front and
//! uses it for every decision *and* every `add`, so a rotation landing
//! mid-batch can neither flip decisions already made nor split the batch's
//! counts across two windows. Old snapshots are kept alive by the requests
//! still holding them and dropped once the last reference goes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default window length between snapshot rotations.
pub const PACING_ROTATION_PERIOD: Duration = Duration::from_secs(15 * 60);

/// One pacing window: admission counts per (ad, country), concurrently
/// incremented by in-flight requests. Immutable in structure once published;
/// only the counters move.
#[derive(Debug, Default)]
pub struct PacingState {
  counters: DashMap<String, AtomicI64>,
}

impl PacingState {
  pub fn new() -> Self {
    Self::default()
  }

  fn counter_key(ad_id: u64, country: &str) -> String {
    format!("{ad_id}:{country}")
  }

  /// Whether the ad has already hit its velocity cap in this window.
  /// A negative `rate_limit` means unlimited.
  pub fn over_cap(&self, ad_id: u64, country: &str, rate_limit: i64) -> bool {
    if rate_limit < 0 {
      return false;
    }
    let observed = self
      .counters
      .get(&Self::counter_key(ad_id, country))
      .map(|c| c.load(Ordering::Relaxed))
      .unwrap_or(0);
    observed >= rate_limit
  }

  /// Records `n` successful admissions into *this* snapshot, which is the
  /// one the batch captured even if a newer one has been published since.
  pub fn add(&self, ad_id: u64, country: &str, n: i64) {
    self
      .counters
      .entry(Self::counter_key(ad_id, country))
      .or_default()
      .fetch_add(n, Ordering::Relaxed);
  }
}

/// Publishes and rotates the active `PacingState`.
#[derive(Debug)]
pub struct PacingGuard {
  current: ArcSwap<PacingState>,
}

impl Default for PacingGuard {
  fn default() -> Self {
    Self::new()
  }
}

impl PacingGuard {
  pub fn new() -> Self {
    Self {
      current: ArcSwap::from_pointee(PacingState::new()),
    }
  }

  /// The currently-published snapshot. Callers hold it for a whole batch.
  pub fn snapshot(&self) -> Arc<PacingState> {
    self.current.load_full()
  }

  /// Publishes a brand-new, empty window immediately.
  pub fn rotate_now(&self) {
    self.current.store(Arc::new(PacingState::new()));
  }

  /// Spawns the periodic rotation task. The first rotation happens one full
  /// period after startup.
  pub fn start_rotation(
    self: &Arc<Self>,
    period: Duration,
    shutdown: CancellationToken,
  ) -> JoinHandle<()> {
    let guard = Arc::clone(self);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      ticker.tick().await; // interval fires immediately; swallow the first tick
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          _ = ticker.tick() => {
            guard.rotate_now();
            debug!("pacing window rotated");
          }
        }
      }
    })
  }
}
