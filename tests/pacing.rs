// tests/pacing.rs

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use adserve::PacingGuard;

mod common;

#[test]
fn snapshot_isolation_across_rotation() {
  let guard = PacingGuard::new();
  let held = guard.snapshot();
  held.add(1, "US", 2);
  assert!(held.over_cap(1, "US", 2));

  // A rotation mid-batch publishes a fresh window, but the batch keeps
  // deciding against the snapshot it captured.
  guard.rotate_now();
  assert!(held.over_cap(1, "US", 2));
  held.add(1, "US", 1); // late adds also land in the held snapshot

  let fresh = guard.snapshot();
  assert!(!Arc::ptr_eq(&held, &fresh));
  assert!(!fresh.over_cap(1, "US", 2));
}

#[test]
fn rotation_resets_counts_for_new_batches() {
  let guard = PacingGuard::new();
  guard.snapshot().add(42, "JP", 10);
  assert!(guard.snapshot().over_cap(42, "JP", 5));
  guard.rotate_now();
  assert!(!guard.snapshot().over_cap(42, "JP", 5));
}

#[tokio::test(start_paused = true)]
async fn background_rotation_publishes_new_snapshots() {
  let guard = Arc::new(PacingGuard::new());
  let shutdown = CancellationToken::new();
  let task = guard.start_rotation(Duration::from_secs(900), shutdown.clone());

  let first = guard.snapshot();
  first.add(1, "US", 1);

  tokio::time::sleep(Duration::from_secs(901)).await;
  let second = guard.snapshot();
  assert!(!Arc::ptr_eq(&first, &second));
  assert!(!second.over_cap(1, "US", 1));

  shutdown.cancel();
  task.await.unwrap();
}
