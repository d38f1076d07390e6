// tests/assemble.rs

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio_util::sync::CancellationToken;

use adserve::{
  AdCandidate, CandidateIndex, Context, CounterNamespace, CounterStore, DropReason,
  MemoryCounterStore, PassthroughStrategy,
};

mod common;
use common::{candidate, request, test_context};

fn decode_html(ad: &adserve::AssembledAd) -> String {
  String::from_utf8(STANDARD.decode(&ad.creative_html_b64).unwrap()).unwrap()
}

#[tokio::test]
async fn happy_path_assembles_with_rendered_creative() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let mut cand = candidate(1, "<img src=\"{$img_300x250}\"><h1>{$title}</h1>");
  cand.bindings.insert("{$title}".into(), "Great App".into());

  let result = assembler
    .assemble_batch(&request(), &[cand], &CancellationToken::new())
    .await;
  assert_eq!(result.ads.len(), 1);
  assert!(result.dropped.is_empty());

  let ad = &result.ads[0];
  assert_eq!(ad.id, 1);
  assert_eq!(ad.click_url, "https://land.example/1");
  assert_eq!(ad.impression_id.len(), 32);
  // Size macro resolved to the 300x250 variant's URL, title bound once.
  let html = decode_html(ad);
  assert!(html.contains("https://cdn.example/img/2.png"));
  assert!(html.contains("<h1>Great App</h1>"));
  assert!(ad.creative_ids.contains(&2));

  ctx.shutdown().await;
}

#[tokio::test]
async fn unknown_channel_drops_only_that_candidate() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let good = candidate(1, "x");
  let mut bad = candidate(2, "x");
  bad.channel = "no-such-network".into();

  let result = assembler
    .assemble_batch(&request(), &[good, bad], &CancellationToken::new())
    .await;
  assert_eq!(result.ads.len(), 1);
  assert_eq!(result.dropped, vec![(2, DropReason::UnknownChannel)]);

  ctx.shutdown().await;
}

#[tokio::test]
async fn frequency_capped_candidate_is_dropped_without_side_effects() {
  let store = Arc::new(MemoryCounterStore::new());
  let ctx = Context::builder()
    .counter_store(store.clone())
    .channel("direct", Arc::new(PassthroughStrategy))
    .build();
  let assembler = ctx.assembler();
  let req = request();

  let mut cand = candidate(1, "x");
  cand.freq_limit = 1;

  // Pre-load the user's counter at the limit.
  let bucket = adserve::guard::user_bucket(&req.user_id);
  let key = CounterNamespace::Exposure.key(&req.user_id, &req.ad_type);
  store
    .incr_by(&bucket, &key, &cand.package_name, 1, std::time::Duration::from_secs(60))
    .await
    .unwrap();

  let result = assembler
    .assemble_batch(&req, &[cand], &CancellationToken::new())
    .await;
  assert!(result.ads.is_empty());
  assert_eq!(result.dropped, vec![(1, DropReason::FrequencyCapped)]);

  // Denial must not mutate counters.
  tokio::time::sleep(std::time::Duration::from_millis(20)).await;
  let counts = store.get_all(&bucket, &key).await.unwrap();
  assert_eq!(counts.get("com.example.app1"), Some(&1));

  ctx.shutdown().await;
}

#[tokio::test]
async fn assembled_candidate_commits_counters() {
  let store = Arc::new(MemoryCounterStore::new());
  let ctx = Context::builder()
    .counter_store(store.clone())
    .channel("direct", Arc::new(PassthroughStrategy))
    .build();
  let assembler = ctx.assembler();
  let req = request();

  let result = assembler
    .assemble_batch(&req, &[candidate(1, "x")], &CancellationToken::new())
    .await;
  assert_eq!(result.ads.len(), 1);

  tokio::time::sleep(std::time::Duration::from_millis(20)).await;
  let bucket = adserve::guard::user_bucket(&req.user_id);
  let key = CounterNamespace::Exposure.key(&req.user_id, &req.ad_type);
  let counts = store.get_all(&bucket, &key).await.unwrap();
  assert_eq!(counts.get("com.example.app1"), Some(&1));

  // Pacing recorded in the held window.
  assert!(ctx.pacing().snapshot().over_cap(1, &req.country, 1));

  ctx.shutdown().await;
}

#[tokio::test]
async fn pacing_cap_drops_candidate() {
  let ctx = test_context();
  let assembler = ctx.assembler();
  let req = request();

  let mut cand = candidate(1, "x");
  cand.pacing_rate = 1;
  ctx.pacing().snapshot().add(1, &req.country, 1);

  let result = assembler
    .assemble_batch(&req, &[cand], &CancellationToken::new())
    .await;
  assert!(result.ads.is_empty());
  assert_eq!(result.dropped, vec![(1, DropReason::PacingCapped)]);

  ctx.shutdown().await;
}

#[tokio::test]
async fn no_creative_drops_candidate() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let mut cand = candidate(1, "x");
  cand.creatives = Default::default();

  let result = assembler
    .assemble_batch(&request(), &[cand], &CancellationToken::new())
    .await;
  assert!(result.ads.is_empty());
  assert_eq!(result.dropped, vec![(1, DropReason::NoCreative)]);

  ctx.shutdown().await;
}

#[tokio::test]
async fn corrupt_template_falls_back_to_empty_payload() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let mut cand = candidate(1, "unused");
  cand.template_b64 = "!!!corrupt!!!".into();

  let result = assembler
    .assemble_batch(&request(), &[cand], &CancellationToken::new())
    .await;
  // Still assembled, structurally valid, content-less markup.
  assert_eq!(result.ads.len(), 1);
  assert_eq!(decode_html(&result.ads[0]), "");

  ctx.shutdown().await;
}

#[tokio::test]
async fn assembled_ad_serializes_for_the_wire() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let result = assembler
    .assemble_batch(&request(), &[candidate(1, "x")], &CancellationToken::new())
    .await;
  let json = serde_json::to_value(&result.ads[0]).unwrap();
  assert_eq!(json["id"], 1);
  assert_eq!(json["landing_type"], 1);
  assert!(json["impression_id"].as_str().unwrap().len() == 32);
  assert!(json["creative_html_b64"].is_string());

  ctx.shutdown().await;
}

#[tokio::test]
async fn cancellation_stops_between_candidates() {
  let ctx = test_context();
  let assembler = ctx.assembler();

  let cancel = CancellationToken::new();
  cancel.cancel();

  let cands: Vec<AdCandidate> = (1..=3).map(|i| candidate(i, "x")).collect();
  let result = assembler.assemble_batch(&request(), &cands, &cancel).await;
  assert!(result.ads.is_empty());
  // Every unprocessed candidate is accounted for, not silently skipped.
  assert_eq!(
    result.dropped,
    vec![
      (1, DropReason::Cancelled),
      (2, DropReason::Cancelled),
      (3, DropReason::Cancelled),
    ]
  );

  ctx.shutdown().await;
}

/// Stub index: holds candidates in memory and applies the predicate the way
/// the production boolean index does.
struct StubIndex {
  candidates: Vec<AdCandidate>,
}

impl CandidateIndex for StubIndex {
  fn search(
    &self,
    _conditions: &[(String, String)],
    predicate: &dyn Fn(&AdCandidate) -> bool,
  ) -> Vec<u64> {
    self.candidates.iter().filter(|c| predicate(c)).map(|c| c.id).collect()
  }
}

#[test]
fn candidate_index_predicate_prefilters() {
  let mut empty = candidate(2, "x");
  empty.creatives = Default::default();
  let index = StubIndex {
    candidates: vec![candidate(1, "x"), empty],
  };
  // Pre-filter: only candidates with at least one creative survive.
  let ids = index.search(&[], &|c| !c.creatives.is_empty());
  assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn batch_keeps_one_pacing_snapshot_throughout() {
  let ctx = test_context();
  let assembler = ctx.assembler();
  let req = request();

  // Two candidates for the same ad id with a rate of 2: both admitted and
  // both counted in the same window.
  let mut a = candidate(1, "x");
  a.pacing_rate = 2;
  let mut b = a.clone();
  b.package_name = "com.example.other".into();

  let result = assembler
    .assemble_batch(&req, &[a, b], &CancellationToken::new())
    .await;
  assert_eq!(result.ads.len(), 2);
  assert!(ctx.pacing().snapshot().over_cap(1, &req.country, 2));

  ctx.shutdown().await;
}
