// Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use adserve::{
  AdCandidate, AdFormat, AdRequest, Context, Creative, CreativePool, MatchPolicy,
  PassthroughStrategy,
};

pub fn b64(text: &str) -> String {
  STANDARD.encode(text.as_bytes())
}

pub fn test_context() -> Context {
  Context::builder()
    .channel("direct", Arc::new(PassthroughStrategy))
    .build()
}

pub fn image(id: u64, w: u32, h: u32, lang: &str) -> Creative {
  Creative {
    id,
    width: w,
    height: h,
    url: format!("https://cdn.example/img/{id}.png"),
    language: lang.to_string(),
    ..Default::default()
  }
}

pub fn banner_pool() -> CreativePool {
  let mut pool = CreativePool::new();
  pool.push_image(image(1, 100, 100, "EN"));
  pool.push_image(image(2, 300, 250, "EN"));
  pool.push_image(image(3, 1080, 680, "EN"));
  pool
}

pub fn request() -> AdRequest {
  AdRequest {
    slot_id: "slot-1".into(),
    user_id: "device-abc".into(),
    language: "EN".into(),
    country: "US".into(),
    width: 300,
    height: 250,
    policy: MatchPolicy::ExactSize,
    ad_type: "banner".into(),
    overseas: false,
    freq_exempt: false,
  }
}

pub fn candidate(id: u64, template: &str) -> AdCandidate {
  AdCandidate {
    id,
    channel: "direct".into(),
    package_name: format!("com.example.app{id}"),
    landing_type: 1,
    landing_url: format!("https://land.example/{id}"),
    format: AdFormat::Banner,
    freq_limit: 5,
    user_freq_limit: 0,
    pacing_rate: -1,
    template_b64: b64(template),
    bindings: Default::default(),
    creatives: banner_pool(),
  }
}
