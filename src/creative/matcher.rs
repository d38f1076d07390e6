//! Best-variant selection for a requested size.
//!
//! All matching is a single scan over the resolved language list. Among the
//! variants a policy admits, the largest area wins; an equal-area challenger
//! replaces the incumbent on a coin flip so repeated calls rotate between
//! equivalent creatives instead of always preferring the first-seen one.
//! Preserve that behavior: template authors rely on the rotation.

use std::borrow::Cow;

use rand::Rng;

use crate::creative::pool::{smoothed_ratio, Creative, CreativePool, RenderFallback, LANG_ALL};

/// Tolerance for "exact" ratio comparisons.
pub const RATIO_EPSILON: f64 = 1e-3;
/// Absolute ratio tolerance for `RatioFuzzy`.
pub const RATIO_FUZZ: f64 = 0.2;
/// Relative ratio tolerance for `CombinedFuzzy`.
pub const COMBINED_RATIO_FUZZ: f64 = 0.10;
/// Relative per-dimension tolerance for the fuzzy policies.
pub const DIMENSION_FUZZ: f64 = 0.20;

/// How strictly a creative variant must fit the requested size. Supplied by
/// the caller per request, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
  /// Width and height both equal.
  ExactSize,
  /// Aspect ratio equal within `RATIO_EPSILON`; any size.
  ExactRatio,
  /// Aspect ratio within `RATIO_FUZZ` (absolute); any size.
  RatioFuzzy,
  /// Smoothed ratio exact within `RATIO_EPSILON`, each dimension within
  /// `DIMENSION_FUZZ` of the request.
  AbsoluteFuzzy,
  /// Ratio within `COMBINED_RATIO_FUZZ` of the requested ratio, each
  /// dimension within `DIMENSION_FUZZ`.
  CombinedFuzzy,
}

fn request_ratio(width: u32, height: u32) -> f64 {
  if height == 0 {
    0.0
  } else {
    width as f64 / height as f64
  }
}

fn within_fraction(requested: u32, got: u32, fuzz: f64) -> bool {
  (requested as f64 - got as f64).abs() <= requested as f64 * fuzz
}

fn satisfies(policy: MatchPolicy, width: u32, height: u32, v: &Creative) -> bool {
  match policy {
    MatchPolicy::ExactSize => v.width == width && v.height == height,
    MatchPolicy::ExactRatio => (request_ratio(width, height) - v.ratio()).abs() <= RATIO_EPSILON,
    MatchPolicy::RatioFuzzy => (request_ratio(width, height) - v.ratio()).abs() <= RATIO_FUZZ,
    MatchPolicy::AbsoluteFuzzy => {
      (smoothed_ratio(width, height) - v.smoothed_ratio()).abs() <= RATIO_EPSILON
        && within_fraction(width, v.width, DIMENSION_FUZZ)
        && within_fraction(height, v.height, DIMENSION_FUZZ)
    }
    MatchPolicy::CombinedFuzzy => {
      let requested = request_ratio(width, height);
      (requested - v.ratio()).abs() <= requested * COMBINED_RATIO_FUZZ
        && within_fraction(width, v.width, DIMENSION_FUZZ)
        && within_fraction(height, v.height, DIMENSION_FUZZ)
    }
  }
}

/// Area-maximizing selection with a uniform coin flip between the incumbent
/// and an equal-area challenger.
fn select_best<'a>(variants: impl Iterator<Item = &'a Creative>) -> Option<&'a Creative> {
  let mut best: Option<&Creative> = None;
  for v in variants {
    best = match best {
      None => Some(v),
      Some(b) if v.area() > b.area() => Some(v),
      Some(b) if v.area() == b.area() && rand::random::<bool>() => Some(v),
      keep => keep,
    };
  }
  best
}

/// Picks the best image variant for the requested size, per the five-way
/// policy, with `LANG_ALL` language fallback and a render-fallback override.
///
/// A `None` is "ad not renderable for this request", not an error; callers
/// drop the candidate rather than substituting a wrong-size creative.
pub fn match_image<'a>(
  pool: &'a CreativePool,
  fallback: &RenderFallback,
  language: &str,
  width: u32,
  height: u32,
  policy: MatchPolicy,
) -> Option<Cow<'a, Creative>> {
  let variants = pool.images_for(language);

  // Zero size means no constraint at all: any variant is acceptable, picked
  // uniformly so repeated unconstrained requests rotate.
  if width as u64 * height as u64 == 0 {
    if variants.is_empty() {
      return None;
    }
    let idx = rand::rng().random_range(0..variants.len());
    return Some(Cow::Borrowed(&variants[idx]));
  }

  let best = select_best(variants.iter().filter(|v| satisfies(policy, width, height, v)));

  // A server-rendered fallback beats the pool match only when its smoothed
  // ratio is strictly closer to the request's.
  let requested = smoothed_ratio(width, height);
  let best_distance = best.map(|b| (b.smoothed_ratio() - requested).abs());
  let mut closest: Option<(u32, u32, &str, f64)> = None;
  for (w, h, url) in fallback.iter() {
    let distance = (smoothed_ratio(w, h) - requested).abs();
    if closest.map_or(true, |(_, _, _, d)| distance < d) {
      closest = Some((w, h, url, distance));
    }
  }
  if let Some((w, h, url, distance)) = closest {
    let closer = best_distance.map_or(true, |d| distance < d);
    if closer {
      return Some(Cow::Owned(Creative {
        width: w,
        height: h,
        url: url.to_string(),
        language: LANG_ALL.to_string(),
        ..Default::default()
      }));
    }
  }

  best.map(Cow::Borrowed)
}

/// Video matching uses a two-way orientation rule instead of the five-way
/// image policy: a landscape request (`width >= height`) takes landscape
/// variants, a portrait request takes portrait ones.
pub fn match_video<'a>(
  pool: &'a CreativePool,
  language: &str,
  width: u32,
  height: u32,
) -> Option<&'a Creative> {
  let landscape = width >= height;
  select_best(
    pool
      .videos_for(language)
      .iter()
      .filter(|v| (v.width >= v.height) == landscape),
  )
}

/// Icon matching wants an exact 1:1 ratio, trying the request language, then
/// `LANG_ALL`, then an unconstrained uniform pick from any language.
pub fn match_icon<'a>(pool: &'a CreativePool, language: &str) -> Option<&'a Creative> {
  let square = |v: &&Creative| (v.ratio() - 1.0).abs() <= RATIO_EPSILON;
  for lang in [language, LANG_ALL] {
    if let Some(found) = select_best(pool.icons_exact(lang).iter().filter(square)) {
      return Some(found);
    }
  }
  let any: Vec<&Creative> = pool.icons_any().collect();
  if any.is_empty() {
    None
  } else {
    Some(any[rand::rng().random_range(0..any.len())])
  }
}
