use std::collections::HashMap;

/// Sentinel language code matching any request language.
pub const LANG_ALL: &str = "ALL";

/// Encodes a creative size into the single integer key used by the
/// render-fallback table.
pub fn size_key(width: u32, height: u32) -> u64 {
  width as u64 * 10_000 + height as u64
}

pub(crate) fn decode_size_key(key: u64) -> (u32, u32) {
  ((key / 10_000) as u32, (key % 10_000) as u32)
}

/// A concrete image, video or icon asset belonging to an ad.
///
/// Immutable once loaded into a pool. The matcher hands out borrowed
/// references into pool-owned data; pools are replaced wholesale on reload,
/// never edited in place, so those borrows stay valid for the request that
/// obtained them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Creative {
  pub id: u64,
  pub legacy_id: u64,
  pub width: u32,
  pub height: u32,
  pub url: String,
  pub domestic_cdn_url: String,
  pub overseas_cdn_url: String,
  pub language: String,
}

impl Creative {
  pub fn area(&self) -> u64 {
    self.width as u64 * self.height as u64
  }

  /// Plain aspect ratio. Zero height yields 0.0 rather than a NaN; callers
  /// that must never divide by zero use `smoothed_ratio`.
  pub fn ratio(&self) -> f64 {
    if self.height == 0 {
      0.0
    } else {
      self.width as f64 / self.height as f64
    }
  }

  /// Laplace-smoothed ratio `(w+1)/(h+1)`, safe for zero dimensions.
  pub fn smoothed_ratio(&self) -> f64 {
    smoothed_ratio(self.width, self.height)
  }

  /// Resolves the URL the renderer should substitute, preferring the CDN
  /// mirror for the request's geography and falling back to the origin URL
  /// when no mirror is configured.
  pub fn cdn_url(&self, overseas: bool) -> &str {
    let mirror = if overseas {
      &self.overseas_cdn_url
    } else {
      &self.domestic_cdn_url
    };
    if mirror.is_empty() {
      &self.url
    } else {
      mirror
    }
  }
}

pub(crate) fn smoothed_ratio(width: u32, height: u32) -> f64 {
  (width as f64 + 1.0) / (height as f64 + 1.0)
}

/// Per-ad collections of creative variants, kept separately for images,
/// videos and icons and keyed by language code (including `LANG_ALL`).
///
/// Variant order within a language is insertion order; nothing is sorted by
/// size. Matching scans the list once.
#[derive(Debug, Clone, Default)]
pub struct CreativePool {
  images: HashMap<String, Vec<Creative>>,
  videos: HashMap<String, Vec<Creative>>,
  icons: HashMap<String, Vec<Creative>>,
}

impl CreativePool {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_image(&mut self, creative: Creative) {
    self.images.entry(creative.language.clone()).or_default().push(creative);
  }

  pub fn push_video(&mut self, creative: Creative) {
    self.videos.entry(creative.language.clone()).or_default().push(creative);
  }

  pub fn push_icon(&mut self, creative: Creative) {
    self.icons.entry(creative.language.clone()).or_default().push(creative);
  }

  /// Image variants for `language`, falling back to `LANG_ALL` when the
  /// requested language has no entries.
  pub fn images_for(&self, language: &str) -> &[Creative] {
    resolve_language(&self.images, language)
  }

  /// Video variants for `language`, with the same `LANG_ALL` fallback.
  pub fn videos_for(&self, language: &str) -> &[Creative] {
    resolve_language(&self.videos, language)
  }

  /// Icon variants for exactly `language`, no fallback. Icon matching walks
  /// its own fallback chain (language, then `LANG_ALL`, then any).
  pub fn icons_exact(&self, language: &str) -> &[Creative] {
    self.icons.get(language).map(Vec::as_slice).unwrap_or(&[])
  }

  /// All icon variants across every language, in map iteration order.
  pub fn icons_any(&self) -> impl Iterator<Item = &Creative> {
    self.icons.values().flatten()
  }

  pub fn is_empty(&self) -> bool {
    self.images.is_empty() && self.videos.is_empty() && self.icons.is_empty()
  }
}

fn resolve_language<'a>(map: &'a HashMap<String, Vec<Creative>>, language: &str) -> &'a [Creative] {
  match map.get(language) {
    Some(variants) if !variants.is_empty() => variants,
    _ => map.get(LANG_ALL).map(Vec::as_slice).unwrap_or(&[]),
  }
}

/// Server-rendered creatives with no native pool entry, keyed by
/// `width*10_000 + height`.
///
/// Published wholesale by the out-of-band refresh (requests only ever read a
/// fully-formed snapshot) and consulted when the pool has no acceptable
/// match, or to replace a pool match with a strictly closer aspect ratio.
#[derive(Debug, Clone, Default)]
pub struct RenderFallback {
  entries: HashMap<u64, String>,
}

impl RenderFallback {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, width: u32, height: u32, url: impl Into<String>) {
    self.entries.insert(size_key(width, height), url.into());
  }

  pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &str)> {
    self.entries.iter().map(|(key, url)| {
      let (w, h) = decode_size_key(*key);
      (w, h, url.as_str())
    })
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
