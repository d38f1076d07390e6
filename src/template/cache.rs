use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::AdError;
use crate::template::token::TokenStream;

/// Process-wide empty token stream, substituted by the assembler when a
/// template fails to decode so the client still receives a structurally
/// valid payload.
pub static EMPTY_TEMPLATE: Lazy<Arc<TokenStream>> = Lazy::new(|| Arc::new(TokenStream::empty()));

/// Process-wide memoization of tokenized templates, keyed by a content hash
/// of the *decoded* template text.
///
/// Entries are never evicted: the template vocabulary per deployment is
/// small and bounded, and the same content is shared across millions of
/// requests per slot. A single shared lock is fine here because population
/// is write-once per distinct template and reads dominate; contention only
/// occurs on first sight of new content.
#[derive(Debug, Default)]
pub struct TemplateCache {
  hasher: ahash::RandomState,
  entries: RwLock<HashMap<u64, Arc<TokenStream>>>,
}

impl TemplateCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Decodes a base64 template blob and returns its token stream, O(1)
  /// after the first call with identical decoded content. Repeat calls hand
  /// back the same `Arc`.
  pub fn tokenize(&self, template_b64: &str) -> Result<Arc<TokenStream>, AdError> {
    let decoded = STANDARD.decode(template_b64.trim())?;
    let text = String::from_utf8(decoded)?;
    let key = self.hasher.hash_one(text.as_bytes());

    if let Some(found) = self.entries.read().get(&key) {
      return Ok(found.clone());
    }

    let stream = Arc::new(TokenStream::parse(&text));
    let mut entries = self.entries.write();
    // A racing request may have populated the slot between the read and the
    // write lock; keep the first insert so every caller sees one Arc.
    Ok(entries.entry(key).or_insert(stream).clone())
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }
}
