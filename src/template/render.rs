use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::template::token::{MacroKind, Segment, TokenStream};

/// Per-request macro binding table, keyed by the exact macro text
/// (e.g. `{$title}`, `{$g_price}`).
pub type MacroBindings = HashMap<String, String>;

/// Renders a token stream against a binding table and a live size-macro
/// resolver, producing the final byte sequence.
///
/// Substitution semantics, tracked per render call:
/// - local keys (no `g_` prefix) are replaced only at their first occurrence
///   of that exact key; later occurrences stay as the literal macro text, to
///   protect duplicate-sensitive downstream consumers;
/// - global keys (`{$g_...}`) are replaced at every occurrence;
/// - only the first local size macro triggers a live creative match, whether
///   or not the match succeeds; later local size macros stay verbatim;
///   global size macros resolve independently at every occurrence;
/// - macros with no binding and no size match pass through unchanged.
///
/// `resolve_size` is the callback into the creative matcher; it returns the
/// substitution URL and records the chosen creative on the ad being
/// assembled as a side effect.
pub fn render(
  stream: &TokenStream,
  bindings: &MacroBindings,
  mut resolve_size: impl FnMut(u32, u32) -> Option<String>,
) -> Bytes {
  let mut out = String::new();
  let mut replaced: HashSet<&str> = HashSet::new();
  let mut size_macro_fired = false;

  for segment in stream.segments() {
    match segment {
      Segment::Literal(text) => out.push_str(text),
      Segment::Macro { text, kind } => match *kind {
        MacroKind::Size { width, height, global } => {
          let fire = global || !size_macro_fired;
          if !global {
            size_macro_fired = true;
          }
          match fire.then(|| resolve_size(width, height)).flatten() {
            Some(url) => out.push_str(&url),
            None => out.push_str(text),
          }
        }
        MacroKind::Plain { global } => match bindings.get(text) {
          Some(value) if global || replaced.insert(text.as_str()) => out.push_str(value),
          _ => out.push_str(text),
        },
      },
    }
  }
  Bytes::from(out.into_bytes())
}
