//! Macro scanner turning decoded template text into an ordered token stream.
//!
//! The vocabulary is fixed: plain macros `{$key}` with `key` drawn from
//! `[A-Za-z0-9_]+`, and parameterized size macros `{$img_WxH}` /
//! `{$g_img_WxH}` with decimal `W`, `H`. Anything between `{$` and `}` that
//! fails the key grammar stays literal text. Scanning is a byte-index walk;
//! the grammar is simple enough that a regex engine would be overkill.

/// How a macro is interpreted at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
  /// A binding-table lookup. `global` keys (`{$g_...}`) are replaced at
  /// every occurrence, local keys only at their first.
  Plain { global: bool },
  /// A live creative match for the encoded size (`{$img_WxH}`).
  Size { width: u32, height: u32, global: bool },
}

/// One element of a token stream: a literal fragment or a recognized macro
/// carrying its exact matched text (kept verbatim for pass-through).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Macro { text: String, kind: MacroKind },
}

/// An ordered, immutable token stream for one distinct template content.
/// Built once, shared process-wide via the template cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
  segments: Vec<Segment>,
}

impl TokenStream {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Scans decoded template text into a token stream.
  pub fn parse(text: &str) -> Self {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(start) = rest.find("{$") {
      let after = &rest[start + 2..];
      match after.find('}') {
        Some(end) if is_macro_key(&after[..end]) => {
          literal.push_str(&rest[..start]);
          if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
          }
          let key = &after[..end];
          let text = &rest[start..start + 2 + end + 1];
          segments.push(Segment::Macro {
            text: text.to_string(),
            kind: classify(key),
          });
          rest = &after[end + 1..];
        }
        // No closing brace, or the key violates the grammar: the `{$` is
        // literal text and scanning resumes right after it.
        _ => {
          literal.push_str(&rest[..start + 2]);
          rest = &rest[start + 2..];
        }
      }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
      segments.push(Segment::Literal(literal));
    }
    TokenStream { segments }
  }
}

fn is_macro_key(key: &str) -> bool {
  !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn classify(key: &str) -> MacroKind {
  let (global, base) = match key.strip_prefix("g_") {
    Some(rest) => (true, rest),
    None => (false, key),
  };
  if let Some(dims) = base.strip_prefix("img_") {
    if let Some((width, height)) = parse_dimensions(dims) {
      return MacroKind::Size { width, height, global };
    }
  }
  MacroKind::Plain { global }
}

fn parse_dimensions(dims: &str) -> Option<(u32, u32)> {
  let (w, h) = dims.split_once('x')?;
  if w.is_empty() || h.is_empty() {
    return None;
  }
  if !w.bytes().all(|b| b.is_ascii_digit()) || !h.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  Some((w.parse().ok()?, h.parse().ok()?))
}
