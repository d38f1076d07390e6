// Slot templates: base64 blobs tokenized once per distinct content and
// rendered per request with macro substitution.

pub mod cache;
pub mod render;
pub mod token;

pub use cache::{TemplateCache, EMPTY_TEMPLATE};
pub use render::{render, MacroBindings};
pub use token::{MacroKind, Segment, TokenStream};
