// Creative assets and the size/ratio matching logic that picks the best
// variant out of a candidate's pool for a given request.

pub mod matcher;
pub mod pool;

pub use matcher::{match_icon, match_image, match_video, MatchPolicy};
pub use pool::{size_key, Creative, CreativePool, RenderFallback, LANG_ALL};
