//! Model name inflection: derived route and data-key names, plus a per-adapter cache.

mod cache;
mod names;

pub use cache::*;
pub use names::*;
