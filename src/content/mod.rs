//! Source content: front matter parsing, the built-in loaders and post
//! interlinking.

pub mod front_matter;
pub mod loaders;
pub mod posts;

pub use front_matter::{read_front_matter, read_template};
