//! pressroom - a blog-aware static site generator.
//!
//! Sources are offered to a chain of loaders, merged into one [`site::Site`]
//! model, then handed to processors and generators registered on a
//! [`pipeline::Pipeline`].

pub mod build;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod init;
pub mod logger;
pub mod pipeline;
pub mod plugins;
pub mod render;
pub mod serve;
pub mod site;
pub mod utils;
pub mod watch;
