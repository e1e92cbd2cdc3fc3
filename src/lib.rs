#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod callbacks;
pub mod composer;
pub mod config;
pub mod data;
pub mod feed;
pub mod gif_search;
pub mod giphy;
pub mod model;
pub mod render;
pub mod section;
pub mod task;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{parse_args, run, Command};
