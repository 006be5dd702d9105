// Clipforge - background job orchestration for an AI short-video pipeline.
//
// Videos move from a topic to a generated script, images and narration, a
// rendered file and finally posts on social platforms. Every step runs as a
// durable job; publishing is driven by scheduled posts and recurring
// calendars.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
