//! Series domain - themed runs of videos.

pub mod activities;
pub mod models;

pub use models::Series;
