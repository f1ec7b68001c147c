//! Storage module for GenForge
//!
//! - `json`: JSON file load/save used by the settings loader

mod json;

pub use json::{JsonStore, APP_DIR};
