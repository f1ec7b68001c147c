//! Cache utilities
//!
//! - `hash`: fingerprints for cache keys
//! - `size`: approximate entry sizes for the byte budget

mod hash;
mod size;

pub use hash::{compute_hash, Fingerprint};
pub use size::{serialized_size, ApproxSize};
