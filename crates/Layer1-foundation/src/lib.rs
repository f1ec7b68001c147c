//! # genforge-foundation
//!
//! Foundation layer for GenForge:
//! - Error: shared error type and `Result` alias
//! - Config: layered `Settings` (defaults, JSON files, environment)
//! - Storage: `JsonStore` for settings files
//! - Cache: TTL + LRU `CacheStore` behind the `ResponseCache` trait
//! - Container: `ServiceContainer` with singleton/transient lifetimes
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ServiceContainer (composition root)        │
//! │     │                                       │
//! │     ├── Settings ◄── JsonStore + env        │
//! │     └── CacheStore ◄── sweeper task         │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod container;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    CacheSettings, GenerationSettings, ProviderSettings, Settings, KNOWN_PROVIDERS, SETTINGS_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{JsonStore, APP_DIR};

// ============================================================================
// Cache
// ============================================================================
pub use cache::{
    compute_hash, serialized_size, ApproxSize, CacheEntry, CacheStats, CacheStore,
    CacheStoreConfig, Fingerprint, ResponseCache,
};

// ============================================================================
// Container
// ============================================================================
pub use container::{Lifetime, Resolver, ServiceContainer};
