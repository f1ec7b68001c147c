//! Config - unified settings
//!
//! - `settings.rs` - provider, cache and orchestration settings

mod settings;

pub use settings::{
    CacheSettings, GenerationSettings, ProviderSettings, Settings, KNOWN_PROVIDERS, SETTINGS_FILE,
};
