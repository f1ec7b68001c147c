//! genforge-core: Generation pipeline for GenForge
//!
//! Layer2 - turns a natural-language request into a bundle of source files
//!
//! # Modules
//!
//! - `types`: request/result DTOs (`GenerationRequest`, `GenerationResult`, ...)
//! - `error`: caller-facing `GenerationError` and its `{category, message}` body
//! - `prompt`: framework profiles and `PromptBuilder`
//! - `repair`: `ResponseRepairer` (JSON extraction, one repair pass, file normalisation)
//! - `template`: starter scaffolds behind `TemplateProvider`
//! - `orchestrator`: `GenerationOrchestrator` (cache, single-flight, streaming, health)
//! - `bootstrap`: composition root over the `ServiceContainer`
//!
//! # Usage
//!
//! ```ignore
//! use genforge_core::{bootstrap, Framework, GenerationRequest};
//! use genforge_foundation::Settings;
//!
//! let container = bootstrap::build_container(Settings::load()?);
//! let orchestrator = bootstrap::orchestrator(&container)?;
//!
//! let request = GenerationRequest::new("Create a hello world page", Framework::React);
//! let result = orchestrator.generate_code(&request).await?;
//! for (path, content) in &result.files {
//!     println!("{path}: {} bytes", content.len());
//! }
//!
//! container.dispose();
//! ```

pub mod bootstrap;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod template;
pub mod types;

// Re-exports: Types
pub use types::{
    ChatMessage, ChatRole, FileMap, Framework, GenerationRequest, GenerationResult,
    ValidationRequest, ValidationResult,
};

// Re-exports: Errors
pub use error::{ErrorBody, ErrorCategory, GenerationError, Result};

// Re-exports: Pipeline stages
pub use prompt::{FrameworkProfile, PromptBuilder};
pub use repair::ResponseRepairer;
pub use template::{StaticTemplateProvider, TemplateProvider};

// Re-exports: Orchestrator
pub use orchestrator::{
    GenerationEvent, GenerationOrchestrator, HealthReport, HealthStatus, OrchestratorSettings,
};

// Re-exports: Composition root
pub use bootstrap::{build_container, register_services, ManagedCache};
