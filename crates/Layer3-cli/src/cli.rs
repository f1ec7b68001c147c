//! Command implementations
//!
//! Results go to stdout as pretty JSON. Failures are printed as the
//! `{category, message}` error body, also on stdout, with a failing exit code.

use genforge_core::{
    bootstrap, Framework, GenerationError, GenerationOrchestrator, GenerationRequest, HealthStatus,
    ValidationRequest,
};
use genforge_foundation::ServiceContainer;
use genforge_provider::CancellationToken;
use serde::Serialize;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

pub async fn generate(
    container: &ServiceContainer,
    request: GenerationRequest,
    stream: bool,
) -> anyhow::Result<ExitCode> {
    let orchestrator = match resolve(container) {
        Ok(orchestrator) => orchestrator,
        Err(e) => return report(&e),
    };

    let result = if stream {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling generation");
                on_interrupt.cancel();
            }
        });

        let result = orchestrator
            .generate_code_with_streaming(request, cancel, |chunk| {
                let mut stderr = std::io::stderr();
                stderr.write_all(chunk.as_bytes())?;
                stderr.flush()?;
                Ok(())
            })
            .await;
        watcher.abort();
        eprintln!();
        result
    } else {
        orchestrator.generate_code(&request).await
    };

    match result {
        Ok(result) => print(&result),
        Err(e) => report(&e),
    }
}

pub async fn validate(
    container: &ServiceContainer,
    request: ValidationRequest,
) -> anyhow::Result<ExitCode> {
    let orchestrator = match resolve(container) {
        Ok(orchestrator) => orchestrator,
        Err(e) => return report(&e),
    };

    match orchestrator.validate_code(&request).await {
        Ok(result) => print(&result),
        Err(e) => report(&e),
    }
}

pub async fn health(container: &ServiceContainer) -> anyhow::Result<ExitCode> {
    let orchestrator = match resolve(container) {
        Ok(orchestrator) => orchestrator,
        Err(e) => return report(&e),
    };

    let report = orchestrator.health().await;
    print(&report)?;
    Ok(match report.status {
        HealthStatus::Healthy => ExitCode::SUCCESS,
        HealthStatus::Degraded => ExitCode::FAILURE,
    })
}

pub fn scaffold(container: &ServiceContainer, framework: &str) -> anyhow::Result<ExitCode> {
    let framework = match framework.parse::<Framework>() {
        Ok(framework) => framework,
        Err(e) => return report(&e),
    };
    let templates = bootstrap::template_provider(container)?;
    print(&templates.scaffold(framework))
}

/// Print a failure as its `{category, message}` body
pub fn report(error: &GenerationError) -> anyhow::Result<ExitCode> {
    print(&error.to_body())?;
    Ok(ExitCode::FAILURE)
}

fn resolve(container: &ServiceContainer) -> Result<Arc<GenerationOrchestrator>, GenerationError> {
    bootstrap::orchestrator(container).map_err(GenerationError::from)
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<ExitCode> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(ExitCode::SUCCESS)
}
