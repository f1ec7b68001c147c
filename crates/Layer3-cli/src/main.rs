//! GenForge CLI - Main entry point

mod cli;
mod input;

use clap::{Parser, Subcommand};
use genforge_core::{bootstrap, GenerationError};
use genforge_foundation::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// GenForge - generate framework projects from a description
#[derive(Parser, Debug)]
#[command(name = "genforge")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Provider to use (gemini, openai, deepseek, anthropic)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model to use
    #[arg(long, global = true)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a project from a natural-language request
    Generate {
        /// What to build
        prompt: String,

        /// Target framework (react, vue, svelte, angular, nodejs)
        #[arg(short, long, default_value = "react")]
        framework: String,

        /// JSON file with prior `[{role, content}]` messages
        #[arg(long)]
        history: Option<PathBuf>,

        /// Directory with the current project files
        #[arg(long)]
        files: Option<PathBuf>,

        /// Print narration to stderr while the model responds
        #[arg(short, long)]
        stream: bool,
    },
    /// Review files for framework-specific issues
    Validate {
        /// Target framework
        #[arg(short, long, default_value = "react")]
        framework: String,

        /// Files to review
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Probe the provider and report cache counters
    Health,
    /// Print the starter project for a framework
    Scaffold {
        /// Target framework
        #[arg(short, long, default_value = "react")]
        framework: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load()?;
    if let Some(provider) = args.provider {
        settings.provider.default_provider = provider;
    }
    if let Some(model) = args.model {
        settings.provider.model = Some(model);
    }
    // Scaffolding is offline; everything else needs a usable provider
    if !matches!(args.command, Command::Scaffold { .. }) {
        if let Err(e) = settings.validate() {
            return cli::report(&GenerationError::from(e));
        }
    }

    let container = bootstrap::build_container(settings);

    let code = match args.command {
        Command::Generate {
            prompt,
            framework,
            history,
            files,
            stream,
        } => {
            match input::generation_request(
                &prompt,
                &framework,
                history.as_deref(),
                files.as_deref(),
            ) {
                Ok(request) => cli::generate(&container, request, stream).await?,
                Err(e) => cli::report(&e)?,
            }
        }
        Command::Validate { framework, paths } => {
            match input::validation_request(&framework, &paths) {
                Ok(request) => cli::validate(&container, request).await?,
                Err(e) => cli::report(&e)?,
            }
        }
        Command::Health => cli::health(&container).await?,
        Command::Scaffold { framework } => cli::scaffold(&container, &framework)?,
    };

    container.dispose();
    Ok(code)
}
