use anyhow::Context;
use clap::Parser;
use refiner::cli::{Cli, Commands};
use refiner::types::config::Config;
use refiner::RefinerError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("invalid configuration file {}", cli.config.display()))?
    } else {
        Config::load_or_default()
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("refiner={}", log_level)
            .parse()
            .unwrap_or_else(|_| "refiner=info".parse().expect("fallback directive is valid")),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.general.log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            refiner::cli::commands::init(path).await?;
        }
        Commands::Refine(args) => {
            match refiner::cli::commands::refine(&args, &config).await {
                Ok(()) => {}
                // usage mistakes are worth showing as they are
                Err(e @ (RefinerError::Config(_) | RefinerError::Io(_))) => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "Refinement failed");
                    eprintln!("Refinement failed, please retry. Run with --verbose for details.");
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => {
            refiner::cli::commands::status(&config).await?;
        }
        Commands::Config => {
            refiner::cli::commands::config_cmd(&cli.config).await?;
        }
        Commands::Version => {
            refiner::cli::commands::version();
        }
    }

    Ok(())
}
