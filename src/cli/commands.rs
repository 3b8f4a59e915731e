//! Refiner CLI command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adapters::{
    refine_with, DomainAdapter, ImageTranscriber, LatexAdapter, NotationAdapter, ProofAdapter,
    StepByStepAdapter, StepSolution,
};
use crate::engine::RefinementEngine;
use crate::executors::{CommandClient, CompletionClient, ImageInput};
use crate::types::config::{Config, CONFIG_FILE_NAME};
use crate::types::requests::RefinementOptions;
use crate::types::responses::RefinementResult;
use crate::{RefinerError, RefinerResult};

use super::{AdapterKind, RefineArgs};

/// Writes a default configuration into the given directory.
pub async fn init(path: Option<PathBuf>) -> RefinerResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE_NAME);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use 'refiner config' to modify.");
        return Ok(());
    }

    Config::default_config().save(&config_path)?;

    println!("Refiner initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Check that the backend is installed: refiner status");
    println!("  2. Configure options: refiner config");
    println!("  3. Try it: refiner refine --input 'x squared over two'");

    Ok(())
}

/// Shows backend availability and the active settings.
pub async fn status(config: &Config) -> RefinerResult<()> {
    println!("Checking backend status...\n");

    let client = CommandClient::from_config(&config.backend);

    if !config.backend.enabled {
        println!("  ○ {} - disabled", client.command());
    } else {
        let available = client.is_available().await;
        let status_icon = if available { "✓" } else { "✗" };
        let status_text = if available { "available" } else { "not found" };

        println!("  {} {} - {}", status_icon, client.command(), status_text);

        if available {
            if let Ok(version) = client.version().await {
                println!("      version: {}", version);
            }
        }
        if config.backend.vision_args.is_empty() {
            println!("      image input: not configured");
        }
    }

    let options = config.effective_options();
    println!();
    println!("Model: {}", options.model);
    println!(
        "Fallback: {}",
        options.fallback_model.as_deref().unwrap_or("none")
    );
    println!(
        "Cache: {}",
        if options.use_cache { "enabled" } else { "disabled" }
    );

    Ok(())
}

/// Edits the configuration interactively.
pub async fn config_cmd(config_path: &Path) -> RefinerResult<()> {
    use super::interactive::{run_interactive_config, show_config_summary};

    if config_path.exists() {
        let config = Config::load(config_path)?;
        show_config_summary(&config);
    }

    run_interactive_config(config_path)
}

/// Shows version.
pub fn version() {
    println!("refiner {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Iterative LLM refinement for mathematical notation");
}

/// Applies command line overrides on top of the configured options.
pub fn refine_options(args: &RefineArgs, config: &Config) -> RefinementOptions {
    let mut options = config.effective_options();

    if let Some(model) = &args.model {
        options.model = model.clone();
    }
    if let Some(fallback) = &args.fallback_model {
        options.fallback_model = match fallback.as_str() {
            "" | "none" => None,
            model => Some(model.to_string()),
        };
    }
    if let Some(max_iterations) = args.max_iterations {
        options.max_iterations = max_iterations;
    }
    if let Some(temperature) = args.temperature {
        options.temperature = temperature;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    if args.no_cache {
        options.use_cache = false;
    }

    options
}

/// Runs a refinement and prints the result.
pub async fn refine(args: &RefineArgs, config: &Config) -> RefinerResult<()> {
    if !config.backend.enabled {
        return Err(RefinerError::config("the backend is disabled in the configuration"));
    }

    let options = refine_options(args, config);
    let client: Arc<dyn CompletionClient> = Arc::new(CommandClient::from_config(&config.backend));
    let engine = RefinementEngine::from_config(client, config).with_defaults(options.clone());

    if let Some(path) = &args.image {
        if args.adapter != AdapterKind::Latex {
            return Err(RefinerError::config("--image only works with the latex adapter"));
        }
        let image = ImageInput::from_path(path)?;

        let spinner = spinner("Transcribing image...");
        let result = ImageTranscriber::new().transcribe(&engine, &image, options).await;
        spinner.finish_and_clear();

        return print_result(&result?, args.json, |latex: &String| latex.clone());
    }

    let input = match (&args.input, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(RefinerError::config("no input given")),
    };

    let text = |s: &String| s.clone();
    match args.adapter {
        AdapterKind::Latex => {
            run_adapter(&engine, &LatexAdapter::new(), &input, options, args.json, text).await
        }
        AdapterKind::Steps => {
            let adapter = StepByStepAdapter::new();
            run_adapter(&engine, &adapter, &input, options, args.json, render_steps).await
        }
        AdapterKind::Proof => {
            run_adapter(&engine, &ProofAdapter::new(), &input, options, args.json, text).await
        }
        AdapterKind::Notation => {
            let adapter = NotationAdapter::new(args.target);
            run_adapter(&engine, &adapter, &input, options, args.json, text).await
        }
    }
}

async fn run_adapter<T, A, R>(
    engine: &RefinementEngine,
    adapter: &A,
    input: &str,
    options: RefinementOptions,
    json: bool,
    render: R,
) -> RefinerResult<()>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
    A: DomainAdapter<T>,
    R: Fn(&T) -> String,
{
    let spinner = spinner(&format!("Refining with the {} adapter...", adapter.name()));
    let result = refine_with(engine, adapter, input, options).await;
    spinner.finish_and_clear();

    print_result(&result?, json, render)
}

fn print_result<T, R>(result: &RefinementResult<T>, json: bool, render: R) -> RefinerResult<()>
where
    T: Serialize,
    R: Fn(&T) -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", render(&result.final_result));
    eprintln!();
    eprintln!(
        "iterations: {} | confidence: {:.2} | model: {} | time: {} ms",
        result.iterations, result.confidence, result.model_used, result.processing_time_ms
    );

    Ok(())
}

fn render_steps(solution: &StepSolution) -> String {
    let mut out = String::new();
    for (i, step) in solution.steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out.push('\n');
    out.push_str(&solution.latex);
    out
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
