//! Refiner command line interface.

pub mod commands;
pub mod interactive;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::adapters::NotationTarget;

/// Refiner - iterative LLM refinement for mathematical notation.
#[derive(Parser, Debug)]
#[command(name = "refiner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "refiner.toml")]
    pub config: PathBuf,

    /// Verbose mode.
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Writes a default refiner.toml.
    Init {
        /// Target directory (default: current directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Refines an expression, a file or an image.
    Refine(RefineArgs),

    /// Shows backend availability.
    Status,

    /// Edits the configuration interactively.
    Config,

    /// Shows version.
    Version,
}

/// Adapter selected on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Notation to LaTeX.
    Latex,
    /// LaTeX answer plus solution steps.
    Steps,
    /// Proof or explanation.
    Proof,
    /// Conversion into the --target notation.
    Notation,
}

/// Arguments of `refiner refine`.
#[derive(Args, Debug, Clone)]
pub struct RefineArgs {
    /// Adapter to run.
    #[arg(short, long, value_enum, default_value = "latex")]
    pub adapter: AdapterKind,

    /// Target notation for the notation adapter.
    #[arg(short, long, value_parser = parse_target, default_value = "latex")]
    pub target: NotationTarget,

    /// Input text.
    #[arg(
        short,
        long,
        required_unless_present_any = ["file", "image"],
        conflicts_with_all = ["file", "image"]
    )]
    pub input: Option<String>,

    /// Read the input from a file.
    #[arg(short, long, conflicts_with = "image")]
    pub file: Option<PathBuf>,

    /// Transcribe an image (latex adapter only).
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Primary model.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Fallback model ("none" disables fallback).
    #[arg(long)]
    pub fallback_model: Option<String>,

    /// Maximum round-trips, the first one included.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Time budget in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Skip the result cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

fn parse_target(s: &str) -> Result<NotationTarget, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refine() {
        let cli = Cli::try_parse_from([
            "refiner",
            "refine",
            "--adapter",
            "notation",
            "--target",
            "mathml",
            "--input",
            "x^2",
            "--max-iterations",
            "3",
            "--no-cache",
        ])
        .unwrap();

        let Commands::Refine(args) = cli.command else {
            panic!("expected refine");
        };
        assert_eq!(args.adapter, AdapterKind::Notation);
        assert_eq!(args.target, NotationTarget::MathMl);
        assert_eq!(args.input.as_deref(), Some("x^2"));
        assert_eq!(args.max_iterations, Some(3));
        assert!(args.no_cache);
        assert!(!args.json);
    }

    #[test]
    fn test_refine_requires_a_source() {
        assert!(Cli::try_parse_from(["refiner", "refine"]).is_err());
        assert!(Cli::try_parse_from(["refiner", "refine", "--input", "x", "--file", "f.txt"]).is_err());
        assert!(Cli::try_parse_from(["refiner", "refine", "--image", "f.png"]).is_ok());
    }

    #[test]
    fn test_bad_target_rejected() {
        assert!(Cli::try_parse_from(["refiner", "refine", "-i", "x", "--target", "troff"]).is_err());
    }
}
