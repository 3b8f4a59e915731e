//! Interactive configuration.
//!
//! Menu-driven editing of `refiner.toml` using dialoguer.

use std::path::Path;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::types::config::Config;
use crate::RefinerResult;

/// Runs the interactive configuration.
pub fn run_interactive_config(config_path: &Path) -> RefinerResult<()> {
    let theme = ColorfulTheme::default();

    println!("\n🔧 Refiner Interactive Configuration\n");

    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        println!("Creating a new configuration...\n");
        Config::default_config()
    };

    loop {
        let options = vec![
            "General",
            "Refinement",
            "Backend",
            "Cache",
            "Save and exit",
            "Exit without saving",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What do you want to configure?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_general(&theme, &mut config)?,
            1 => configure_refinement(&theme, &mut config)?,
            2 => configure_backend(&theme, &mut config)?,
            3 => configure_cache(&theme, &mut config)?,
            4 => {
                config.save(config_path)?;
                println!("\n✓ Configuration saved to: {}\n", config_path.display());
                break;
            }
            5 => {
                if Confirm::with_theme(&theme)
                    .with_prompt("Really exit without saving?")
                    .default(false)
                    .interact()?
                {
                    println!("\nExiting without saving.\n");
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn configure_general(theme: &ColorfulTheme, config: &mut Config) -> RefinerResult<()> {
    println!("\n📋 General\n");

    let log_levels = vec!["error", "warn", "info", "debug", "trace"];
    let current_idx = log_levels
        .iter()
        .position(|&l| l == config.general.log_level)
        .unwrap_or(2);

    let log_level_idx = Select::with_theme(theme)
        .with_prompt("Log level")
        .items(&log_levels)
        .default(current_idx)
        .interact()?;

    config.general.log_level = log_levels[log_level_idx].to_string();

    let log_formats = vec!["text", "json"];
    let current_format_idx = log_formats
        .iter()
        .position(|&f| f == config.general.log_format)
        .unwrap_or(0);

    let log_format_idx = Select::with_theme(theme)
        .with_prompt("Log format")
        .items(&log_formats)
        .default(current_format_idx)
        .interact()?;

    config.general.log_format = log_formats[log_format_idx].to_string();

    println!("\n✓ General settings updated.\n");
    Ok(())
}

fn configure_refinement(theme: &ColorfulTheme, config: &mut Config) -> RefinerResult<()> {
    println!("\n🔁 Refinement\n");

    let options = &mut config.refinement;

    options.model = Input::with_theme(theme)
        .with_prompt("Primary model")
        .default(options.model.clone())
        .interact_text()?;

    let fallback: String = Input::with_theme(theme)
        .with_prompt("Fallback model (empty disables fallback)")
        .default(options.fallback_model.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    options.fallback_model = Some(fallback.trim().to_string()).filter(|m| !m.is_empty());

    options.max_iterations = Input::with_theme(theme)
        .with_prompt("Maximum round-trips")
        .default(options.max_iterations)
        .validate_with(|n: &u32| {
            if *n >= 1 {
                Ok(())
            } else {
                Err("at least one round-trip is required")
            }
        })
        .interact_text()?;

    options.temperature = Input::with_theme(theme)
        .with_prompt("Temperature")
        .default(options.temperature)
        .interact_text()?;

    options.confidence_threshold = Input::with_theme(theme)
        .with_prompt("Confidence threshold (0.0 - 1.0)")
        .default(options.confidence_threshold)
        .validate_with(|t: &f64| {
            if (0.0..=1.0).contains(t) {
                Ok(())
            } else {
                Err("the threshold must be between 0.0 and 1.0")
            }
        })
        .interact_text()?;

    options.timeout_ms = Input::with_theme(theme)
        .with_prompt("Timeout (milliseconds)")
        .default(options.timeout_ms)
        .interact_text()?;

    println!("\n✓ Refinement settings updated.\n");
    Ok(())
}

fn configure_backend(theme: &ColorfulTheme, config: &mut Config) -> RefinerResult<()> {
    println!("\n🤖 Backend\n");

    let backend = &mut config.backend;

    backend.enabled = Confirm::with_theme(theme)
        .with_prompt("Enable the backend?")
        .default(backend.enabled)
        .interact()?;

    if !backend.enabled {
        println!("Backend disabled.\n");
        return Ok(());
    }

    backend.command = Input::with_theme(theme)
        .with_prompt("Command")
        .default(backend.command.clone())
        .interact_text()?;

    let args: String = Input::with_theme(theme)
        .with_prompt("Arguments ({model} and {temperature} are substituted)")
        .default(backend.args.join(" "))
        .allow_empty(true)
        .interact_text()?;
    backend.args = args.split_whitespace().map(str::to_string).collect();

    let vision_args: String = Input::with_theme(theme)
        .with_prompt("Image arguments (empty disables image input)")
        .default(backend.vision_args.join(" "))
        .allow_empty(true)
        .interact_text()?;
    backend.vision_args = vision_args.split_whitespace().map(str::to_string).collect();

    println!("\n✓ Backend configured.\n");
    Ok(())
}

fn configure_cache(theme: &ColorfulTheme, config: &mut Config) -> RefinerResult<()> {
    println!("\n💾 Cache\n");

    config.cache.enabled = Confirm::with_theme(theme)
        .with_prompt("Enable the result cache?")
        .default(config.cache.enabled)
        .interact()?;

    if !config.cache.enabled {
        println!("Cache disabled.\n");
        return Ok(());
    }

    config.cache.capacity = Input::with_theme(theme)
        .with_prompt("Maximum capacity (entries)")
        .default(config.cache.capacity)
        .interact_text()?;

    config.cache.ttl_secs = Input::with_theme(theme)
        .with_prompt("Time to live (seconds)")
        .default(config.cache.ttl_secs)
        .interact_text()?;

    println!("\n✓ Cache configured.\n");
    Ok(())
}

/// Prints a summary of the configuration.
pub fn show_config_summary(config: &Config) {
    let options = &config.refinement;
    let yes_no = |b: bool| if b { "Yes" } else { "No" };

    println!("\n📊 Configuration Summary\n");
    println!("┌─────────────────────────────────────────┐");
    println!("│ General                                 │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Log level: {:<28} │", config.general.log_level);
    println!("│ Log format: {:<27} │", config.general.log_format);
    println!("├─────────────────────────────────────────┤");
    println!("│ Refinement                              │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Model: {:<32} │", options.model);
    println!(
        "│ Fallback: {:<29} │",
        options.fallback_model.as_deref().unwrap_or("none")
    );
    println!("│ Max round-trips: {:<22} │", options.max_iterations);
    println!("│ Temperature: {:<26} │", options.temperature);
    println!("│ Threshold: {:<28} │", options.confidence_threshold);
    println!("│ Timeout: {:<28}ms │", options.timeout_ms);
    println!("├─────────────────────────────────────────┤");
    println!("│ Backend                                 │");
    println!("├─────────────────────────────────────────┤");
    println!(
        "│ {} {:<37} │",
        if config.backend.enabled { "✓" } else { "✗" },
        config.backend.command
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Cache                                   │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Enabled: {:<30} │", yes_no(config.cache.enabled));
    if config.cache.enabled {
        println!("│ Capacity: {:<29} │", config.cache.capacity);
        println!("│ TTL: {:<33}s │", config.cache.ttl_secs);
    }
    println!("└─────────────────────────────────────────┘");
    println!();
}
