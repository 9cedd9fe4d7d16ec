//! formsync CLI - bind, resolve and convert configuration files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;

use formsync::resolver::resolve_tree;
use formsync::{
    persist, Binder, BinderBuilder, BindingConfig, BindingRegistry, ControlHandle,
    ControlManifest, FixSuggestion, FormSyncError,
};

#[derive(Parser)]
#[command(name = "formsync")]
#[command(about = "formsync - bind configuration files to UI controls")]
#[command(version)]
struct Cli {
    /// Log debug output (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind a data file to headless controls and push its values
    Bind {
        /// Path to the binding .yaml file
        binding: PathBuf,

        /// Path to the controls manifest
        #[arg(short, long)]
        controls: PathBuf,
    },

    /// Print which control every key resolves to
    Resolve {
        /// Path to the binding .yaml file
        binding: PathBuf,

        /// Path to the controls manifest
        #[arg(short, long)]
        controls: PathBuf,
    },

    /// Convert a configuration file to another format
    Convert {
        /// Input file (.json, .xml, .yaml, .yml)
        input: PathBuf,

        /// Output file; the format follows the extension
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Bind { binding, controls } => bind(&binding, &controls),
        Commands::Resolve { binding, controls } => resolve(&binding, &controls),
        Commands::Convert { input, output } => convert(&input, &output),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let suggestion = e
            .downcast_ref::<FormSyncError>()
            .and_then(|e| e.fix_suggestion());
        if let Some(suggestion) = suggestion {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_inputs(binding: &Path, controls: &Path) -> Result<(BindingConfig, Vec<ControlHandle>)> {
    let config = BindingConfig::from_file(binding)
        .with_context(|| format!("reading binding file '{}'", binding.display()))?;
    let controls = ControlManifest::from_file(controls)
        .and_then(|manifest| manifest.instantiate())
        .with_context(|| format!("reading controls manifest '{}'", controls.display()))?;
    Ok((config, controls))
}

fn bind(binding: &Path, controls: &Path) -> Result<()> {
    let (config, controls) = load_inputs(binding, controls)?;
    let registry = BindingRegistry::new();
    let binder: Binder = BinderBuilder::from_config(&config, &registry)?.build(&controls)?;
    binder.push_to_controls()?;

    println!("{} {}", "→".cyan(), binder);
    for hook in binder.hooks() {
        println!(
            "  {} -> {} ({}) = {}",
            hook.key().bold(),
            hook.identifier(),
            hook.kind(),
            hook.get()
        );
    }

    if binder.values_match() {
        println!("{} All controls match the data", "✓".green());
    } else {
        println!("{} Controls differ from the data", "✗".red());
    }
    Ok(())
}

fn resolve(binding: &Path, controls: &Path) -> Result<()> {
    let (config, controls) = load_inputs(binding, controls)?;
    let tree = persist::load(&config.source)
        .with_context(|| format!("reading data file '{}'", config.source.display()))?;
    let identifiers: Vec<&str> = controls.iter().map(ControlHandle::identifier).collect();
    let mut resolver = config.key_resolver()?;

    let map = resolve_tree(
        &tree,
        &identifiers,
        resolver.as_mut(),
        config.recursive,
        config.on_unmatched,
    )?;

    println!("{} {} key(s) resolved", "→".cyan(), map.len());
    for (key, identifier) in map.iter() {
        println!("  {} -> {}", key.bold(), identifier);
    }
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let tree = persist::load(input)
        .with_context(|| format!("reading '{}'", input.display()))?;
    persist::save(output, &tree).with_context(|| format!("writing '{}'", output.display()))?;
    println!(
        "{} Converted '{}' to '{}'",
        "✓".green(),
        input.display(),
        output.display()
    );
    Ok(())
}
