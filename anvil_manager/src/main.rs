use anvil_core::engine::EngineHandle;
use anvil_core::params::parse_assignment;
use anvil_core::{
    AnvilConfig, AnvilError, AssetInfo, AssetManager, BundleRequest, BundleSources,
    ConversionConfig, SceneValidator,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "anvil")]
#[command(about = "ANVIL - robot asset conversion and remote load pipeline")]
#[command(version = "0.1.0")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./anvil.toml when present)
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Asset root directory (overrides config and ANVIL_ASSET_ROOT)
    #[arg(short = 'r', long = "root", global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the asset directory layout
    Init,

    /// Upload a robot bundle
    Upload {
        /// Bundle name
        name: String,
        /// Robot description file
        #[arg(short = 'u', long = "urdf")]
        urdf: PathBuf,
        /// Mesh file (repeatable)
        #[arg(short = 'm', long = "mesh")]
        meshes: Vec<PathBuf>,
        /// Texture file (repeatable)
        #[arg(short = 't', long = "texture")]
        textures: Vec<PathBuf>,
        /// Bundle configuration entry, key=value (repeatable)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Convert an uploaded bundle to a scene document
    Convert {
        /// Bundle name
        name: String,
        /// Use the mock converter even when the engine is enabled
        #[arg(long = "mock")]
        mock: bool,
        /// Conversion option override, key=value (repeatable)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Validate a scene document
    Validate {
        /// Scene document path
        scene: PathBuf,
    },

    /// Print joints, links and materials of a scene document as JSON
    Describe {
        /// Scene document path
        scene: PathBuf,
    },

    /// Print file information as JSON
    Inspect {
        /// Any file path
        path: PathBuf,
    },

    /// List uploaded bundles
    List,

    /// Remove a bundle and its converted scene
    Remove {
        /// Bundle name
        name: String,
    },

    /// Upload, convert, validate and load a robot in one go
    Deploy {
        /// Bundle name
        name: String,
        /// Robot description file
        #[arg(short = 'u', long = "urdf")]
        urdf: PathBuf,
        /// Mesh file (repeatable)
        #[arg(short = 'm', long = "mesh")]
        meshes: Vec<PathBuf>,
        /// Texture file (repeatable)
        #[arg(short = 't', long = "texture")]
        textures: Vec<PathBuf>,
        /// Bundle configuration entry sent with the load request (repeatable)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Conversion option override (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
        /// Engine endpoint (host, host:port or URL)
        #[arg(short = 'e', long = "endpoint")]
        endpoint: Option<String>,
        /// Use the mock converter even when the engine is enabled
        #[arg(long = "mock")]
        mock: bool,
    },

    /// Empty the cache directory
    CleanCache,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_command(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "anvil_manager=debug,anvil_core=debug"
    } else {
        "anvil_manager=info,anvil_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>, root: Option<PathBuf>) -> Result<AnvilConfig> {
    let mut config = match path {
        Some(path) => AnvilConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnvilConfig::discover().context("Failed to load configuration")?,
    };
    if let Some(root) = root {
        config.asset_root = root;
    }
    tracing::debug!("Asset root: {}", config.asset_root.display());
    Ok(config)
}

fn build_manager(config: AnvilConfig, mock: bool) -> Result<AssetManager> {
    let manager = if mock {
        AssetManager::new(config, None)
    } else {
        AssetManager::connect(config)
    };
    manager.context("Failed to initialise asset manager")
}

fn validator(config: &AnvilConfig) -> Result<SceneValidator> {
    match EngineHandle::acquire(&config.engine) {
        Ok(handle) => Ok(SceneValidator::engine(Arc::new(handle))),
        Err(AnvilError::EngineUnavailable(_)) => Ok(SceneValidator::basic()),
        Err(e) => Err(e.into()),
    }
}

fn parse_settings(entries: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let (key, value) = parse_assignment(entry)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_conversion(entries: &[String]) -> Result<ConversionConfig> {
    let mut conversion = ConversionConfig::new();
    for entry in entries {
        conversion.set_assignment(entry)?;
    }
    Ok(conversion)
}

fn sources(urdf: PathBuf, meshes: Vec<PathBuf>, textures: Vec<PathBuf>) -> BundleSources {
    BundleSources {
        description: Some(urdf),
        meshes,
        textures,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Returns `Ok(false)` when the command ran but the outcome is a failure
fn run_command(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref(), cli.root)?;

    match cli.command {
        Commands::Init => {
            let manager = build_manager(config, true)?;
            println!(
                "{} Asset directories ready under {}",
                "✓".green(),
                manager.store().root().display().to_string().yellow()
            );
            Ok(true)
        }

        Commands::Upload {
            name,
            urdf,
            meshes,
            textures,
            set,
        } => {
            let bundle_config = parse_settings(&set)?;
            let manager = build_manager(config, true)?;
            println!("{} Uploading bundle {}...", "→".cyan(), name.yellow());
            let bundle = manager
                .upload(&name, &sources(urdf, meshes, textures), &bundle_config)
                .with_context(|| format!("Upload of '{}' failed", name))?;
            println!(
                "{} Uploaded {} ({} meshes, {} textures)",
                "✓".green(),
                bundle.name.yellow(),
                bundle.assets.meshes.len(),
                bundle.assets.textures.len()
            );
            Ok(true)
        }

        Commands::Convert { name, mock, set } => {
            let conversion = parse_conversion(&set)?;
            let manager = build_manager(config, mock)?;
            println!(
                "{} Converting {} ({} strategy)...",
                "→".cyan(),
                name.yellow(),
                manager.strategy()
            );
            let scene = manager
                .convert_bundle(&name, &conversion)
                .with_context(|| format!("Conversion of '{}' failed", name))?;
            println!("{} Scene written to {}", "✓".green(), scene.display());
            Ok(true)
        }

        Commands::Validate { scene } => {
            let validator = validator(&config)?;
            let report = validator.report(&scene);
            let mode = if validator.is_engine_backed() {
                "engine"
            } else {
                "basic"
            };
            println!("{} {}", "Scene:".bold(), scene.display());
            println!("{} {}", "Mode:".bold(), mode);
            if report.valid {
                println!("{} {}", "Status:".bold(), "VALID".green().bold());
            } else {
                println!("{} {}", "Status:".bold(), "INVALID".red().bold());
            }
            for error in &report.errors {
                println!("  {} {}", "✗".red(), error);
            }
            for warning in &report.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
            Ok(report.valid)
        }

        Commands::Describe { scene } => {
            print_json(&validator(&config)?.describe(&scene))?;
            Ok(true)
        }

        Commands::Inspect { path } => {
            print_json(&AssetInfo::of(&path))?;
            Ok(true)
        }

        Commands::List => {
            let manager = build_manager(config, true)?;
            let bundles = manager.list_bundles()?;
            if bundles.is_empty() {
                println!("{}", "No bundles uploaded".dimmed());
                return Ok(true);
            }
            for bundle in bundles {
                let uploaded = bundle
                    .uploaded_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {} {:<24} {} meshes, {} textures  {}",
                    "•".cyan(),
                    bundle.name.yellow(),
                    bundle.assets.meshes.len(),
                    bundle.assets.textures.len(),
                    uploaded.dimmed()
                );
            }
            Ok(true)
        }

        Commands::Remove { name } => {
            let manager = build_manager(config, true)?;
            if manager.remove_bundle(&name) {
                println!("{} Removed {}", "✓".green(), name.yellow());
            } else {
                println!("{} Bundle {} does not exist", "⚠".yellow(), name.yellow());
            }
            Ok(true)
        }

        Commands::Deploy {
            name,
            urdf,
            meshes,
            textures,
            set,
            options,
            endpoint,
            mock,
        } => {
            let mut config = config;
            if let Some(endpoint) = endpoint {
                config.remote.endpoint = endpoint;
            }

            let mut request = BundleRequest::new(name.clone(), sources(urdf, meshes, textures));
            request.config = parse_settings(&set)?;
            request.conversion = parse_conversion(&options)?;

            let manager = build_manager(config, mock)?;
            println!("{} Deploying {}...", "→".cyan(), name.yellow());
            let outcome = manager.run_pipeline(&request);

            if outcome.success {
                println!("\n{}", "Deployment successful".green().bold());
            } else {
                println!(
                    "\n{} {}",
                    "Deployment failed at".red().bold(),
                    outcome.stage.to_string().red().bold()
                );
            }
            print_json(&outcome)?;
            Ok(outcome.success)
        }

        Commands::CleanCache => {
            let manager = build_manager(config, true)?;
            manager.clear_cache()?;
            println!("{} Cache cleared", "✓".green());
            Ok(true)
        }
    }
}
