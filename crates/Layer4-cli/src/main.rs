//! PlugForge CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use plugforge_core::{ClassRegistry, ModuleKind};
use plugforge_foundation::RegistryConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PlugForge - plugin class registry inspector
#[derive(Parser, Debug)]
#[command(name = "plugforge")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Plugin folders scanned before class queries
    #[arg(short = 'p', long = "plugins", global = true)]
    plugin_dirs: Vec<PathBuf>,

    /// Module kind of the plugin folders (native, script, core)
    #[arg(short, long, global = true, default_value = "native")]
    kind: ModuleKind,

    /// Directory holding the scan cache and blocklist
    #[arg(long, global = true)]
    settings_dir: Option<PathBuf>,

    /// Language of localized class attributes
    #[arg(long, global = true)]
    language: Option<String>,

    /// Disable the blocklist for this run
    #[arg(long, global = true)]
    no_blocklist: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a plugin folder and report each module
    Scan {
        /// Folder to scan
        dir: PathBuf,

        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Keep cache snapshots of discardable modules
        #[arg(long)]
        keep_discardable: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered classes
    Classes {
        /// Only classes of this category
        #[arg(short, long)]
        category: Option<String>,

        /// Search terms (requires --category)
        #[arg(short, long, requires = "category")]
        search: Option<String>,
    },
    /// Show one class by name, UID or class URL
    Show { class: String },
    /// Create an instance and release it again
    Create { class: String },
    /// Inspect or edit the blocklist
    Blocklist {
        #[command(subcommand)]
        action: BlocklistAction,
    },
    /// Write the scan cache and blocklist to a folder
    Diagnostics { out_dir: PathBuf },
    /// Delete the scan cache
    ClearCache {
        /// Also delete caches of other languages
        #[arg(long)]
        all_languages: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BlocklistAction {
    /// List blocklisted modules
    List,
    /// Add a module path or blocklist URL
    Add { target: String },
    /// Remove a module path or blocklist URL
    Remove { target: String },
    /// Clear the blocklist
    Reset,
}

impl Command {
    fn uses_plugin_dirs(&self) -> bool {
        matches!(self, Self::Classes { .. } | Self::Show { .. } | Self::Create { .. })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
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

    // Load configuration
    let mut config = RegistryConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RegistryConfig::default()
    });
    if let Some(dir) = &args.settings_dir {
        config = config.settings_dir(dir);
    }
    if let Some(language) = &args.language {
        config = config.language(language);
    }
    if args.no_blocklist {
        config = config.blocklist_enabled(false);
    }

    let registry = ClassRegistry::startup(config)?;

    if args.command.uses_plugin_dirs() {
        commands::scan_plugin_dirs(&registry, &args.plugin_dirs, args.kind)?;
    }

    let result = match args.command {
        Command::Scan {
            dir,
            recursive,
            keep_discardable,
            json,
        } => commands::scan(&registry, &dir, args.kind, recursive, keep_discardable, json),
        Command::Classes { category, search } => {
            commands::list_classes(&registry, category.as_deref(), search.as_deref());
            Ok(())
        }
        Command::Show { class } => commands::show_class(&registry, &class),
        Command::Create { class } => commands::create_instance(&registry, &class).await,
        Command::Blocklist { action } => match action {
            BlocklistAction::List => {
                commands::list_blocklist(&registry);
                Ok(())
            }
            BlocklistAction::Add { target } => commands::add_to_blocklist(&registry, &target),
            BlocklistAction::Remove { target } => commands::remove_from_blocklist(&registry, &target),
            BlocklistAction::Reset => commands::reset_blocklist(&registry),
        },
        Command::Diagnostics { out_dir } => commands::write_diagnostics(&registry, &out_dir),
        Command::ClearCache { all_languages } => commands::clear_cache(&registry, all_languages),
    };

    registry.shutdown()?;
    result
}
