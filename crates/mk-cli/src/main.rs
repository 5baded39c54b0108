//! Mockify CLI
//!
//! Inspects and edits a persisted configuration file and runs the engine's
//! decisions (hooks, header mediation, URL classification, page payload)
//! against it.

mod host;
mod logging;
mod store;

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use log::info;
use ts_rs::TS;

use mk_core::channel::Message;
use mk_core::config::{heal, Repair};
use mk_core::filter::Blocklist;
use mk_core::headers::mutate_request_headers;
use mk_core::inject::{build_payload, InjectionPayload};
use mk_core::pattern::parse_blocklist;
use mk_core::store::{load_effective, save_config, LoadSource};
use mk_core::{
    resolve, EffectiveConfig, EngineOptions, FlagSet, GeneralSettings, Header, MediationEngine, Mode,
    OverrideDescriptor, ResourceType, LOG_TARGET,
};

use crate::host::PrintHost;
use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "mk-cli")]
#[command(about = "Mockify configuration and mediation tools")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration a mode resolves to
    Resolve {
        /// off, normal or aggressive
        #[arg(short, long)]
        mode: Mode,
    },

    /// Load a store file (seeding or healing it) and show the hooks it needs
    Load {
        /// Store file
        #[arg(short, long, default_value = "mockify.json")]
        store: String,
    },

    /// Report what healing would change, without writing
    Heal {
        /// JSON file holding one persisted configuration object
        #[arg(short, long)]
        input: String,
    },

    /// Switch the stored mode, resetting flags to its baseline
    SetMode {
        #[arg(short, long, default_value = "mockify.json")]
        store: String,

        #[arg(short, long)]
        mode: Mode,
    },

    /// Classify a URL against the stored blocklist
    Classify {
        #[arg(short, long, default_value = "mockify.json")]
        store: String,

        url: String,

        /// Host resource type name (image, script, sub_frame, websocket, ...)
        #[arg(short = 't', long = "type", default_value = "other")]
        resource_type: String,
    },

    /// Show the request headers the engine would send
    Headers {
        #[arg(short, long, default_value = "mockify.json")]
        store: String,

        url: String,

        /// Header as "Name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Print the page override payload
    Payload {
        #[arg(short, long, default_value = "mockify.json")]
        store: String,
    },

    /// Replace the stored blocklist with the patterns in a text file
    ImportBlocklist {
        #[arg(short, long, default_value = "mockify.json")]
        store: String,

        /// One match pattern per line; `#` and `!` start comments
        #[arg(short, long)]
        input: String,
    },

    /// Export TypeScript definitions for the wire types
    Types {
        #[arg(short, long, default_value = "bindings")]
        out: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Resolve { mode } => cmd_resolve(mode),
        Commands::Load { store } => cmd_load(&store).await,
        Commands::Heal { input } => cmd_heal(&input),
        Commands::SetMode { store, mode } => cmd_set_mode(&store, mode).await,
        Commands::Classify {
            store,
            url,
            resource_type,
        } => cmd_classify(&store, &url, &resource_type).await,
        Commands::Headers { store, url, headers } => cmd_headers(&store, &url, &headers).await,
        Commands::Payload { store } => cmd_payload(&store).await,
        Commands::ImportBlocklist { store, input } => cmd_import_blocklist(&store, &input).await,
        Commands::Types { out } => cmd_types(&out),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

/// Load through the same path the engine uses on startup.
async fn load(path: &str) -> EffectiveConfig {
    let store = JsonFileStore::new(path);
    let outcome = load_effective(&store, &EngineOptions::default()).await;
    info!(target: LOG_TARGET, "Loaded '{}' ({:?})", store.path().display(), outcome.source);
    outcome.config
}

fn describe_repair(repair: &Repair) -> String {
    match repair {
        Repair::NotAnObject => "not an object, replaced with the aggressive baseline".to_string(),
        Repair::LegacyMigrated => "migrated legacy power/alt_header keys".to_string(),
        Repair::ModeReset => "mode missing or unknown, reset to aggressive".to_string(),
        Repair::Added(key) => format!("added missing '{}'", key),
        Repair::Replaced(key) => format!("replaced mistyped '{}'", key),
        Repair::Dropped(key) => format!("dropped unknown '{}'", key),
        Repair::Rebuilt => "did not decode after repair, rebuilt from the mode baseline".to_string(),
    }
}

fn cmd_resolve(mode: Mode) -> Result<(), String> {
    print_json(&resolve(mode, &GeneralSettings::default()).to_json())
}

async fn cmd_load(path: &str) -> Result<(), String> {
    let store = JsonFileStore::new(path);
    let mut engine = MediationEngine::new(PrintHost::default(), EngineOptions::default());

    println!("Hooks:");
    let source = engine.initialize(&store).await;
    // Reapplying an unchanged configuration prints nothing.
    engine.handle_message(&store, Message::Reload).await;

    let snapshot = engine.snapshot();
    println!();
    println!("Store '{}'", path);
    match source {
        LoadSource::Seeded => println!("  Source:      seeded with the {} baseline", snapshot.config.mode),
        LoadSource::Stored => println!("  Source:      stored"),
        LoadSource::Fallback => println!("  Source:      unreadable, running on the aggressive baseline"),
        LoadSource::Healed(repairs) => {
            println!("  Source:      healed ({} repairs)", repairs.len());
            for repair in &repairs {
                println!("    - {}", describe_repair(repair));
            }
        }
    }
    println!("  Mode:        {}", snapshot.config.mode);
    println!("  Hooks:       {}", engine.host().installed.len());
    println!("  Blocklist:   {} patterns", snapshot.blocklist.patterns().len());
    for rejected in snapshot.blocklist.rejected() {
        println!("    rejected: {}", rejected);
    }

    Ok(())
}

fn cmd_heal(input: &str) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid JSON in '{}': {}", input, e))?;

    let healed = heal(&value, &EngineOptions::default());
    if healed.needs_write() {
        println!("{} repairs:", healed.repairs.len());
        for repair in &healed.repairs {
            println!("  - {}", describe_repair(repair));
        }
    } else {
        println!("'{}' is complete", input);
    }
    println!();
    print_json(&healed.config.to_json())
}

async fn cmd_set_mode(path: &str, mode: Mode) -> Result<(), String> {
    let store = JsonFileStore::new(path);
    let options = EngineOptions::default();
    let current = load_effective(&store, &options).await;

    let config = resolve(mode, &current.config.general);
    if !save_config(&store, &options, &config).await {
        return Err(format!("Failed to write '{}'", path));
    }
    println!("Mode set to {} in '{}'", mode, path);
    Ok(())
}

async fn cmd_classify(path: &str, url: &str, resource_type: &str) -> Result<(), String> {
    let config = load(path).await;
    let blocklist = Blocklist::compile(&config);
    let action = blocklist.classify(url, ResourceType::from_host_name(resource_type));
    println!("{:?}", action);
    Ok(())
}

fn parse_header(raw: &str) -> Result<Header, String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("Header '{}' is not in 'Name: value' form", raw))?;
    Ok(Header::new(name.trim(), value.trim()))
}

async fn cmd_headers(path: &str, url: &str, raw_headers: &[String]) -> Result<(), String> {
    let headers = raw_headers.iter().map(|h| parse_header(h)).collect::<Result<Vec<_>, _>>()?;
    let config = load(path).await;

    for header in mutate_request_headers(&config, url, headers) {
        println!("{}: {}", header.name, header.value);
    }
    Ok(())
}

async fn cmd_payload(path: &str) -> Result<(), String> {
    let config = load(path).await;
    match build_payload(&config) {
        Some(payload) => {
            let value = serde_json::to_value(&payload).map_err(|e| format!("Failed to encode payload: {}", e))?;
            print_json(&value)
        }
        None => {
            println!("No page overrides in mode {}", config.mode);
            Ok(())
        }
    }
}

async fn cmd_import_blocklist(path: &str, input: &str) -> Result<(), String> {
    let text = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let (patterns, rejected) = parse_blocklist(&text);

    for line in &rejected {
        println!("  line {}: {}", line.line, line.error);
    }

    let store = JsonFileStore::new(path);
    let options = EngineOptions::default();
    let mut config = load_effective(&store, &options).await.config;
    config.general.block_url_patterns = patterns;

    if !save_config(&store, &options, &config).await {
        return Err(format!("Failed to write '{}'", path));
    }

    println!(
        "Imported {} patterns from '{}' into '{}' ({} rejected)",
        config.general.block_url_patterns.len(),
        Path::new(input).file_name().unwrap_or_default().to_string_lossy(),
        path,
        rejected.len()
    );
    Ok(())
}

fn cmd_types(out: &str) -> Result<(), String> {
    let export = |result: Result<(), ts_rs::ExportError>| result.map_err(|e| format!("Failed to export types: {}", e));

    export(EffectiveConfig::export_all_to(out))?;
    export(FlagSet::export_all_to(out))?;
    export(GeneralSettings::export_all_to(out))?;
    export(OverrideDescriptor::export_all_to(out))?;
    export(Header::export_all_to(out))?;
    export(Message::export_all_to(out))?;
    export(InjectionPayload::export_all_to(out))?;

    println!("Exported TypeScript definitions to '{}'", out);
    Ok(())
}
