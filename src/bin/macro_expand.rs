//! Macro expansion CLI
//!
//! Expands the macros in a piece of text using macro records loaded from
//! YAML.
//!
//! # Usage
//!
//! ```bash
//! # Expand text against a patient object
//! macro-expand --macros macros/ --object patient.json "Seen today. 2@dose"
//!
//! # Read text from stdin, with variables and a cursor
//! echo "@greeting @name" | macro-expand --macros macros.yaml --var name=Fido --cursor 9
//!
//! # Run a single macro strictly, failing on errors
//! macro-expand --macros macros.yaml --strict 3@plus1
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::Value;

use openvpms_macro::config::{init_tracing, MacroConfig};
use openvpms_macro::macros::{LookupMacros, MacroFactory, MapVariables, Position, Variables};
use openvpms_macro::store::{HandlebarsRenderer, InMemoryLookupStore};

#[derive(Parser)]
#[command(name = "macro-expand")]
#[command(version)]
#[command(about = "Expand text macros defined in YAML lookup records")]
struct Cli {
    /// YAML file or directory of macro records (defaults to MACRO_PATH)
    #[arg(short, long)]
    macros: Option<PathBuf>,

    /// JSON file holding the object macros are evaluated against
    #[arg(short, long)]
    object: Option<PathBuf>,

    /// Variable visible to macros, as name=value
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    variables: Vec<(String, String)>,

    /// Cursor position in characters; the adjusted position is printed to stderr
    #[arg(long)]
    cursor: Option<usize>,

    /// Run the text as a single macro and fail on errors
    #[arg(long)]
    strict: bool,

    /// Text to expand (reads stdin if not provided)
    text: Option<String>,
}

fn parse_variable(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MacroConfig::from_env()?;
    init_tracing(&config.log_filter);

    let path = cli
        .macros
        .or(config.macro_path.clone())
        .ok_or_else(|| anyhow!("no macros given: pass --macros or set MACRO_PATH"))?;
    let store = Arc::new(
        InMemoryLookupStore::load_from_path(&path)
            .with_context(|| format!("Failed to load macros from {}", path.display()))?,
    );
    let factory = MacroFactory::new(
        store.clone(),
        Arc::new(HandlebarsRenderer::new()),
        config.archetypes.clone(),
    );
    let macros = LookupMacros::new(store, factory)?;

    let object = cli.object.as_deref().map(read_object).transpose()?;
    let mut variables = MapVariables::new();
    for (name, value) in cli.variables {
        variables.add(name, value);
    }

    let text = match cli.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if cli.strict {
        let result = macros.run_with(&text, object.as_ref(), &variables)?;
        println!("{}", result.unwrap_or_default());
        return Ok(());
    }

    let mut position = cli.cursor.map(Position::new);
    let output = macros.run_all_with(
        &text,
        object.as_ref(),
        Some(&variables as &dyn Variables),
        position.as_mut(),
    );
    println!("{}", output);
    if let Some(position) = position {
        eprintln!("cursor: {}", position.get());
    }
    Ok(())
}

fn read_object(path: &std::path::Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
