use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use duk_shim::emit::c::signature;
use duk_shim::generator::{uncovered_macros, validate_exports};
use duk_shim::{MacroValue, ShimConfig, ShimGenerator};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.execute() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("duk-shim error: {err:?}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn,duk_shim=info",
        1 => "info,duk_shim=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[derive(Parser, Debug)]
#[command(
    name = "duk-shim",
    version,
    about = "Materialize Duktape's macro-only API as real C symbols"
)]
struct Cli {
    /// Increase log verbosity (-v, -vv). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<ExitCode> {
        match self.command {
            Command::Generate(args) => generate_command(args),
            Command::Check(args) => check_command(args),
            Command::List(args) => list_command(args),
            Command::Scan(args) => scan_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the shim files, touching only those whose content changed.
    Generate(ShimArgs),
    /// Compare the shim files with a fresh render; exit 1 if any is stale or missing.
    Check(ShimArgs),
    /// Print the exports with evaluated constant values and function signatures.
    List(ListArgs),
    /// Print engine API macros the export table does not cover.
    Scan(ShimArgs),
}

#[derive(Args, Debug, Clone)]
struct ShimArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Engine header (duktape.h). Required without --config.
    #[arg(long)]
    header: Option<PathBuf>,
    /// Extra headers scanned and included after the engine header.
    #[arg(long = "extra", value_name = "FILE")]
    extra_headers: Vec<PathBuf>,
    /// Output directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Export table to use instead of the built-in one.
    #[arg(long)]
    table: Option<PathBuf>,
    /// Also generate Rust bindings (via bindgen) under this file name.
    #[arg(long)]
    rust: Option<String>,
    /// Extra clang argument for the Rust bindings; repeatable.
    #[arg(long = "clang-arg", value_name = "ARG", allow_hyphen_values = true)]
    clang_args: Vec<String>,
    /// Skip exports whose macro is missing instead of failing.
    #[arg(long, default_value_t = false)]
    lenient: bool,
    /// Declare the duk_shim_debug_write sink in the generated header.
    #[arg(long, default_value_t = false)]
    debug_hook: bool,
}

impl ShimArgs {
    fn into_config(self) -> Result<ShimConfig> {
        let mut config = match (&self.config, &self.header) {
            (Some(path), _) => ShimConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            (None, Some(header)) => ShimConfig::new(header),
            (None, None) => bail!("either --config or --header is required"),
        };

        if let (Some(_), Some(header)) = (&self.config, self.header) {
            config.engine_header = header;
        }
        config.extra_headers.extend(self.extra_headers);
        if let Some(out) = self.out {
            config = config.with_output_dir(out);
        }
        if let Some(table) = self.table {
            config = config.with_table(table);
        }
        if let Some(rust) = self.rust {
            config = config.with_rust_bindings(rust);
        }
        config.clang_args.extend(self.clang_args);
        if self.lenient {
            config = config.with_strict(false);
        }
        if self.debug_hook {
            config = config.with_debug_write_hook(true);
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
struct ListArgs {
    #[command(flatten)]
    shim: ShimArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    format: ListFormat,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

fn generate_command(args: ShimArgs) -> Result<ExitCode> {
    let generator = ShimGenerator::new(args.into_config()?)?;
    let report = generator.write()?;

    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.export, skipped.message);
    }
    println!(
        "{} constants, {} functions -> {} ({} written, {} unchanged)",
        report.constants,
        report.functions,
        generator.config().output_dir.display(),
        report.files_written.len(),
        report.files_unchanged.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn check_command(args: ShimArgs) -> Result<ExitCode> {
    let generator = ShimGenerator::new(args.into_config()?)?;
    let outcome = generator.check()?;

    for status in &outcome.statuses {
        println!("{:<10} {} ({})", status.state.to_string(), status.file_name, status.kind);
    }
    if !outcome.lock_changes.is_empty() {
        println!("\nlock changes:");
        for change in &outcome.lock_changes {
            println!("  {}", change);
        }
    }

    if outcome.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing {
    engine_version: Option<u32>,
    constants: Vec<ListedConstant>,
    functions: Vec<ListedFunction>,
}

#[derive(Serialize)]
struct ListedConstant {
    name: String,
    #[serde(rename = "type")]
    c_type: String,
    value: Option<MacroValue>,
}

#[derive(Serialize)]
struct ListedFunction {
    name: String,
    signature: String,
}

fn list_command(args: ListArgs) -> Result<ExitCode> {
    let generator = ShimGenerator::new(args.shim.into_config()?)?;
    let index = generator.scan()?;
    let table = generator.resolve_table(&index)?;
    let validated = validate_exports(&table, &index, false)?;

    let listing = Listing {
        engine_version: index.engine_version(),
        constants: validated
            .table
            .constants
            .iter()
            .map(|c| ListedConstant {
                name: c.name.clone(),
                c_type: c.c_type.clone(),
                value: index.evaluate_as(&c.name, &c.c_type),
            })
            .collect(),
        functions: validated
            .table
            .functions
            .iter()
            .map(|f| {
                Ok(ListedFunction {
                    name: f.name.clone(),
                    signature: signature(f)?,
                })
            })
            .collect::<duk_shim::Result<Vec<_>>>()?,
    };

    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        ListFormat::Text => {
            for c in &listing.constants {
                let value = c
                    .value
                    .as_ref()
                    .map_or_else(|| "?".to_string(), MacroValue::to_string);
                println!("{:<40} {:<16} {}", c.name, c.c_type, value);
            }
            for f in &listing.functions {
                println!("{}", f.signature);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn scan_command(args: ShimArgs) -> Result<ExitCode> {
    let generator = ShimGenerator::new(args.into_config()?)?;
    let index = generator.scan()?;
    let table = generator.resolve_table(&index)?;

    let uncovered = uncovered_macros(&table, &index);
    for def in &uncovered {
        let file = index.source_of(def).map_or("?", |s| s.name.as_str());
        match &def.params {
            Some(params) => {
                let mut params = params.join(", ");
                if def.variadic {
                    params.push_str(if params.is_empty() { "..." } else { ", ..." });
                }
                println!("{}({})  {}:{}", def.name, params, file, def.line);
            }
            None => println!("{}  {}:{}", def.name, file, def.line),
        }
    }
    println!(
        "{} of {} engine macros not exported",
        uncovered.len(),
        index.api_macros().count()
    );
    Ok(ExitCode::SUCCESS)
}
