//! gapicgen CLI
//!
//! Driver for the GAPIC analysis layer:
//! - Planning HTTP requests from `(google.api.http)` annotations
//! - Resolving per-method retry / size-limit policies from a gRPC service config
//!
//! Output is the JSON the emitter consumes (or a human summary).

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use gapicgen_http::{parse_descriptor_set_json, plan_method, FileDescriptorSetJson};
use gapicgen_retry::ServiceConfig;
use std::fs;
use std::path::{Path, PathBuf};

mod analyze;

#[derive(Parser)]
#[command(name = "gapicgen")]
#[command(
    author,
    version,
    about = "gapicgen: HTTP binding and retry policy analysis for GAPIC clients"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every service: request plans + retry tables.
    Analyze {
        /// Descriptor set JSON (`buf build --as-file-descriptor-set`).
        descriptor: PathBuf,
        /// gRPC service config JSON.
        #[arg(long)]
        service_config: Option<PathBuf>,
        /// Restrict to these fully-qualified services (repeatable).
        #[arg(long)]
        service: Vec<String>,
        /// Output format: json|summary
        #[arg(long, default_value = "json")]
        format: String,
        /// Output path (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Plan HTTP requests only.
    Http {
        /// Descriptor set JSON.
        descriptor: PathBuf,
        /// Restrict to these fully-qualified methods (repeatable).
        #[arg(long)]
        method: Vec<String>,
        /// Output path (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Resolve one service's retry table from a service config.
    Retry {
        /// gRPC service config JSON.
        service_config: PathBuf,
        /// Fully-qualified service name.
        #[arg(long)]
        service: String,
        /// Method names declared on the service (repeatable).
        #[arg(long)]
        method: Vec<String>,
        /// Output path (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Analyze {
            descriptor,
            service_config,
            service,
            format,
            out,
        } => cmd_analyze(
            &descriptor,
            service_config.as_deref(),
            &service,
            &format,
            out.as_deref(),
        ),
        Commands::Http {
            descriptor,
            method,
            out,
        } => cmd_http(&descriptor, &method, out.as_deref()),
        Commands::Retry {
            service_config,
            service,
            method,
            out,
        } => cmd_retry(&service_config, &service, &method, out.as_deref()),
    }
}

fn cmd_analyze(
    descriptor: &Path,
    service_config: Option<&Path>,
    services: &[String],
    format: &str,
    out: Option<&Path>,
) -> Result<()> {
    let set = read_descriptor_set(descriptor)?;
    let config = match service_config {
        Some(path) => read_service_config(path)?,
        None => ServiceConfig::default(),
    };

    let report = analyze::analyze_descriptor_set(&set, &config, services)?;

    let text = match format {
        "json" => serde_json::to_string_pretty(&report)?,
        "summary" => analyze::render_summary(&report),
        other => return Err(anyhow!("unknown --format {other:?} (expected json|summary)")),
    };
    write_output(out, &text)
}

fn cmd_http(descriptor: &Path, methods: &[String], out: Option<&Path>) -> Result<()> {
    let set = read_descriptor_set(descriptor)?;

    let mut plans = Vec::new();
    let mut seen = Vec::new();
    for service in set.services()? {
        for method in &service.methods {
            let fqn = method.fqn();
            if !methods.is_empty() && !methods.contains(&fqn) {
                continue;
            }
            seen.push(fqn);
            if let Some(plan) = plan_method(method)? {
                plans.push(plan);
            }
        }
    }

    if let Some(missing) = methods.iter().find(|m| !seen.contains(m)) {
        return Err(anyhow!("method {missing:?} not found in descriptor set"));
    }

    write_output(out, &serde_json::to_string_pretty(&plans)?)
}

fn cmd_retry(
    service_config: &Path,
    service: &str,
    methods: &[String],
    out: Option<&Path>,
) -> Result<()> {
    let config = read_service_config(service_config)?;
    if methods.is_empty() {
        tracing::warn!(
            service,
            "no --method given; service-level defaults apply to no methods"
        );
    }
    let table = config.resolve_for(service, methods);
    write_output(out, &serde_json::to_string_pretty(&table)?)
}

fn read_descriptor_set(path: &Path) -> Result<FileDescriptorSetJson> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor json: {}", path.display()))?;
    parse_descriptor_set_json(&text).with_context(|| format!("in {}", path.display()))
}

fn read_service_config(path: &Path) -> Result<ServiceConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read service config: {}", path.display()))?;
    ServiceConfig::from_json(&text).with_context(|| format!("in {}", path.display()))
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        None => {
            println!("{text}");
        }
        Some(path) => {
            fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
            fs::write(path, text)?;
            eprintln!("  {} {}", "→".cyan(), path.display());
        }
    }
    Ok(())
}
