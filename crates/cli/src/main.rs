use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::PathBuf;
use traceview_annotations::{by_lines, disjunct, AnnotatedJson, GroupedAnnotation};

#[derive(Parser)]
#[command(name = "traceview")]
#[command(about = "Map path-addressed annotations onto serialized JSON traces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve annotations to absolute byte offsets in a trace document
    Resolve(InputArgs),

    /// Emit per-line annotated segments for a trace document
    Annotate(InputArgs),

    /// Validate an annotation mapping against a trace document
    Check(InputArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Trace document file (JSON)
    trace: PathBuf,

    /// Flat annotation mapping file (JSON object keyed by "dotted.path[:start-end]")
    #[arg(short, long)]
    annotations: PathBuf,

    /// Scope annotations to a dotted path before mapping (e.g. "messages")
    #[arg(short, long)]
    path: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Warn
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let output = match &cli.command {
        Commands::Resolve(args) => resolve(args)?,
        Commands::Annotate(args) => annotate(args)?,
        Commands::Check(args) => check(args)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_inputs(args: &InputArgs) -> Result<(String, Map<String, Value>)> {
    let text = fs::read_to_string(&args.trace)
        .with_context(|| format!("failed to read trace file {}", args.trace.display()))?;
    let raw = fs::read_to_string(&args.annotations).with_context(|| {
        format!(
            "failed to read annotation file {}",
            args.annotations.display()
        )
    })?;
    let mappings: Value = serde_json::from_str(&raw)
        .with_context(|| format!("annotation file {} is not JSON", args.annotations.display()))?;
    let Value::Object(mappings) = mappings else {
        bail!(
            "annotation file {} must contain a JSON object",
            args.annotations.display()
        );
    };
    Ok((text, mappings))
}

fn scoped_tree(args: &InputArgs, mappings: &Map<String, Value>) -> Result<AnnotatedJson> {
    let tree = AnnotatedJson::from_mappings(mappings)?;
    Ok(match &args.path {
        Some(path) => tree.for_path(path),
        None => tree,
    })
}

fn resolve(args: &InputArgs) -> Result<Value> {
    let (text, mappings) = load_inputs(args)?;
    let resolved = scoped_tree(args, &mappings)?
        .try_in_text(&text)
        .context("trace document is not valid JSON")?;
    Ok(json!({ "annotations": resolved }))
}

fn annotate(args: &InputArgs) -> Result<Value> {
    let (text, mappings) = load_inputs(args)?;
    let tree = scoped_tree(args, &mappings)?;
    let resolved = tree
        .try_in_text(&text)
        .context("trace document is not valid JSON")?;
    let lines = by_lines(&disjunct(&resolved), &text);

    let rendered: Vec<Vec<Value>> = lines
        .iter()
        .map(|line| line.iter().map(|cell| render_cell(cell, &text)).collect())
        .collect();
    Ok(json!({ "lines": rendered }))
}

fn render_cell(cell: &GroupedAnnotation, text: &str) -> Value {
    json!({
        "start": cell.start,
        "end": cell.end.min(text.len()),
        "text": cell.slice_of(text),
        "annotations": cell.content.as_ref().map(|items| {
            items.iter().map(|a| a.content.clone()).collect::<Vec<_>>()
        }),
    })
}

fn check(args: &InputArgs) -> Result<Value> {
    let (text, mappings) = load_inputs(args)?;
    let tree = scoped_tree(args, &mappings)?;
    let total = tree.all_annotations().len();
    let resolved = tree
        .try_in_text(&text)
        .context("trace document is not valid JSON")?
        .len();

    if resolved < total {
        log::warn!(
            "{} of {} annotations did not resolve against this trace",
            total - resolved,
            total
        );
    }
    Ok(json!({
        "total": total,
        "resolved": resolved,
        "dropped": total - resolved,
    }))
}
