use crate::config::{LayoutMode, load_config};
use crate::ir::GraphSnapshot;
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutSummary, write_json, write_layout_dump};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "flowlayout", version, about = "Auto-layout for flow-diagram snapshots")]
pub struct Args {
    /// Snapshot JSON file ({nodes, edges}) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config file (JSON or JSON5, camelCase keys)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Override the layout mode from the config file
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<LayoutMode>,

    /// Emit single-line JSON instead of pretty-printed output
    #[arg(long = "compact-json")]
    pub compact_json: bool,

    /// Emit a short summary instead of the full layout
    #[arg(long = "summary")]
    pub summary: bool,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    let input = read_input(args.input.as_deref())?;
    let snapshot = GraphSnapshot::from_json(&input).context("input is not a valid graph snapshot")?;
    let layout = compute_layout(&snapshot, &config)?;

    let pretty = !args.compact_json;
    if args.summary {
        write_json(args.output.as_deref(), &LayoutSummary::from_layout(&layout), pretty)
    } else {
        write_layout_dump(args.output.as_deref(), &layout, pretty)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
