// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{debug, warn};

use localview_engine::datamodel::Program;
use localview_engine::{Graph, ReuseDistanceMetric, SimulationConfig, simulate};

mod report;

use report::Report;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Simulate the memory accesses of a program and report reuse distances
#[derive(Parser, Debug)]
#[command(name = "localview", version)]
struct Args {
    /// JSON program to simulate
    path: PathBuf,
    /// Cache line size in bytes; 0 treats every element as its own line
    #[arg(long, default_value_t = 64)]
    line_bytes: i64,
    /// Reuse distances at or beyond this count as misses
    #[arg(long, default_value_t = 8)]
    threshold: i64,
    /// Per-cell metric used to rank cells: median, min, max or misses
    #[arg(long, default_value_t = ReuseDistanceMetric::Median)]
    metric: ReuseDistanceMetric,
    /// Override a free symbol, as NAME=VALUE (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_symbol)]
    symbols: Vec<(String, f64)>,
    /// Upper bound on the steps recorded per top-level map
    #[arg(long)]
    max_steps: Option<usize>,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Path to write the report to instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_symbol(arg: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{arg}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing symbol name in '{arg}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|err| format!("bad value for '{name}': {err}"))?;
    Ok((name.to_owned(), value))
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let mut config = SimulationConfig {
            cache_line_bytes: self.line_bytes,
            reuse_threshold: self.threshold,
            symbols: self.symbols.iter().cloned().collect(),
            metric: self.metric,
            ..Default::default()
        };
        if let Some(max_steps) = self.max_steps {
            config.max_trace_steps = max_steps;
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn open_program(path: &Path) -> Result<Program> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing program {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.line_bytes < 0 {
        bail!("--line-bytes must be non-negative");
    }

    let program = open_program(&args.path)?;
    let graph = Graph::try_from(&program)
        .with_context(|| format!("building graph for {}", args.path.display()))?;
    debug!(
        "loaded '{}': {} top-level maps",
        graph.name,
        graph.top_level_maps().len()
    );

    let result = simulate(&graph, &args.config());
    for failure in result.failures.iter() {
        warn!("map {} was not simulated: {}", failure.map, failure.error);
    }

    let report = Report::new(&graph, &result).context("building report")?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match args.format {
        Format::Text => report.write_text(&mut *out)?,
        Format::Json => report.write_json(&mut *out)?,
    }
    out.flush()?;

    Ok(())
}
