// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ballotwerk — command-line front end.
//
// Interprets one scanned sheet against an election layout and prints the
// result as JSON on stdout. Logs and review messages go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ballotwerk_core::config::InterpreterConfig;
use ballotwerk_core::error::Result;
use ballotwerk_core::fingerprint::election_fingerprint;
use ballotwerk_core::human_errors::{
    HumanMessage, explain_adjudication, explain_castability, explain_unreadable,
};
use ballotwerk_core::layout::ElectionLayout;
use ballotwerk_core::types::{InterpretedSheet, PageInterpretation};
use ballotwerk_interpret::{RasterImage, SheetContext, interpret_sheet};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

/// Ballot sheet interpretation.
#[derive(Parser, Debug)]
#[command(name = "ballotwerk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interpret the front and back scans of one sheet
    Interpret(InterpretArgs),
    /// Print the fingerprint of an election layout
    Fingerprint {
        /// Election layout JSON
        #[arg(long)]
        layout: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct InterpretArgs {
    /// Election layout JSON
    #[arg(long)]
    layout: PathBuf,

    /// Scan of the front side
    #[arg(long)]
    front: PathBuf,

    /// Scan of the back side
    #[arg(long)]
    back: PathBuf,

    /// Interpreter configuration JSON (omitted fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Expected election fingerprint; computed from the layout when absent
    #[arg(long)]
    fingerprint: Option<String>,

    /// Accept test ballots instead of live ballots
    #[arg(long, action = clap::ArgAction::SetTrue)]
    test_mode: bool,

    /// Reject pages from any other precinct
    #[arg(long)]
    precinct: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Interpret(args) => run_interpret(&args),
        Command::Fingerprint { layout } => run_fingerprint(&layout),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// -- Commands -----------------------------------------------------------------

fn run_interpret(args: &InterpretArgs) -> Result<()> {
    let layout = load_layout(&args.layout)?;
    let config = build_config(args, &layout)?;

    let front = RasterImage::open(&args.front)?;
    let back = RasterImage::open(&args.back)?;
    let ctx = SheetContext::new(sheet_label(&args.front));

    let result = interpret_sheet(front, back, &layout, &config, &ctx)?;
    report_review(&result);

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}

fn run_fingerprint(path: &Path) -> Result<()> {
    let layout = load_layout(path)?;
    println!("{}", election_fingerprint(&layout)?);
    Ok(())
}

// -- Helpers ------------------------------------------------------------------

fn load_layout(path: &Path) -> Result<ElectionLayout> {
    let text = fs::read_to_string(path)?;
    let layout: ElectionLayout = serde_json::from_str(&text)?;
    debug!(path = %path.display(), styles = layout.ballot_styles.len(), "Layout loaded");
    Ok(layout)
}

/// Config file first, then command-line overrides. Without any fingerprint
/// the one computed from the layout is expected.
fn build_config(args: &InterpretArgs, layout: &ElectionLayout) -> Result<InterpreterConfig> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => InterpreterConfig::default(),
    };
    if let Some(fingerprint) = &args.fingerprint {
        config.election_fingerprint = fingerprint.to_ascii_lowercase();
    }
    if config.election_fingerprint.is_empty() {
        config.election_fingerprint = election_fingerprint(layout)?;
    }
    if args.test_mode {
        config.test_mode = true;
    }
    if let Some(precinct) = &args.precinct {
        config.expected_precinct_id = Some(precinct.clone());
    }
    Ok(config)
}

fn sheet_label(front: &Path) -> String {
    front
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".into())
}

/// Operator-facing messages for anything that needs attention.
fn report_review(result: &InterpretedSheet) {
    for (side, page) in [("front", &result.sheet.front), ("back", &result.sheet.back)] {
        if let PageInterpretation::UnreadablePage { reason } = page {
            print_message(side, &explain_unreadable(reason));
        }
        if let Some(info) = page.adjudication_info() {
            for finding in &info.enabled_reason_infos {
                print_message(side, &explain_adjudication(finding));
            }
        }
    }
    let summary = explain_castability(result.castability);
    info!(castability = ?result.castability, "{}", summary.message);
}

fn print_message(side: &str, message: &HumanMessage) {
    eprintln!(
        "[{side}] {:?}: {} ({})",
        message.severity, message.message, message.suggestion
    );
}
