//! subc
//!
//! A compiler for a small subset of C, emitting x86-64 assembly.

mod backend;
mod driver;
mod frontend;
mod utils;

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use log::LevelFilter;

/// subc compiler
#[derive(Parser, Debug)]
#[command(name = "subc")]
#[command(version = "0.1.0")]
#[command(about = "Compiles a small subset of C to x86-64 assembly")]
struct Cli {
    /// C source text (the literal program)
    #[arg(value_name = "SOURCE", conflicts_with = "file")]
    source: Option<String>,

    /// Read the program from a file instead
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Write assembly to a file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the token stream, one lexeme per line, and stop
    #[arg(long)]
    emit_tokens: bool,

    /// Print the parsed AST as JSON and stop
    #[arg(long)]
    emit_ast: bool,

    /// Run lexing, parsing and analysis only
    #[arg(long)]
    check: bool,

    /// Log scope construction
    #[arg(long)]
    scope: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.scope);

    if let Err(e) = run(&cli) {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn init_logger(scope: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if scope {
        builder
            .filter_module("subc::frontend::symbols", LevelFilter::Debug)
            .filter_module("subc::frontend::semantic", LevelFilter::Debug);
    }
    builder.init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = load_source(cli)?;
    // Compile errors are rendered against the source before they leave here
    let diagnose = |e: utils::Error| anyhow!(e.render(&source));

    let text = if cli.emit_tokens {
        let mut lines = driver::tokens(&source).map_err(diagnose)?.join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }
        lines
    } else if cli.emit_ast {
        let program = driver::parse(&source).map_err(diagnose)?;
        let mut json = serde_json::to_string_pretty(&program).context("failed to serialize AST")?;
        json.push('\n');
        json
    } else if cli.check {
        let (program, _) = driver::check(&source).map_err(diagnose)?;
        eprintln!("ok: {} functions", program.functions.len());
        return Ok(());
    } else {
        driver::compile(&source).map_err(diagnose)?
    };

    match &cli.output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn load_source(cli: &Cli) -> anyhow::Result<String> {
    match (&cli.source, &cli.file) {
        (Some(text), None) => Ok(text.clone()),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => bail!("expected program text or --file <FILE>; see --help"),
    }
}
