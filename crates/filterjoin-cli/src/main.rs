//! Filterjoin CLI
//!
//! Command-line front end for the join compiler:
//! - `compile`: rewrite a search document (or multi-search body) in place
//! - `verify`: validate every join specification without rewriting
//! - `locate`: list where join specifications occur in a document

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use filterjoin_compiler::{CompilerConfig, JoinCompiler};
use filterjoin_dsl::JoinLabel;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

mod logging;

#[derive(Parser)]
#[command(name = "filterjoin")]
#[command(
    author,
    version,
    about = "Compile declarative join_set / join_sequence specifications into filterjoin clauses"
)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON config file. `FILTERJOIN_SENTINEL_INDEX` overrides it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite every join specification into nested filterjoin clauses.
    Compile {
        /// Input document (stdin when omitted)
        input: Option<PathBuf>,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Treat the input as a newline-delimited multi-search body
        #[arg(long)]
        msearch: bool,
        /// Pretty-print the rewritten document
        #[arg(long, conflicts_with = "msearch")]
        pretty: bool,
    },

    /// Validate every join specification without rewriting anything.
    Verify {
        /// Input document (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Print the location of every join specification.
    Locate {
        /// Input document (stdin when omitted)
        input: Option<PathBuf>,
        /// Emit a JSON array instead of `label<TAB>pointer` lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let compiler = JoinCompiler::new(load_config(cli.config.as_deref())?);

    match cli.command {
        Commands::Compile {
            input,
            out,
            msearch,
            pretty,
        } => cmd_compile(&compiler, input.as_deref(), out.as_deref(), msearch, pretty),
        Commands::Verify { input } => cmd_verify(&compiler, input.as_deref()),
        Commands::Locate { input, json } => cmd_locate(input.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    let config = match path {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    let config = config.with_env_overrides()?;
    tracing::info!(sentinel_index = %config.sentinel_index, "loaded compiler config");
    Ok(config)
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn parse_document(text: &str, input: Option<&Path>) -> Result<Value> {
    serde_json::from_str(text).with_context(|| {
        format!(
            "{} is not a JSON document",
            input.map_or_else(|| "stdin".to_string(), |p| p.display().to_string())
        )
    })
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_compile(
    compiler: &JoinCompiler,
    input: Option<&Path>,
    out: Option<&Path>,
    msearch: bool,
    pretty: bool,
) -> Result<()> {
    let text = read_input(input)?;

    if msearch {
        let rewrite = compiler.rewrite_msearch(&text)?;
        eprintln!(
            "{} rewrote {} searches (join_set={} join_sequence={} clauses={})",
            "ok".green().bold(),
            rewrite.searches,
            rewrite.report.join_sets,
            rewrite.report.join_sequences,
            rewrite.report.clauses
        );
        return write_output(out, &rewrite.body);
    }

    let mut document = parse_document(&text, input)?;
    let report = compiler.compile_document(&mut document)?;
    eprintln!(
        "{} rewrote document (join_set={} join_sequence={} clauses={})",
        "ok".green().bold(),
        report.join_sets,
        report.join_sequences,
        report.clauses
    );

    let mut rendered = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    rendered.push('\n');
    write_output(out, &rendered)
}

fn cmd_verify(compiler: &JoinCompiler, input: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let document = parse_document(&text, input)?;
    let report = compiler.verify_document(&document)?;
    eprintln!("{} all join specifications are valid", "ok".green().bold());
    println!(
        "join_set={} join_sequence={}",
        report.join_sets, report.join_sequences
    );
    Ok(())
}

fn cmd_locate(input: Option<&Path>, as_json: bool) -> Result<()> {
    let text = read_input(input)?;
    let document = parse_document(&text, input)?;
    let found = filterjoin_compiler::locate(&document, &JoinLabel::ALL)?;

    if as_json {
        let entries: Vec<Value> = found
            .iter()
            .map(|located| json!({"label": located.label, "at": located.at.to_string()}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for located in &found {
            println!("{}\t{}", located.label, located.at);
        }
    }
    Ok(())
}
