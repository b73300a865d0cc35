use anyhow::{anyhow, Context, Result};
use blockpatch::{
    by_name, EditOutcome, Interaction, MutationEngine, ParseOutcome, ProseSink,
    ScriptedInteraction, SessionContext, StreamParser, TerminalInteraction, DIALECT_NAMES,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "blockpatch")]
#[command(about = "Streaming block-edit parser and safe file patcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a generated response and apply its edits to a workspace
    Apply {
        /// Path to workspace root (current directory if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Response file to parse, or `-` for stdin
        #[arg(short, long)]
        response: PathBuf,

        /// Files (or directories) in scope, relative to the workspace
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Wire dialect of the response
        #[arg(short, long, default_value = "block")]
        dialect: String,

        /// Answer yes to every confirmation (deletions, conflicts)
        #[arg(short, long)]
        yes: bool,

        /// Show unified diffs of the changes after applying
        #[arg(long)]
        diff: bool,
    },

    /// Parse a response and show the planned edits without touching disk
    Preview {
        /// Path to workspace root (current directory if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Response file to parse, or `-` for stdin
        #[arg(short, long)]
        response: PathBuf,

        /// Files (or directories) in scope, relative to the workspace
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Wire dialect of the response
        #[arg(short, long, default_value = "block")]
        dialect: String,

        /// Show full unified diffs instead of block previews
        #[arg(long)]
        diff: bool,
    },

    /// List the supported wire dialects
    Dialects,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            workspace,
            response,
            paths,
            dialect,
            yes,
            diff,
        } => cmd_apply(workspace, response, paths, dialect, yes, diff),

        Commands::Preview {
            workspace,
            response,
            paths,
            dialect,
            diff,
        } => cmd_preview(workspace, response, paths, dialect, diff),

        Commands::Dialects => {
            for name in DIALECT_NAMES {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

/// Prose goes straight to the terminal as it is recognized.
struct StdoutSink;

impl ProseSink for StdoutSink {
    fn prose(&mut self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    response: PathBuf,
    paths: Vec<PathBuf>,
    dialect: String,
    yes: bool,
    diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let mut ctx = SessionContext::new(&workspace);
    track_scope(&mut ctx, &workspace, &paths)?;

    let outcome = parse_response(&ctx, &dialect, &response)?;
    report_block_errors(&outcome);
    if outcome.edits.is_empty() {
        println!("{}", "No edits in response.".dimmed());
        return Ok(());
    }

    // Diffs are computed against the snapshots, so they have to be printed
    // before the engine rewrites anything.
    if diff {
        print_planned_diffs(&ctx, &outcome)?;
    }

    let mut interaction: Box<dyn Interaction> = if yes {
        Box::new(ScriptedInteraction::always(true))
    } else {
        Box::new(TerminalInteraction)
    };

    let mut engine = MutationEngine::new(&mut ctx, &mut *interaction);
    let outcomes = engine
        .apply(outcome.edits)
        .context("batch aborted; earlier edits in the batch remain applied")?;

    for result in &outcomes {
        let line = result.to_string();
        match result {
            EditOutcome::Applied { .. } | EditOutcome::Created { .. } => {
                println!("{}", line.green())
            }
            EditOutcome::Deleted { .. } => println!("{}", line.red()),
            _ => println!("{}", line.yellow()),
        }
    }

    Ok(())
}

fn cmd_preview(
    workspace: Option<PathBuf>,
    response: PathBuf,
    paths: Vec<PathBuf>,
    dialect: String,
    diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let mut ctx = SessionContext::new(&workspace);
    track_scope(&mut ctx, &workspace, &paths)?;

    let outcome = parse_response(&ctx, &dialect, &response)?;
    report_block_errors(&outcome);
    if outcome.edits.is_empty() {
        println!("{}", "No edits in response.".dimmed());
        return Ok(());
    }

    if diff {
        print_planned_diffs(&ctx, &outcome)?;
    } else {
        for (display, edit) in outcome.displays.iter().zip(outcome.edits.iter()) {
            let added: Vec<String> = edit
                .replacements
                .iter()
                .flat_map(|r| r.new_lines.iter().cloned())
                .collect();
            print!("{}", display.preview(&added));
        }
    }

    Ok(())
}

/// Render each edit as a full unified diff of its file, snapshot vs planned
/// content.
fn print_planned_diffs(ctx: &SessionContext, outcome: &ParseOutcome) -> Result<()> {
    for edit in &outcome.edits {
        if edit.is_deletion {
            println!("{}", format!("--- {} (deleted)", edit.path.display()).red());
            continue;
        }
        let snapshot = ctx
            .snapshot(&edit.path)
            .map(|s| s.lines.clone())
            .unwrap_or_default();
        let new_lines = edit
            .updated_lines(&snapshot)
            .with_context(|| format!("invalid replacements for {}", edit.path.display()))?;
        print_diff(&edit.path, &snapshot.join("\n"), &new_lines.join("\n"));
    }
    Ok(())
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    let workspace = match workspace {
        Some(path) => path,
        None => env::current_dir().context("cannot determine current directory")?,
    };
    workspace
        .canonicalize()
        .with_context(|| format!("workspace does not exist: {}", workspace.display()))
}

/// Admit the given paths into the working set; directories are walked
/// recursively, skipping hidden entries.
fn track_scope(ctx: &mut SessionContext, workspace: &Path, paths: &[PathBuf]) -> Result<usize> {
    let mut tracked = 0;
    for path in paths {
        let abs = workspace.join(path);
        if abs.is_dir() {
            let walker = WalkDir::new(&abs).into_iter().filter_entry(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.') && name != ".")
            });
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry.path().strip_prefix(workspace)?;
                if ctx.track(rel).is_ok() {
                    tracked += 1;
                } else {
                    log::debug!("skipping unreadable file {}", rel.display());
                }
            }
        } else {
            ctx.track(path.clone())
                .with_context(|| format!("cannot track {}", path.display()))?;
            tracked += 1;
        }
    }
    log::info!("{} files in scope", tracked);
    Ok(tracked)
}

fn parse_response(ctx: &SessionContext, dialect: &str, response: &Path) -> Result<ParseOutcome> {
    let dialect = by_name(dialect)
        .ok_or_else(|| anyhow!("unknown dialect '{}' (known: {})", dialect, DIALECT_NAMES.join(", ")))?;

    let text = if response == Path::new("-") {
        io::read_to_string(io::stdin()).context("cannot read response from stdin")?
    } else {
        fs::read_to_string(response)
            .with_context(|| format!("cannot read response file {}", response.display()))?
    };

    let mut sink = StdoutSink;
    let mut parser = StreamParser::new(ctx, dialect.as_ref(), &mut sink);
    parser.push(&text);
    parser.finish().context("response was cut off mid-block")
}

fn report_block_errors(outcome: &ParseOutcome) {
    for err in &outcome.block_errors {
        eprintln!("{}", format!("warning: discarded block: {}", err).yellow());
    }
}

fn print_diff(path: &Path, old: &str, new: &str) {
    println!("{}", format!("--- {} (before)", path.display()).dimmed());
    println!("{}", format!("+++ {} (after)", path.display()).dimmed());
    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).dimmed(),
        };
        print!("{}", line);
    }
}
