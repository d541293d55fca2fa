//! Thin CLI surface wrapping the library. The spinner/progress UI and any
//! richer frontend are explicitly out of scope (spec §1) — this binds
//! `clap` subcommands directly onto `Indexer`/`TaskResolver`/`PackComposer`
//! with plain `tracing` progress lines.

use crate::config::{self, Config};
use crate::discovery::{self, DiscoveryInput};
use crate::domains::DomainManager;
use crate::error::{ContextError, Result};
use crate::excerpt::{ExcerptExtractor, Snapshot};
use crate::git::Git2Probe;
use crate::indexer::Indexer;
use crate::model::{Excerpt, SymbolRecord};
use crate::pack::{self, PackInput};
use crate::resolver::{TaskInput, TaskResolver};
use crate::store::Store;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ctxpack")]
#[command(version)]
#[command(about = "Task-aware code-context packer")]
pub struct Cli {
    /// Repository root to operate on.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full or incremental index of the repository into `.context/index.db`.
    Index {
        /// Re-index only these repo-relative paths instead of a full scan.
        #[arg(long)]
        changed: Vec<String>,
    },
    /// Resolve a task description (and optional error/diff text) into a
    /// `ResolvedTask`, printed as JSON.
    Resolve {
        /// Free-form task description.
        task: Option<String>,
        #[arg(long)]
        error: Option<String>,
        #[arg(long)]
        diff: Option<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long = "symbol")]
        symbols: Vec<String>,
    },
    /// Resolve, discover, score, and write a context pack under
    /// `.context/packs/<timestamp>-<hash>/`.
    Pack {
        task: Option<String>,
        #[arg(long)]
        error: Option<String>,
        #[arg(long)]
        diff: Option<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long = "symbol")]
        symbols: Vec<String>,
        #[arg(long)]
        budget_tokens: Option<usize>,
        #[arg(long)]
        full: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let root = cli.root;
    let cfg = config::load_config(&root)?;

    match cli.command {
        Command::Index { changed } => run_index(&root, &cfg, &changed),
        Command::Resolve {
            task,
            error,
            diff,
            files,
            symbols,
        } => run_resolve(&cfg, task, error, diff, files, symbols),
        Command::Pack {
            task,
            error,
            diff,
            files,
            symbols,
            budget_tokens,
            full,
        } => run_pack(&root, &cfg, task, error, diff, files, symbols, budget_tokens, full),
    }
}

fn run_index(root: &std::path::Path, cfg: &Config, changed: &[String]) -> Result<()> {
    let mut store = Store::open(&config::index_db_path(root))?;
    let indexer = Indexer::new(root.to_path_buf(), cfg.clone());
    let stats = if changed.is_empty() {
        indexer.index(&mut store)?
    } else {
        indexer.incremental_update(&mut store, changed)?
    };
    tracing::info!(
        files = stats.files,
        symbols = stats.symbols,
        imports = stats.imports,
        duration_ms = stats.duration_ms,
        "index complete"
    );
    println!("{}", serde_json::to_string_pretty(&stats).unwrap());
    Ok(())
}

fn build_task_input(
    task: Option<String>,
    error: Option<String>,
    diff: Option<String>,
    files: Vec<String>,
    symbols: Vec<String>,
) -> TaskInput {
    TaskInput {
        task,
        error,
        diff,
        files,
        symbols,
    }
}

fn run_resolve(
    cfg: &Config,
    task: Option<String>,
    error: Option<String>,
    diff: Option<String>,
    files: Vec<String>,
    symbols: Vec<String>,
) -> Result<()> {
    let resolver = TaskResolver::new(DomainManager::new(&cfg.custom_domains));
    let input = build_task_input(task, error, diff, files, symbols);
    let resolved = resolver.resolve(&input);
    println!("{}", serde_json::to_string_pretty(&resolved).unwrap());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_pack(
    root: &std::path::Path,
    cfg: &Config,
    task: Option<String>,
    error: Option<String>,
    diff: Option<String>,
    files: Vec<String>,
    symbols: Vec<String>,
    budget_tokens: Option<usize>,
    full: bool,
) -> Result<()> {
    if task.is_none() && error.is_none() && diff.is_none() && files.is_empty() && symbols.is_empty() {
        return Err(ContextError::Config(
            "at least one of task, error, diff, file, or symbol is required".to_string(),
        ));
    }

    let store = Store::open(&config::index_db_path(root))?;
    let domain_manager = DomainManager::new(&cfg.custom_domains);
    let resolver = TaskResolver::new(DomainManager::new(&cfg.custom_domains));
    let input = build_task_input(task, error.clone(), diff.clone(), files, symbols);
    let resolved = resolver.resolve(&input);

    let stack_frames = error.as_deref().map(crate::stacktrace::parse).unwrap_or_default();
    let diff_entries = diff.as_deref().map(crate::diff::parse).unwrap_or_default();

    let discovery_input = DiscoveryInput {
        task: &resolved,
        stack_frames: &stack_frames,
        diff_entries: &diff_entries,
    };
    let candidates = discovery::discover(&store, &discovery_input)?;

    let weights = cfg.weights;
    let ranked = crate::scorer::score(candidates, &resolved, &weights, &domain_manager);

    let snapshot = if full { Snapshot::Full } else { Snapshot::Excerpts };
    let excerpts = build_excerpts(root, &store, &ranked, &stack_frames, &diff_entries, snapshot)?;

    let git_probe = Git2Probe::open(root);
    let commit_base = git_probe.head_commit();

    let output = pack::compose(PackInput {
        task: &resolved,
        candidates: &ranked,
        excerpts: &excerpts,
        budget_tokens: budget_tokens.unwrap_or(cfg.budget_tokens),
        commit_base,
        timestamp: chrono::Utc::now().to_rfc3339(),
        warnings: Vec::new(),
    });

    write_pack(root, &output)?;
    Ok(())
}

fn build_excerpts(
    root: &std::path::Path,
    store: &Store,
    ranked: &[crate::model::Candidate],
    stack_frames: &[crate::stacktrace::StackFrame],
    diff_entries: &[crate::diff::DiffEntry],
    snapshot: Snapshot,
) -> Result<HashMap<String, Excerpt>> {
    let mut hit_lines: HashMap<String, u32> = HashMap::new();
    for frame in stack_frames {
        if let Some(line) = frame.line {
            hit_lines.entry(frame.file.clone()).or_insert(line);
        }
    }

    let mut excerpts = HashMap::new();
    for candidate in ranked {
        let abs = root.join(&candidate.path);
        let content = match std::fs::read_to_string(&abs) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("pack: skipping unreadable {}: {e}", candidate.path);
                continue;
            }
        };

        let hit_line = hit_lines.get(&candidate.path).copied().or_else(|| {
            diff_entries
                .iter()
                .find(|d| d.file == candidate.path)
                .map(|_| 1)
        });

        let symbol: Option<SymbolRecord> = store
            .find_symbols_by_name(
                candidate
                    .reasons
                    .iter()
                    .find_map(|r| r.strip_prefix("symbol:"))
                    .unwrap_or(""),
            )?
            .into_iter()
            .find(|s| s.file_path == candidate.path);

        let excerpt = ExcerptExtractor::extract(&candidate.path, &content, hit_line, symbol.as_ref(), snapshot);
        excerpts.insert(candidate.path.clone(), excerpt);
    }
    Ok(excerpts)
}

fn write_pack(root: &std::path::Path, output: &pack::PackOutput) -> Result<()> {
    let short_hash = format!("{:x}", md5::compute(output.manifest.timestamp.as_bytes()))
        .chars()
        .take(8)
        .collect::<String>();
    let dir_name = format!("{}-{}", sanitize_timestamp(&output.manifest.timestamp), short_hash);
    let dir = config::packs_dir(root).join(dir_name);
    std::fs::create_dir_all(&dir).map_err(|e| ContextError::io(dir.clone(), e))?;

    std::fs::write(dir.join("context.md"), &output.markdown).map_err(|e| ContextError::io(dir.clone(), e))?;
    let json = serde_json::to_string_pretty(&output.manifest)
        .map_err(|e| ContextError::Config(format!("manifest serialization failed: {e}")))?;
    std::fs::write(dir.join("context.json"), json).map_err(|e| ContextError::io(dir.clone(), e))?;

    println!("{}", dir.display());
    Ok(())
}

fn sanitize_timestamp(ts: &str) -> String {
    ts.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}
