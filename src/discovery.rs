//! §4.10 CandidateDiscovery. Runs eight independent channel queries
//! against the Store and merges their hits into one `Candidate` per
//! unique path, accumulating signals and reasons as channels overlap.

use crate::diff::DiffEntry;
use crate::error::Result;
use crate::model::{Candidate, ResolvedTask, Signals};
use crate::stacktrace::StackFrame;
use crate::store::Store;
use std::collections::HashMap;
use std::path::Path;

pub const CHANNEL_CAP: usize = 50;

pub struct DiscoveryInput<'a> {
    pub task: &'a ResolvedTask,
    pub stack_frames: &'a [StackFrame],
    pub diff_entries: &'a [DiffEntry],
}

pub fn discover(store: &Store, input: &DiscoveryInput) -> Result<Vec<Candidate>> {
    let mut candidates: HashMap<String, Candidate> = HashMap::new();

    stacktrace_channel(store, input.stack_frames, &mut candidates)?;
    diff_channel(store, input.diff_entries, &mut candidates)?;
    symbol_name_channel(store, &symbol_lookup_terms(input.task), &mut candidates)?;
    basename_channel(store, &input.task.files_hint, &mut candidates)?;
    fulltext_channel(store, input.task, &mut candidates)?;
    graph_channel(store, input.stack_frames, input.diff_entries, &mut candidates)?;
    test_file_channel(&mut candidates);
    git_hotspot_channel(store, &mut candidates)?;

    let mut out: Vec<Candidate> = candidates.into_values().collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn entry(candidates: &mut HashMap<String, Candidate>, path: &str) -> &mut Candidate {
    candidates.entry(path.to_string()).or_insert_with(|| Candidate {
        path: path.to_string(),
        score: 0.0,
        reasons: Vec::new(),
        signals: Signals::default(),
    })
}

fn add_reason(candidates: &mut HashMap<String, Candidate>, path: &str, reason: String, set: impl FnOnce(&mut Signals)) {
    let c = entry(candidates, path);
    set(&mut c.signals);
    if !c.reasons.contains(&reason) {
        c.reasons.push(reason);
    }
}

fn stacktrace_channel(store: &Store, frames: &[StackFrame], candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    for frame in frames.iter().take(CHANNEL_CAP) {
        if store.get_file(&frame.file)?.is_none() {
            continue;
        }
        let reason = format!("stacktrace:{}", frame.line.unwrap_or(0));
        add_reason(candidates, &frame.file, reason, |s| s.stacktrace_hit = true);
    }
    Ok(())
}

fn diff_channel(store: &Store, entries: &[DiffEntry], candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    for diff_entry in entries.iter().take(CHANNEL_CAP) {
        if store.get_file(&diff_entry.file)?.is_none() {
            continue;
        }
        let status = match diff_entry.status {
            crate::diff::DiffStatus::Added => "added",
            crate::diff::DiffStatus::Modified => "modified",
            crate::diff::DiffStatus::Deleted => "deleted",
            crate::diff::DiffStatus::Renamed => "renamed",
        };
        let reason = format!("diff:{status}");
        add_reason(candidates, &diff_entry.file, reason, |s| s.diff_hit = true);
    }
    Ok(())
}

/// §4.10's symbol-match channel is keyed on `task.symbols`, which only
/// holds class/method names the extractor recognized from PascalCase or
/// camelCase tokens. A lowercase-only task description (e.g. "payment
/// webhook failing") never produces one, so the channel also tries each
/// task keyword as a fuzzy symbol-name lookup — "payment" still resolves
/// to `PaymentService` via `find_symbols_by_fuzzy`'s substring match.
/// Keywords shorter than 3 characters are skipped to avoid matching nearly
/// every symbol name in the repo.
fn symbol_lookup_terms(task: &ResolvedTask) -> Vec<String> {
    let mut terms = task.symbols.clone();
    terms.extend(task.keywords.iter().filter(|k| k.chars().count() >= 3).cloned());
    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
    terms
}

fn symbol_name_channel(store: &Store, symbols: &[String], candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    for name in symbols.iter().take(CHANNEL_CAP) {
        let mut matches = store.find_symbols_by_name(name)?;
        if matches.is_empty() {
            matches = store.find_symbols_by_fuzzy(name, CHANNEL_CAP)?;
        }
        for sym in matches {
            let reason = format!("symbol:{}", sym.name);
            add_reason(candidates, &sym.file_path, reason, |s| s.symbol_match = true);
        }
    }
    Ok(())
}

fn basename_channel(store: &Store, files_hint: &[String], candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    for hint in files_hint.iter().take(CHANNEL_CAP) {
        let basename = Path::new(hint)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(hint)
            .to_string();
        for path in store.find_files_by_basename(&basename)? {
            let reason = format!("basename:{basename}");
            add_reason(candidates, &path, reason, |s| s.symbol_match = true);
        }
    }
    Ok(())
}

fn fulltext_channel(store: &Store, task: &ResolvedTask, candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    let query = if !task.raw.trim().is_empty() {
        task.raw.clone()
    } else {
        task.keywords.join(" ")
    };
    if query.trim().is_empty() {
        return Ok(());
    }
    for (path, score) in store.fulltext_search(&query, CHANNEL_CAP)? {
        let reason = format!("fts:{score:.2}");
        add_reason(candidates, &path, reason, |s| s.keyword_match = true);
    }
    Ok(())
}

fn graph_channel(
    store: &Store,
    frames: &[StackFrame],
    entries: &[DiffEntry],
    candidates: &mut HashMap<String, Candidate>,
) -> Result<()> {
    let mut seeds: Vec<String> = frames.iter().map(|f| f.file.clone()).collect();
    seeds.extend(entries.iter().map(|e| e.file.clone()));
    seeds.truncate(CHANNEL_CAP);

    for seed in &seeds {
        for neighbor in store.neighbors_of(seed)?.into_iter().take(CHANNEL_CAP) {
            let reason = format!("graph:{seed}");
            add_reason(candidates, &neighbor, reason, |s| s.graph_related = true);
        }
    }
    Ok(())
}

fn test_file_channel(candidates: &mut HashMap<String, Candidate>) {
    for candidate in candidates.values_mut() {
        if is_test_path(&candidate.path) {
            candidate.signals.test_file = true;
            if !candidate.reasons.iter().any(|r| r == "test") {
                candidate.reasons.push("test".to_string());
            }
        }
    }
}

fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.split('/').any(|seg| seg == "tests" || seg == "test")
        || lower.contains(".test.")
        || lower.contains("_test.")
}

fn git_hotspot_channel(store: &Store, candidates: &mut HashMap<String, Candidate>) -> Result<()> {
    for (path, _score) in store.top_hotspots(CHANNEL_CAP)? {
        add_reason(candidates, &path, "hotspot".to_string(), |s| s.git_hotspot = true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileRecord, Language, SymbolKind, SymbolRecord};

    fn seeded_store() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_file(&FileRecord {
                path: "src/services/PaymentService.ts".to_string(),
                language: Language::TypeScript,
                size_bytes: 200,
                mtime_ms: 0,
                content_hash: "h1".to_string(),
            })
            .unwrap();
        store
            .index_file_content(
                "src/services/PaymentService.ts",
                "class PaymentService { handleWebhook() { return true; } }",
            )
            .unwrap();
        store
            .insert_symbol(&SymbolRecord {
                file_path: "src/services/PaymentService.ts".to_string(),
                name: "PaymentService".to_string(),
                kind: SymbolKind::Class,
                start_line: 1,
                end_line: 1,
                signature: None,
            })
            .unwrap();
        store
    }

    #[test]
    fn end_to_end_payment_webhook_scenario() {
        let store = seeded_store();
        let task = ResolvedTask {
            raw: "payment webhook failing".to_string(),
            symbols: vec!["PaymentService".to_string()],
            ..Default::default()
        };
        let input = DiscoveryInput {
            task: &task,
            stack_frames: &[],
            diff_entries: &[],
        };
        let candidates = discover(&store, &input).unwrap();
        let hit = candidates
            .iter()
            .find(|c| c.path == "src/services/PaymentService.ts")
            .expect("PaymentService.ts should be discovered");
        assert!(hit.signals.symbol_match);
        assert!(hit.signals.keyword_match);
        assert!(hit.reasons.iter().any(|r| r.starts_with("fts:")));
        assert!(hit.reasons.iter().any(|r| r == "symbol:PaymentService"));
    }

    #[test]
    fn symbol_channel_matches_via_keyword_when_no_explicit_symbol() {
        let store = seeded_store();
        // No `symbols` set — only a lowercase task description, so the
        // resolver-style entity extraction would find nothing. The channel
        // must still fuzzy-match "payment" against "PaymentService" via
        // `task.keywords`.
        let task = ResolvedTask {
            raw: "payment webhook failing".to_string(),
            keywords: vec!["payment".to_string(), "webhook".to_string(), "fail".to_string()],
            ..Default::default()
        };
        let input = DiscoveryInput {
            task: &task,
            stack_frames: &[],
            diff_entries: &[],
        };
        let candidates = discover(&store, &input).unwrap();
        let hit = candidates
            .iter()
            .find(|c| c.path == "src/services/PaymentService.ts")
            .expect("PaymentService.ts should be discovered via keyword symbol lookup");
        assert!(hit.signals.symbol_match);
        assert!(hit.reasons.iter().any(|r| r == "symbol:PaymentService"));
    }

    #[test]
    fn test_file_channel_marks_test_paths() {
        let mut candidates = HashMap::new();
        entry(&mut candidates, "src/services/payment.test.ts");
        test_file_channel(&mut candidates);
        assert!(candidates["src/services/payment.test.ts"].signals.test_file);
    }
}
