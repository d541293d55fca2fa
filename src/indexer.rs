//! §4.6 Indexer. Orchestrates scanner → symbols → imports → git → store.
//! Full indexing walks every file; incremental updates only touch the
//! changed-paths subset a caller already knows about (e.g. from a watcher
//! or `git status`). Work within a batch is parallelized with a bounded
//! rayon pool (§5); all Store writes still happen on the calling thread
//! inside one transaction, since SQLite serializes writers anyway.

use crate::config::Config;
use crate::error::Result;
use crate::git::{Git2Probe, GitProbe};
use crate::imports::ImportGraphBuilder;
use crate::model::{FileRecord, ImportEdge, SymbolRecord};
use crate::scanner::{self, ScanOptions};
use crate::store::Store;
use crate::symbols;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DEFAULT_WORKER_COUNT: usize = 8;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct IndexStats {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
    pub duration_ms: u64,
}

/// `(current, total, path)` reported after each file finishes extraction.
pub type ProgressFn<'a> = dyn Fn(usize, usize, &str) + Send + Sync + 'a;

struct FileUnit {
    record: FileRecord,
    content: String,
    symbols: Vec<SymbolRecord>,
    imports: Vec<ImportEdge>,
}

pub struct Indexer {
    repo_root: PathBuf,
    config: Config,
    worker_count: usize,
}

impl Indexer {
    pub fn new(repo_root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = n.max(1);
        self
    }

    /// Full index: scan every file, extract symbols/imports for each,
    /// probe git history once, then replace the Store's contents.
    pub fn index(&self, store: &mut Store) -> Result<IndexStats> {
        self.index_with_progress(store, None)
    }

    pub fn index_with_progress(&self, store: &mut Store, progress: Option<&ProgressFn>) -> Result<IndexStats> {
        let start = Instant::now();
        let opts = ScanOptions::from_config(self.repo_root.clone(), &self.config);
        let files = scanner::scan(&opts)?;

        // Step 3 of §4.6: skip files whose content_hash is unchanged since
        // the last index. Only new/changed files are re-read and
        // re-extracted; their symbols/imports/FTS rows are untouched
        // otherwise (§8 "Incremental correctness" applies to a full index
        // too, not just `incremental_update`).
        let existing_hashes: std::collections::HashMap<String, String> = store
            .all_files()?
            .into_iter()
            .map(|f| (f.path, f.content_hash))
            .collect();
        let scanned_paths: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();

        let changed: Vec<FileRecord> = files
            .iter()
            .filter(|f| existing_hashes.get(&f.path).map(|h| h != &f.content_hash).unwrap_or(true))
            .cloned()
            .collect();
        let file_index: HashSet<String> = scanned_paths.clone();
        let units = self.extract_units(&changed, &file_index, progress)?;

        let git_probe = Git2Probe::open(&self.repo_root);
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let git_signals = git_probe.signals_for(&paths);

        // Files that were indexed before but have disappeared from this
        // scan are removed entirely (cascades to their symbols/imports).
        let removed: Vec<String> = existing_hashes
            .keys()
            .filter(|p| !scanned_paths.contains(*p))
            .cloned()
            .collect();
        for path in &removed {
            store.delete_file(path)?;
        }

        for unit in &units {
            store.upsert_file(&unit.record)?;
            store.index_file_content(&unit.record.path, &unit.content)?;
            store.clear_symbols_for_file(&unit.record.path)?;
            for sym in &unit.symbols {
                store.insert_symbol(sym)?;
            }
            store.clear_imports_for_file(&unit.record.path)?;
            for edge in &unit.imports {
                store.insert_import(edge)?;
            }
        }
        for signal in &git_signals {
            store.upsert_git_signal(signal)?;
        }

        let totals = store.get_stats()?;
        Ok(IndexStats {
            files: files.len(),
            symbols: totals.symbol_count as usize,
            imports: totals.import_count as usize,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Re-extracts and replaces only `changed_paths` (adds or modifies);
    /// paths no longer present on disk are removed from the Store. The
    /// file index used for import resolution is rebuilt from the Store's
    /// current contents merged with the changed set, so relative imports
    /// into untouched files still resolve.
    pub fn incremental_update(&self, store: &mut Store, changed_paths: &[String]) -> Result<IndexStats> {
        let start = Instant::now();
        let mut file_index: HashSet<String> = store.all_files()?.into_iter().map(|f| f.path).collect();

        let mut present = Vec::new();
        let mut removed = Vec::new();
        for rel in changed_paths {
            let abs = self.repo_root.join(rel);
            if abs.exists() {
                present.push(rel.clone());
            } else {
                removed.push(rel.clone());
            }
        }
        file_index.retain(|p| !removed.contains(p));
        for p in &present {
            file_index.insert(p.clone());
        }

        let existing_hashes: std::collections::HashMap<String, String> = store
            .all_files()?
            .into_iter()
            .map(|f| (f.path, f.content_hash))
            .collect();

        let mut files = Vec::new();
        for rel in &present {
            let abs = self.repo_root.join(rel);
            let bytes = match std::fs::read(&abs) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("incremental_update: read failed for {rel}: {e}");
                    continue;
                }
            };
            let hash = scanner::hash_bytes(&bytes);
            if existing_hashes.get(rel).map(|h| h == &hash).unwrap_or(false) {
                // Step 3 of §4.6: unchanged bytes mean this path's
                // symbols/imports/FTS rows are left exactly as they are.
                continue;
            }
            let meta = std::fs::metadata(&abs).ok();
            let ext = Path::new(rel).extension().and_then(|e| e.to_str()).unwrap_or("");
            files.push(FileRecord {
                path: rel.clone(),
                language: crate::model::Language::from_extension(ext),
                size_bytes: bytes.len() as u64,
                mtime_ms: meta
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0),
                content_hash: hash,
            });
        }

        let units = self.extract_units(&files, &file_index, None)?;

        for rel in &removed {
            store.delete_file(rel)?;
        }

        let mut symbol_count = 0usize;
        let mut import_count = 0usize;
        for unit in &units {
            store.upsert_file(&unit.record)?;
            store.index_file_content(&unit.record.path, &unit.content)?;
            store.clear_symbols_for_file(&unit.record.path)?;
            for sym in &unit.symbols {
                store.insert_symbol(sym)?;
                symbol_count += 1;
            }
            store.clear_imports_for_file(&unit.record.path)?;
            for edge in &unit.imports {
                store.insert_import(edge)?;
                import_count += 1;
            }
        }

        let git_probe = Git2Probe::open(&self.repo_root);
        let touched_paths: Vec<String> = units.iter().map(|u| u.record.path.clone()).collect();
        for signal in git_probe.signals_for(&touched_paths) {
            store.upsert_git_signal(&signal)?;
        }

        Ok(IndexStats {
            files: units.len(),
            symbols: symbol_count,
            imports: import_count,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn extract_units(
        &self,
        files: &[FileRecord],
        file_index: &HashSet<String>,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<FileUnit>> {
        let total = files.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .build()
            .map_err(|e| crate::error::ContextError::Config(e.to_string()))?;

        let builder = ImportGraphBuilder::new(file_index.clone());
        let repo_root = self.repo_root.clone();

        let units: Vec<FileUnit> = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .filter_map(|(i, record)| {
                    let abs = repo_root.join(&record.path);
                    let content = match std::fs::read_to_string(&abs) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::debug!("skipping non-utf8 or unreadable file {}: {e}", record.path);
                            return None;
                        }
                    };
                    let syms = symbols::extract_symbols(&record.path, record.language, &content);
                    let imports = builder.extract(&record.path, record.language, &content);
                    if let Some(cb) = progress {
                        cb(i + 1, total, &record.path);
                    }
                    Some(FileUnit {
                        record: record.clone(),
                        content,
                        symbols: syms,
                        imports,
                    })
                })
                .collect()
        });

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let full = dir.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    #[test]
    fn full_index_populates_store() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "src/services/PaymentService.ts",
            "export class PaymentService {\n  handleWebhook() {\n    return true;\n  }\n}\n",
        );
        write(
            dir.path(),
            "src/routes/checkout.ts",
            "import { PaymentService } from '../services/PaymentService';\n",
        );

        let indexer = Indexer::new(dir.path(), Config::default());
        let mut store = Store::open_in_memory().unwrap();
        let stats = indexer.index(&mut store).unwrap();

        assert_eq!(stats.files, 2);
        assert!(stats.symbols >= 1);
        assert_eq!(stats.imports, 1);

        let neighbors = store.neighbors_of("src/routes/checkout.ts").unwrap();
        assert_eq!(neighbors, vec!["src/services/PaymentService.ts".to_string()]);
    }

    #[test]
    fn reindex_skips_files_with_unchanged_hash() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "pub struct Foo;\n");
        let indexer = Indexer::new(dir.path(), Config::default());
        let mut store = Store::open_in_memory().unwrap();
        indexer.index(&mut store).unwrap();

        let before = store.get_file("a.rs").unwrap().unwrap();
        let before_symbols = store.find_symbols_by_name("Foo").unwrap();
        assert_eq!(before_symbols.len(), 1);

        // Re-index without touching the file: the stored hash, and the
        // symbol row derived from it, must be untouched (§8 "Incremental
        // correctness" applies to a full index too).
        indexer.index(&mut store).unwrap();
        let after = store.get_file("a.rs").unwrap().unwrap();
        assert_eq!(before.content_hash, after.content_hash);
        assert_eq!(store.find_symbols_by_name("Foo").unwrap(), before_symbols);
    }

    #[test]
    fn full_reindex_drops_files_removed_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "pub fn a() {}\n");
        write(dir.path(), "b.rs", "pub fn b() {}\n");
        let indexer = Indexer::new(dir.path(), Config::default());
        let mut store = Store::open_in_memory().unwrap();
        indexer.index(&mut store).unwrap();
        assert!(store.get_file("b.rs").unwrap().is_some());

        fs::remove_file(dir.path().join("b.rs")).unwrap();
        indexer.index(&mut store).unwrap();
        assert!(store.get_file("b.rs").unwrap().is_none());
        assert!(store.get_file("a.rs").unwrap().is_some());
    }

    #[test]
    fn incremental_update_removes_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}\n");
        let indexer = Indexer::new(dir.path(), Config::default());
        let mut store = Store::open_in_memory().unwrap();
        indexer.index(&mut store).unwrap();
        assert!(store.get_file("a.rs").unwrap().is_some());

        fs::remove_file(dir.path().join("a.rs")).unwrap();
        indexer
            .incremental_update(&mut store, &["a.rs".to_string()])
            .unwrap();
        assert!(store.get_file("a.rs").unwrap().is_none());
    }
}
