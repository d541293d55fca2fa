//! §4.2 FileScanner. Walks a repository root, honoring `.gitignore`-style
//! exclusions layered under a built-in noise list and an optional
//! `.contextignore`, and yields `FileRecord`s with a freshly computed
//! content hash. Grounded on the teacher's `scan_workspace` (override-based
//! `ignore::WalkBuilder` usage), generalized to spec's include/exclude glob
//! lists and md5-based hashing.

use crate::config::{is_builtin_binary_extension, Config, BUILTIN_EXCLUDE_DIRS};
use crate::error::{ContextError, Result};
use crate::model::{FileRecord, Language};
use glob::Pattern;
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root_dir: PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_file_size: u64,
}

impl ScanOptions {
    pub fn from_config(root_dir: PathBuf, cfg: &Config) -> Self {
        Self {
            root_dir,
            include_patterns: cfg.include_patterns.clone(),
            exclude_patterns: cfg.exclude_patterns.clone(),
            max_file_size: cfg.max_file_size,
        }
    }
}

fn builtin_overrides(root: &Path, extra_excludes: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);
    for d in BUILTIN_EXCLUDE_DIRS {
        ob.add(&format!("!**/{d}"))
            .map_err(|e| ContextError::Config(e.to_string()))?;
        ob.add(&format!("!**/{d}/**"))
            .map_err(|e| ContextError::Config(e.to_string()))?;
    }
    ob.add("!**/*.min.*")
        .map_err(|e| ContextError::Config(e.to_string()))?;
    for pat in extra_excludes {
        let pat = pat.trim();
        if pat.is_empty() {
            continue;
        }
        let negated = format!("!{pat}");
        ob.add(&negated)
            .map_err(|e| ContextError::Config(e.to_string()))?;
    }
    ob.build().map_err(|e| ContextError::Config(e.to_string()))
}

fn matches_any(patterns: &[Pattern], rel_path: &str) -> bool {
    patterns.iter().any(|p| p.matches(rel_path))
}

/// Walk `opts.root_dir`, returning `FileRecord`s for every recognized,
/// size-bounded, non-excluded source file. Symlinks outside the root are
/// never followed; hidden directories (leading `.`) are skipped by the
/// underlying `ignore` walker's standard filters, except the root itself.
pub fn scan(opts: &ScanOptions) -> Result<Vec<FileRecord>> {
    let overrides = builtin_overrides(&opts.root_dir, &opts.exclude_patterns)?;
    let include: Vec<Pattern> = opts
        .include_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    let mut walker = WalkBuilder::new(&opts.root_dir);
    walker
        .standard_filters(true)
        .follow_links(false)
        .overrides(overrides)
        .add_custom_ignore_filename(".contextignore");

    let mut out = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("scan: skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = entry.into_path();
        let rel_path = match abs_path.strip_prefix(&opts.root_dir) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        let rel_str = normalize_path(&rel_path);

        if !include.is_empty() && !matches_any(&include, &rel_str) {
            continue;
        }

        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        if is_builtin_binary_extension(&ext) {
            continue;
        }

        let meta = match std::fs::metadata(&abs_path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("scan: stat failed for {}: {e}", abs_path.display());
                continue;
            }
        };
        let size_bytes = meta.len();
        if size_bytes == 0 || size_bytes > opts.max_file_size {
            if size_bytes > opts.max_file_size {
                tracing::debug!(
                    "scan: skipping {} ({} bytes > max {})",
                    rel_str,
                    size_bytes,
                    opts.max_file_size
                );
            }
            continue;
        }

        let bytes = match std::fs::read(&abs_path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("scan: read failed for {}: {e}", abs_path.display());
                continue;
            }
        };

        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        out.push(FileRecord {
            path: rel_str,
            language: Language::from_extension(&ext),
            size_bytes,
            mtime_ms,
            content_hash: hash_bytes(&bytes),
        });
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

/// Non-cryptographic-strength hex MD5 of file bytes, per spec §4.2:
/// collisions only affect incremental-update soundness, negligible in
/// practice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

pub fn normalize_path(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let full = dir.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    #[test]
    fn scans_and_skips_builtin_noise() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}\n");
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = 1;\n");
        write(dir.path(), "target/debug/x", "binary-ish");

        let opts = ScanOptions {
            root_dir: dir.path().to_path_buf(),
            include_patterns: vec![],
            exclude_patterns: vec![],
            max_file_size: 1_000_000,
        };
        let files = scan(&opts).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"src/main.rs"));
        assert!(!paths.iter().any(|p| p.contains("node_modules")));
        assert!(!paths.iter().any(|p| p.contains("target")));
    }

    #[test]
    fn respects_max_file_size() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.txt", &"x".repeat(100));
        let opts = ScanOptions {
            root_dir: dir.path().to_path_buf(),
            include_patterns: vec![],
            exclude_patterns: vec![],
            max_file_size: 10,
        };
        let files = scan(&opts).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn content_hash_stable_for_unchanged_bytes() {
        let a = hash_bytes(b"hello world");
        let b = hash_bytes(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
