//! Project configuration (spec §6). `.context/config.toml` at the repo
//! root; format-neutral per the spec but this implementation settles on
//! TOML, matching the teacher repo's `toml` dependency. Unknown keys are
//! rejected rather than silently ignored — see Design Notes §9 ("do not
//! imitate open-ended keyword maps").

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard safety ceiling: files larger than this are always skipped,
/// regardless of config (spec §4.2 default is 1 MiB).
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CustomDomain {
    pub description: String,
    pub keywords: Vec<String>,
}

impl Default for CustomDomain {
    fn default() -> Self {
        Self {
            description: String::new(),
            keywords: Vec::new(),
        }
    }
}

/// Scorer weight overrides (spec §4.11 defaults). Any field left unset in
/// the config keeps the built-in default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Weights {
    pub stacktrace_hit: f32,
    pub diff_hit: f32,
    pub symbol_match: f32,
    pub keyword_match: f32,
    pub graph_related: f32,
    pub git_hotspot: f32,
    pub test_file_penalty: f32,
    pub files_hint_boost: f32,
    pub domain_boost: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            stacktrace_hit: 1.00,
            diff_hit: 0.80,
            symbol_match: 0.60,
            keyword_match: 0.40,
            graph_related: 0.25,
            git_hotspot: 0.15,
            test_file_penalty: -0.15,
            files_hint_boost: 0.20,
            domain_boost: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_file_size: u64,
    pub budget_tokens: usize,
    pub custom_domains: HashMap<String, CustomDomain>,
    pub weights: Weights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_file_size: 1_000_000,
            budget_tokens: 8_000,
            custom_domains: HashMap::new(),
            weights: Weights::default(),
        }
    }
}

/// Built-in excludes layered under `.contextignore` and any configured
/// `exclude_patterns` (spec §4.2).
pub const BUILTIN_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "dist",
    "build",
    "vendor",
];

pub fn is_builtin_binary_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "ico" | "svg" | "woff" | "woff2" | "ttf" | "eot"
            | "mp4" | "mp3" | "zip" | "gz" | "tar" | "pdf" | "so" | "dylib" | "dll" | "exe"
            | "wasm" | "bin" | "lock"
    )
}

/// Loads `<root>/.context/config.toml`. Missing file -> defaults. A
/// malformed file is a `ConfigError`, which is fatal at startup per §7.
pub fn load_config(repo_root: &Path) -> Result<Config> {
    let path = config_path(repo_root);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ContextError::io(path, e)),
    };

    toml::from_str::<Config>(&text)
        .map_err(|e| ContextError::Config(format!("{}: {e}", path.display())))
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".context").join("config.toml")
}

pub fn contextignore_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".contextignore")
}

pub fn index_db_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".context").join("index.db")
}

pub fn packs_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".context").join("packs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.budget_tokens, 8_000);
        assert_eq!(cfg.max_file_size, 1_000_000);
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".context")).unwrap();
        std::fs::write(
            config_path(dir.path()),
            "budget_tokens = 1000\nnonsense_field = true\n",
        )
        .unwrap();
        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn parses_custom_domains_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".context")).unwrap();
        std::fs::write(
            config_path(dir.path()),
            r#"
budget_tokens = 5000

[custom_domains.billing]
description = "Billing and invoicing"
keywords = ["invoice", "billing", "stripe"]

[weights]
symbol_match = 0.9
"#,
        )
        .unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.budget_tokens, 5000);
        assert!(cfg.custom_domains.contains_key("billing"));
        assert_eq!(cfg.weights.symbol_match, 0.9);
        // Unset weight fields keep defaults.
        assert_eq!(cfg.weights.stacktrace_hit, 1.0);
    }
}
