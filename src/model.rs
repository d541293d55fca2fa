//! Value-typed records (spec §3). The Store owns the persistent copy of
//! each; every other component reads or constructs these by value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Go,
    Rust,
    Java,
    Php,
    Ruby,
    C,
    Cpp,
    Unknown,
}

impl Language {
    /// Extension table driving §4.2 FileScanner language detection.
    pub fn from_extension(ext: &str) -> Language {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "py" | "pyi" => Language::Python,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "c" | "h" => Language::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Unknown => "unknown",
        }
    }

    pub fn from_str_loose(s: &str) -> Language {
        match s {
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "python" => Language::Python,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "php" => Language::Php,
            "ruby" => Language::Ruby,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            _ => Language::Unknown,
        }
    }
}

/// §3 FileRecord. `path` is the unique key; `content_hash` is the sole
/// change-detection signal and is recomputed on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: Language,
    pub size_bytes: u64,
    pub mtime_ms: i64,
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Interface,
    Constant,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Interface => "interface",
            SymbolKind::Constant => "constant",
            SymbolKind::Variable => "variable",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<SymbolKind> {
        Some(match s {
            "class" => SymbolKind::Class,
            "function" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "interface" => SymbolKind::Interface,
            "constant" => SymbolKind::Constant,
            "variable" => SymbolKind::Variable,
            _ => return None,
        })
    }
}

/// §3 SymbolRecord. Invariant: `end_line >= start_line`; all symbols for a
/// file are atomically replaced on re-index (see Store::clear_symbols_for_file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: Option<String>,
}

/// §3 ImportEdge. `target_path` is repo-relative when resolved, else the
/// original literal (an external package identifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub source_path: String,
    pub target_path: String,
    pub symbol: Option<String>,
}

/// §3 GitSignal. `hotspot_score` is the §4.5 6-month-commit-count metric,
/// normalized by the repo-wide maximum, distinct from `churn_score`'s
/// 90-day additions+deletions measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSignal {
    pub path: String,
    pub last_modified: Option<String>,
    pub commit_count: u32,
    pub churn_score: f32,
    pub hotspot_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Bugfix,
    Feature,
    Refactor,
    Perf,
    Security,
    Unknown,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Bugfix => "bugfix",
            ChangeType::Feature => "feature",
            ChangeType::Refactor => "refactor",
            ChangeType::Perf => "perf",
            ChangeType::Security => "security",
            ChangeType::Unknown => "unknown",
        }
    }
}

/// Entities recognized inside a task description (spec §4.7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub class_names: Vec<String>,
    pub method_names: Vec<String>,
    pub file_names: Vec<String>,
    pub route_patterns: Vec<String>,
    pub error_codes: Vec<String>,
}

/// Named sub-signals behind `ResolvedTask.confidence.overall` (§4.9). Spec
/// names the weights but not a struct shape; decided in DESIGN.md.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub has_exact_file_name: bool,
    pub has_class_name: bool,
    pub has_method_name: bool,
    pub has_route_pattern: bool,
    pub has_error_code: bool,
    pub keyword_match_count: usize,
    pub overall: f32,
}

impl ConfidenceBreakdown {
    pub fn compute(
        has_exact_file_name: bool,
        has_class_name: bool,
        has_method_name: bool,
        has_route_pattern: bool,
        has_error_code: bool,
        keyword_match_count: usize,
    ) -> Self {
        let mut overall = 0.0f32;
        if has_exact_file_name {
            overall += 0.35;
        }
        if has_class_name {
            overall += 0.20;
        }
        if has_method_name {
            overall += 0.15;
        }
        if has_route_pattern {
            overall += 0.10;
        }
        if has_error_code {
            overall += 0.10;
        }
        overall += (keyword_match_count as f32 / 10.0).min(0.1);
        Self {
            has_exact_file_name,
            has_class_name,
            has_method_name,
            has_route_pattern,
            has_error_code,
            keyword_match_count,
            overall: overall.clamp(0.0, 1.0),
        }
    }
}

/// §3 ResolvedTask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTask {
    pub raw: String,
    pub keywords: Vec<String>,
    pub entities: Entities,
    pub domains: Vec<String>,
    pub domain_weights: HashMap<String, f32>,
    pub change_type: Option<ChangeType>,
    pub confidence: ConfidenceBreakdown,
    pub files_hint: Vec<String>,
    pub symbols: Vec<String>,
}

impl Default for ChangeType {
    fn default() -> Self {
        ChangeType::Unknown
    }
}

/// Boolean evidence flags behind a `Candidate`'s score (§3, §4.10).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub stacktrace_hit: bool,
    pub diff_hit: bool,
    pub symbol_match: bool,
    pub keyword_match: bool,
    pub graph_related: bool,
    pub test_file: bool,
    pub git_hotspot: bool,
}

/// §3 Candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    pub score: f32,
    pub reasons: Vec<String>,
    pub signals: Signals,
}

/// §3 Excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    pub path: String,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub total_lines: u32,
    pub truncated: bool,
}

/// Per-file entry inside a `PackManifest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackFileEntry {
    pub path: String,
    pub score: f32,
    pub reasons: Vec<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

/// §3 PackManifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    pub version: u32,
    pub timestamp: String,
    pub task: ResolvedTask,
    pub files: Vec<PackFileEntry>,
    pub budget_tokens: usize,
    pub commit_base: Option<String>,
    pub tags: Vec<String>,
    pub warnings: Vec<crate::error::Warning>,
}

pub const PACK_MANIFEST_VERSION: u32 = 1;
