//! §4.4 ImportGraphBuilder. Parses import/require/use directives per
//! language and resolves them against a pre-seeded file index so relative
//! lookups are O(1), falling back to external-package literals when
//! nothing indexed matches.

use crate::model::{ImportEdge, Language};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Seeded with the full set of indexed repo-relative paths before any
/// `resolve` call, per spec §4.4.
pub struct ImportGraphBuilder {
    file_index: HashSet<String>,
}

impl ImportGraphBuilder {
    pub fn new(file_index: HashSet<String>) -> Self {
        Self { file_index }
    }

    pub fn extract(&self, file_path: &str, language: Language, content: &str) -> Vec<ImportEdge> {
        let raw = if language == Language::Python {
            raw_imports_python(content)
        } else {
            raw_imports(language, content)
        };
        raw.into_iter()
            .map(|literal| {
                let target = self.resolve(file_path, &literal, language);
                ImportEdge {
                    source_path: file_path.to_string(),
                    target_path: target,
                    symbol: None,
                }
            })
            .collect()
    }

    /// Step 1: strip known suffixes. Step 2: relative-path join against the
    /// importing file's directory. Step 3: common extension completions.
    /// Step 4: otherwise leave as the original external literal.
    fn resolve(&self, source_path: &str, literal: &str, language: Language) -> String {
        if !is_relative_like(literal, language) {
            return literal.to_string();
        }

        let base_dir = Path::new(source_path).parent().unwrap_or_else(|| Path::new(""));
        let stripped = strip_known_suffix(literal);
        let joined = join_relative(base_dir, stripped);

        if self.file_index.contains(&joined) {
            return joined;
        }

        for candidate in extension_completions(&joined, language) {
            if self.file_index.contains(&candidate) {
                return candidate;
            }
        }

        literal.to_string()
    }
}

fn is_relative_like(literal: &str, language: Language) -> bool {
    match language {
        Language::JavaScript | Language::TypeScript => {
            literal.starts_with('.') || literal.starts_with('/')
        }
        Language::Python => literal.starts_with('.'),
        Language::Go | Language::Rust | Language::Java | Language::Php | Language::Ruby
        | Language::C | Language::Cpp | Language::Unknown => {
            literal.contains('/') && !literal.starts_with("http")
        }
    }
}

fn strip_known_suffix(literal: &str) -> &str {
    for suffix in [".tsx", ".ts", ".jsx", ".mjs", ".cjs", ".js"] {
        if let Some(stripped) = literal.strip_suffix(suffix) {
            return stripped;
        }
    }
    literal
}

fn join_relative(base_dir: &Path, literal: &str) -> String {
    let mut path = base_dir.to_path_buf();
    for component in literal.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                path.pop();
            }
            other => path.push(other),
        }
    }
    crate::scanner::normalize_path(&path)
}

fn extension_completions(base: &str, language: Language) -> Vec<String> {
    let exts: &[&str] = match language {
        Language::JavaScript => &[".js", ".jsx", ".mjs", "/index.js"],
        Language::TypeScript => &[".ts", ".tsx", "/index.ts", "/index.tsx"],
        Language::Python => &[".py", "/__init__.py"],
        Language::Go => &[".go"],
        Language::Ruby => &[".rb"],
        Language::Php => &[".php"],
        _ => &[],
    };
    exts.iter().map(|e| format!("{base}{e}")).collect()
}

fn raw_imports(language: Language, content: &str) -> Vec<String> {
    let re = import_regex(language);
    let Some(re) = re else { return Vec::new() };
    content
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn import_regex(language: Language) -> Option<&'static Regex> {
    macro_rules! cached {
        ($pat:expr) => {{
            static RE: OnceLock<Regex> = OnceLock::new();
            Some(RE.get_or_init(|| Regex::new($pat).unwrap()))
        }};
    }
    match language {
        Language::JavaScript | Language::TypeScript => {
            cached!(r#"(?:import\s+(?:[\w*{}\s,]+\s+from\s+)?|require\s*\(\s*)['"]([^'"]+)['"]"#)
        }
        Language::Python => cached!(r"^\s*(?:from\s+(\S+)\s+import\s+\S+|import\s+(\S+))"),
        Language::Go => cached!(r#"^\s*(?:_\s+)?"([^"]+)"\s*$"#),
        Language::Rust => cached!(r"^\s*use\s+([A-Za-z0-9_:]+)"),
        Language::Java => cached!(r"^\s*import\s+(?:static\s+)?([A-Za-z0-9_.]+)\s*;"),
        Language::Php => cached!(r#"^\s*(?:use|require(?:_once)?|include(?:_once)?)\s*\(?['"]?([A-Za-z0-9_\\/\.]+)['"]?\)?"#),
        Language::Ruby => cached!(r#"^\s*require(?:_relative)?\s*['"]([^'"]+)['"]"#),
        Language::C | Language::Cpp => cached!(r#"^\s*#include\s*["<]([^">]+)[">]"#),
        Language::Unknown => None,
    }
}

/// Python's `from X import Y` puts the module in capture group 1; plain
/// `import X` puts it in group 2. `raw_imports`'s single-group extraction
/// above only looks at group 1, so Python needs its own pass.
pub fn raw_imports_python(content: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(?:from\s+(\S+)\s+import\s+\S+|import\s+(\S+))").unwrap());
    content
        .lines()
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_ts_import() {
        let mut idx = HashSet::new();
        idx.insert("src/services/PaymentService.ts".to_string());
        let builder = ImportGraphBuilder::new(idx);
        let edges = builder.extract(
            "src/routes/checkout.ts",
            Language::TypeScript,
            "import { PaymentService } from '../services/PaymentService';\n",
        );
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_path, "src/services/PaymentService.ts");
    }

    #[test]
    fn leaves_external_package_as_literal() {
        let builder = ImportGraphBuilder::new(HashSet::new());
        let edges = builder.extract("src/a.ts", Language::TypeScript, "import React from 'react';\n");
        assert_eq!(edges[0].target_path, "react");
    }

    #[test]
    fn python_import_from() {
        let names = raw_imports_python("from app.services import payment\nimport os\n");
        assert_eq!(names, vec!["app.services", "os"]);
    }

    #[test]
    fn unknown_language_yields_no_edges() {
        let builder = ImportGraphBuilder::new(HashSet::new());
        assert!(builder.extract("a.xyz", Language::Unknown, "anything").is_empty());
    }
}
