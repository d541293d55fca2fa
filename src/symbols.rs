//! §4.3 SymbolExtractor. Regex-driven, not AST-based, per the Design Notes
//! ("prefer a small handwritten scanner per language over a single
//! mega-regex; treat parse failures as empty-result producers, never
//! errors"). Line ranges are inclusive and 1-based, computed by bracket or
//! indent scanning depending on the language family.

use crate::model::{Language, SymbolKind, SymbolRecord};
use regex::Regex;
use std::sync::OnceLock;

/// Dispatch by language; unknown language -> empty output. Never raises:
/// a regex or scan failure on one symbol simply means it's skipped.
pub fn extract_symbols(file_path: &str, language: Language, content: &str) -> Vec<SymbolRecord> {
    match language {
        Language::Python | Language::Ruby => extract_indent_based(file_path, language, content),
        Language::JavaScript
        | Language::TypeScript
        | Language::Go
        | Language::Rust
        | Language::Java
        | Language::Php
        | Language::C
        | Language::Cpp => extract_brace_based(file_path, language, content),
        Language::Unknown => Vec::new(),
    }
}

struct Patterns {
    class: Regex,
    interface: Regex,
    function: Regex,
    method: Regex,
    constant: Regex,
}

fn patterns_for(language: Language) -> Patterns {
    build_patterns(language)
}

fn build_patterns(language: Language) -> Patterns {
    match language {
        Language::JavaScript | Language::TypeScript => Patterns {
            class: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
            interface: Regex::new(r"^\s*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
            function: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
            method: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|static\s+|async\s+|readonly\s+)*([A-Za-z_$][A-Za-z0-9_$]*)\s*\([^;{=]*\)\s*(?::\s*[^{=;]+)?\s*\{").unwrap(),
            constant: Regex::new(r"^\s*(?:export\s+)?const\s+([A-Z_][A-Z0-9_]*)\s*=").unwrap(),
        },
        Language::Go => Patterns {
            class: Regex::new(r"^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)\s+struct\b").unwrap(),
            interface: Regex::new(r"^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)\s+interface\b").unwrap(),
            function: Regex::new(r"^\s*func\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            method: Regex::new(r"^\s*func\s+\([^)]*\)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            constant: Regex::new(r"^\s*const\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:[A-Za-z0-9_]*\s*)?=").unwrap(),
        },
        Language::Rust => Patterns {
            class: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            interface: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            function: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            method: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            constant: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?const\s+([A-Z_][A-Z0-9_]*)\s*:").unwrap(),
        },
        Language::Java => Patterns {
            class: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|final\s+|abstract\s+|static\s+)*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            interface: Regex::new(r"^\s*(?:public\s+)?interface\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            function: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|static\s+|final\s+)*[A-Za-z_<>\[\],.\s]+\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^;]*\)\s*\{").unwrap(),
            method: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|static\s+|final\s+)*[A-Za-z_<>\[\],.\s]+\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^;]*\)\s*\{").unwrap(),
            constant: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+)*static\s+final\s+[A-Za-z_<>\[\]]+\s+([A-Z_][A-Z0-9_]*)\s*=").unwrap(),
        },
        Language::Php => Patterns {
            class: Regex::new(r"^\s*(?:abstract\s+|final\s+)?class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            interface: Regex::new(r"^\s*interface\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            function: Regex::new(r"^\s*function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            method: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|static\s+)*function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
            constant: Regex::new(r"^\s*const\s+([A-Z_][A-Z0-9_]*)\s*=").unwrap(),
        },
        Language::C | Language::Cpp => Patterns {
            class: Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            interface: Regex::new(r"^\s*struct\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            function: Regex::new(r"^\s*(?:static\s+|inline\s+)*[A-Za-z_][A-Za-z0-9_<>:,\s\*&]*\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^;{]*\)\s*\{").unwrap(),
            method: Regex::new(r"^\s*(?:static\s+|inline\s+|virtual\s+)*[A-Za-z_][A-Za-z0-9_<>:,\s\*&]*\s+([A-Za-z_][A-Za-z0-9_]*)::[A-Za-z_][A-Za-z0-9_]*\s*\([^;{]*\)\s*\{").unwrap(),
            constant: Regex::new(r"^\s*(?:static\s+)?const\s+[A-Za-z_][A-Za-z0-9_<>:,\s\*&]*\s+([A-Z_][A-Z0-9_]*)\s*=").unwrap(),
        },
        Language::Python | Language::Ruby | Language::Unknown => Patterns {
            class: Regex::new(r"^$").unwrap(),
            interface: Regex::new(r"^$").unwrap(),
            function: Regex::new(r"^$").unwrap(),
            method: Regex::new(r"^$").unwrap(),
            constant: Regex::new(r"^$").unwrap(),
        },
    }
}

/// Brace languages: find the declaration line via regex, then scan forward
/// counting `{`/`}` (ignoring characters inside `"`/`'`/`` ` `` string
/// literals and `//`/`/* */` comments) to find the matching close.
fn extract_brace_based(file_path: &str, language: Language, content: &str) -> Vec<SymbolRecord> {
    let pats = patterns_for(language);
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        if let Some(caps) = pats.class.captures(line) {
            push_brace_symbol(&mut out, file_path, &lines, idx, line_no, SymbolKind::Class, &caps[1], line);
        } else if let Some(caps) = pats.interface.captures(line) {
            push_brace_symbol(&mut out, file_path, &lines, idx, line_no, SymbolKind::Interface, &caps[1], line);
        } else if let Some(caps) = pats.method.captures(line) {
            push_brace_symbol(&mut out, file_path, &lines, idx, line_no, SymbolKind::Method, &caps[1], line);
        } else if let Some(caps) = pats.function.captures(line) {
            push_brace_symbol(&mut out, file_path, &lines, idx, line_no, SymbolKind::Function, &caps[1], line);
        } else if let Some(caps) = pats.constant.captures(line) {
            out.push(SymbolRecord {
                file_path: file_path.to_string(),
                name: caps[1].to_string(),
                kind: SymbolKind::Constant,
                start_line: line_no,
                end_line: line_no,
                signature: Some(line.trim().to_string()),
            });
        }
    }

    dedup_overlapping(out)
}

fn push_brace_symbol(
    out: &mut Vec<SymbolRecord>,
    file_path: &str,
    lines: &[&str],
    start_idx: usize,
    start_line: u32,
    kind: SymbolKind,
    name: &str,
    decl_line: &str,
) {
    let end_line = find_matching_brace_end(lines, start_idx).unwrap_or(start_line);
    out.push(SymbolRecord {
        file_path: file_path.to_string(),
        name: name.to_string(),
        kind,
        start_line,
        end_line: end_line.max(start_line),
        signature: Some(decl_line.trim().to_string()),
    });
}

/// Scans forward from `start_idx` counting unescaped `{`/`}` outside string
/// and comment literals. Returns the 1-based line where the brace opened on
/// or after `start_idx` finally closes. `None` if no opening brace is found
/// within a reasonable lookahead (declaration spans multiple lines) or the
/// file ends before it closes — callers fall back to a single-line symbol.
fn find_matching_brace_end(lines: &[&str], start_idx: usize) -> Option<u32> {
    let mut depth: i64 = 0;
    let mut seen_open = false;
    let lookahead_limit = lines.len().min(start_idx + 20);

    for (scan_idx, line) in lines.iter().enumerate().skip(start_idx) {
        let is_within_lookahead = scan_idx < lookahead_limit || seen_open;
        if !is_within_lookahead {
            return None;
        }
        let mut in_string: Option<char> = None;
        let mut in_block_comment = false;
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if in_block_comment {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    in_block_comment = false;
                    i += 2;
                    continue;
                }
                i += 1;
                continue;
            }
            if let Some(q) = in_string {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    in_string = None;
                }
                i += 1;
                continue;
            }
            match c {
                '"' | '\'' | '`' => in_string = Some(c),
                '/' if chars.get(i + 1) == Some(&'/') => break,
                '/' if chars.get(i + 1) == Some(&'*') => {
                    in_block_comment = true;
                    i += 2;
                    continue;
                }
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => {
                    depth -= 1;
                    if seen_open && depth <= 0 {
                        return Some((scan_idx + 1) as u32);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
    None
}

/// Python/Ruby: indentation-delimited blocks. A `def`/`class` ends at the
/// last line before indentation returns to <= its own level (blank and
/// comment-only lines don't count toward that decision).
fn extract_indent_based(file_path: &str, language: Language, content: &str) -> Vec<SymbolRecord> {
    let def_re: &Regex = match language {
        Language::Python => {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap())
        }
        Language::Ruby => {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(r"^(\s*)def\s+(?:self\.)?([A-Za-z_][A-Za-z0-9_?!]*)").unwrap())
        }
        _ => return Vec::new(),
    };
    let class_re: &Regex = match language {
        Language::Python => {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(r"^(\s*)class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
        }
        Language::Ruby => {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(r"^(\s*)(?:class|module)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
        }
        _ => return Vec::new(),
    };
    let const_re: &Regex = {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^([A-Z_][A-Z0-9_]*)\s*=\s*").unwrap())
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        if let Some(caps) = class_re.captures(line) {
            let indent = caps[1].len();
            let end = indent_block_end(&lines, idx, indent);
            out.push(SymbolRecord {
                file_path: file_path.to_string(),
                name: caps[2].to_string(),
                kind: SymbolKind::Class,
                start_line: line_no,
                end_line: end.max(line_no),
                signature: Some(line.trim().to_string()),
            });
        } else if let Some(caps) = def_re.captures(line) {
            let indent = caps[1].len();
            let end = indent_block_end(&lines, idx, indent);
            let kind = if indent > 0 { SymbolKind::Method } else { SymbolKind::Function };
            out.push(SymbolRecord {
                file_path: file_path.to_string(),
                name: caps[2].to_string(),
                kind,
                start_line: line_no,
                end_line: end.max(line_no),
                signature: Some(line.trim().to_string()),
            });
        } else if indent_of(line) == 0 {
            if let Some(caps) = const_re.captures(line) {
                out.push(SymbolRecord {
                    file_path: file_path.to_string(),
                    name: caps[1].to_string(),
                    kind: SymbolKind::Constant,
                    start_line: line_no,
                    end_line: line_no,
                    signature: Some(line.trim().to_string()),
                });
            }
        }
    }

    dedup_overlapping(out)
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn indent_block_end(lines: &[&str], start_idx: usize, def_indent: usize) -> u32 {
    let mut last_nonblank = start_idx;
    for (idx, line) in lines.iter().enumerate().skip(start_idx + 1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if indent_of(line) <= def_indent {
            break;
        }
        last_nonblank = idx;
    }
    (last_nonblank + 1) as u32
}

/// When a method regex and a looser function regex both match the same
/// line for a brace language, prefer the earlier (more specific) match and
/// drop the duplicate produced for the same `(name, start_line)`.
fn dedup_overlapping(mut symbols: Vec<SymbolRecord>) -> Vec<SymbolRecord> {
    symbols.sort_by(|a, b| a.start_line.cmp(&b.start_line).then(a.name.cmp(&b.name)));
    symbols.dedup_by(|a, b| a.start_line == b.start_line && a.name == b.name);
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_fn_and_struct() {
        let src = "pub struct Foo {\n    x: i32,\n}\n\npub fn do_thing(x: i32) -> i32 {\n    x + 1\n}\n";
        let syms = extract_symbols("src/lib.rs", Language::Rust, src);
        let names: Vec<_> = syms.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"do_thing"));
        let foo = syms.iter().find(|s| s.name == "Foo").unwrap();
        assert_eq!(foo.start_line, 1);
        assert_eq!(foo.end_line, 3);
    }

    #[test]
    fn extracts_python_class_and_method() {
        let src = "class PaymentService:\n    def charge(self, amount):\n        return amount\n\n    def refund(self, amount):\n        return -amount\n";
        let syms = extract_symbols("svc.py", Language::Python, src);
        let names: Vec<_> = syms.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"PaymentService"));
        assert!(names.contains(&"charge"));
        assert!(names.contains(&"refund"));
        let cls = syms.iter().find(|s| s.name == "PaymentService").unwrap();
        assert_eq!(cls.kind, SymbolKind::Class);
        assert_eq!(cls.end_line, 5);
    }

    #[test]
    fn invariant_end_line_gte_start_line() {
        let src = "function f() {\n  return 1;\n}\n";
        let syms = extract_symbols("a.js", Language::JavaScript, src);
        for s in syms {
            assert!(s.end_line >= s.start_line);
        }
    }

    #[test]
    fn unknown_language_yields_empty() {
        assert!(extract_symbols("a.xyz", Language::Unknown, "whatever").is_empty());
    }

    #[test]
    fn malformed_source_never_panics() {
        let src = "class {{{ def (( \" unterminated";
        let _ = extract_symbols("weird.py", Language::Python, src);
        let _ = extract_symbols("weird.rs", Language::Rust, src);
    }
}
