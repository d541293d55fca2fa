//! §4.8 DiffAnalyzer. Parses a unified diff into per-file status and
//! line-count stats. Rename detection relies solely on the `rename
//! from:`/`rename to:` header pair — similarity is never computed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub file: String,
    pub status: DiffStatus,
    pub additions: u32,
    pub deletions: u32,
}

fn diff_git_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^diff --git a/(?P<a>\S+) b/(?P<b>\S+)").unwrap())
}

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@ ").unwrap())
}

struct FileBlock {
    path: String,
    status: DiffStatus,
    additions: u32,
    deletions: u32,
}

/// Parses unified diff text (`git diff`/`git show` output) into one
/// `DiffEntry` per file section, in the order files appear.
pub fn parse(text: &str) -> Vec<DiffEntry> {
    let mut blocks: Vec<FileBlock> = Vec::new();
    let mut current: Option<FileBlock> = None;
    let mut pending_rename_from: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = diff_git_re().captures(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            let path = caps.name("b").map(|m| m.as_str().to_string()).unwrap_or_default();
            current = Some(FileBlock {
                path,
                status: DiffStatus::Modified,
                additions: 0,
                deletions: 0,
            });
            pending_rename_from = None;
            continue;
        }

        let Some(block) = current.as_mut() else { continue };

        if let Some(rest) = line.strip_prefix("rename from ") {
            pending_rename_from = Some(rest.to_string());
            continue;
        }
        if line.starts_with("rename to ") {
            if pending_rename_from.is_some() {
                block.status = DiffStatus::Renamed;
            }
            continue;
        }
        if line.starts_with("new file mode") {
            block.status = DiffStatus::Added;
            continue;
        }
        if line.starts_with("deleted file mode") {
            block.status = DiffStatus::Deleted;
            continue;
        }
        if hunk_header_re().is_match(line) {
            continue;
        }
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if let Some(rest) = line.strip_prefix('+') {
            if !rest.starts_with('+') {
                block.additions += 1;
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix('-') {
            if !rest.starts_with('-') {
                block.deletions += 1;
            }
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }

    blocks
        .into_iter()
        .map(|b| DiffEntry {
            file: crate::scanner::normalize_path(std::path::Path::new(&b.path)),
            status: b.status,
            additions: b.additions,
            deletions: b.deletions,
        })
        .collect()
}

pub fn diff_files(entries: &[DiffEntry]) -> Vec<String> {
    entries.iter().map(|e| e.file.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"diff --git a/src/services/PaymentService.ts b/src/services/PaymentService.ts
index 1234567..89abcde 100644
--- a/src/services/PaymentService.ts
+++ b/src/services/PaymentService.ts
@@ -10,6 +10,7 @@ export class PaymentService {
   handleWebhook() {
+    validateSignature();
     return true;
-    // TODO
   }
diff --git a/src/new_file.ts b/src/new_file.ts
new file mode 100644
--- /dev/null
+++ b/src/new_file.ts
@@ -0,0 +1,2 @@
+export const x = 1;
+export const y = 2;
"#;

    #[test]
    fn parses_modified_and_added_files() {
        let entries = parse(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, "src/services/PaymentService.ts");
        assert_eq!(entries[0].status, DiffStatus::Modified);
        assert_eq!(entries[0].additions, 1);
        assert_eq!(entries[0].deletions, 1);
        assert_eq!(entries[1].status, DiffStatus::Added);
    }

    #[test]
    fn detects_rename_from_headers() {
        let text = "diff --git a/old.rs b/new.rs\nsimilarity index 100%\nrename from old.rs\nrename to new.rs\n";
        let entries = parse(text);
        assert_eq!(entries[0].status, DiffStatus::Renamed);
    }

    #[test]
    fn malformed_diff_never_panics() {
        let _ = parse("not a diff\n@@ garbage @@\n+++\n---\n");
    }
}
