//! §4.13 PackComposer. Greedily fills a token budget from a ranked
//! candidate list and emits the two pack artifacts: a human/LLM-readable
//! Markdown document and the `PackManifest` JSON record.

use crate::error::Warning;
use crate::model::{Candidate, Excerpt, PackFileEntry, PackManifest, ResolvedTask, PACK_MANIFEST_VERSION};
use std::collections::HashMap;

const REASONS_SHOWN: usize = 5;

/// `bytes / 4` is a deliberate, fixed estimator (§4.13, §9) — not a real
/// tokenizer. Replacing it would silently change every budget decision.
pub fn estimate_tokens(bytes: usize) -> usize {
    bytes / 4
}

pub struct PackInput<'a> {
    pub task: &'a ResolvedTask,
    pub candidates: &'a [Candidate],
    pub excerpts: &'a HashMap<String, Excerpt>,
    pub budget_tokens: usize,
    pub commit_base: Option<String>,
    pub timestamp: String,
    pub warnings: Vec<Warning>,
}

pub struct PackOutput {
    pub markdown: String,
    pub manifest: PackManifest,
}

/// Includes candidates in rank order, skipping any whose excerpt would
/// exceed the remaining budget but continuing to probe later, smaller
/// files rather than stopping at the first miss.
pub fn compose(input: PackInput) -> PackOutput {
    let mut remaining_tokens = input.budget_tokens;
    let mut included: Vec<(&Candidate, &Excerpt)> = Vec::new();
    let mut warnings = input.warnings;

    for candidate in input.candidates {
        let Some(excerpt) = input.excerpts.get(&candidate.path) else {
            continue;
        };
        let cost = estimate_tokens(excerpt.content.len());
        if cost > remaining_tokens {
            continue;
        }
        remaining_tokens -= cost;
        included.push((candidate, excerpt));
    }

    if included.is_empty() && !input.candidates.is_empty() {
        warnings.push(Warning::new(
            "E_BUDGET",
            format!("no candidate excerpt fit within {} tokens", input.budget_tokens),
        ));
    }
    if input.candidates.is_empty() {
        warnings.push(Warning::new("E_EMPTY", "no candidates found for the resolved task".to_string()));
    }

    let markdown = render_markdown(input.task, &included, &input.commit_base);

    let files: Vec<PackFileEntry> = included
        .iter()
        .map(|(c, e)| PackFileEntry {
            path: c.path.clone(),
            score: c.score,
            reasons: c.reasons.iter().take(REASONS_SHOWN).cloned().collect(),
            start_line: Some(e.start_line),
            end_line: Some(e.end_line),
        })
        .collect();

    let manifest = PackManifest {
        version: PACK_MANIFEST_VERSION,
        timestamp: input.timestamp,
        task: input.task.clone(),
        files,
        budget_tokens: input.budget_tokens,
        commit_base: input.commit_base,
        tags: input.task.domains.clone(),
        warnings,
    };

    PackOutput { markdown, manifest }
}

fn render_markdown(task: &ResolvedTask, included: &[(&Candidate, &Excerpt)], commit_base: &Option<String>) -> String {
    let mut out = String::new();
    out.push_str("# Context Pack\n\n");
    out.push_str("## Task\n\n");
    out.push_str(&format!("- **Description:** {}\n", if task.raw.is_empty() { "(none)" } else { &task.raw }));
    out.push_str(&format!(
        "- **Change type:** {}\n",
        task.change_type.map(|c| c.as_str()).unwrap_or("unknown")
    ));
    out.push_str(&format!(
        "- **Domains:** {}\n",
        if task.domains.is_empty() {
            "(none)".to_string()
        } else {
            task.domains.join(", ")
        }
    ));
    if let Some(base) = commit_base {
        out.push_str(&format!("- **Commit base:** {base}\n"));
    }
    out.push('\n');

    out.push_str("## Files\n\n");
    for (candidate, excerpt) in included {
        let lang = crate::model::Language::from_extension(
            std::path::Path::new(&candidate.path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(""),
        );
        out.push_str(&format!(
            "### {} (score {:.2}, lines {}-{})\n\n",
            candidate.path, candidate.score, excerpt.start_line, excerpt.end_line
        ));
        if !candidate.reasons.is_empty() {
            let reasons: Vec<&str> = candidate.reasons.iter().take(REASONS_SHOWN).map(|r| r.as_str()).collect();
            out.push_str(&format!("Reasons: {}\n\n", reasons.join(", ")));
        }
        out.push_str(&format!("```{}\n{}\n```\n\n", lang.as_str(), excerpt.content));
    }
    out
}
