//! §4.12 ExcerptExtractor. Chooses a line range per selected file: a
//! window around a known stacktrace/diff line, a window around a matched
//! symbol, the whole file for small files or an explicit full snapshot,
//! or else a truncated head.

use crate::model::{Excerpt, SymbolRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    None,
    Excerpts,
    Full,
}

const HIT_BEFORE: u32 = 20;
const HIT_AFTER: u32 = 40;
const SYMBOL_PAD: u32 = 5;
const FULL_FILE_THRESHOLD: u32 = 200;
const TRUNCATED_HEAD: u32 = 120;

pub struct ExcerptExtractor;

impl ExcerptExtractor {
    /// `hit_line` is a stacktrace or diff line, if known. `symbol` is the
    /// best matched symbol for this candidate, if any.
    pub fn extract(
        path: &str,
        content: &str,
        hit_line: Option<u32>,
        symbol: Option<&SymbolRecord>,
        snapshot: Snapshot,
    ) -> Excerpt {
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len() as u32;

        let (start, end, truncated) = if let Some(line) = hit_line {
            (line.saturating_sub(HIT_BEFORE).max(1), (line + HIT_AFTER).min(total_lines), false)
        } else if let Some(sym) = symbol {
            (
                sym.start_line.saturating_sub(SYMBOL_PAD).max(1),
                (sym.end_line + SYMBOL_PAD).min(total_lines),
                false,
            )
        } else if snapshot == Snapshot::Full || total_lines <= FULL_FILE_THRESHOLD {
            (1, total_lines, false)
        } else {
            (1, TRUNCATED_HEAD.min(total_lines), true)
        };

        let start = start.max(1).min(total_lines.max(1));
        let end = end.max(start).min(total_lines.max(1));

        let slice = if total_lines == 0 {
            String::new()
        } else {
            lines[(start as usize - 1)..(end as usize)].join("\n")
        };

        Excerpt {
            path: path.to_string(),
            content: slice,
            start_line: start,
            end_line: end,
            total_lines,
            truncated,
        }
    }
}

/// Merges overlapping or adjacent ranges for the same file (spec §4.12).
pub fn merge_overlaps(mut excerpts: Vec<Excerpt>) -> Vec<Excerpt> {
    excerpts.sort_by_key(|e| e.start_line);
    let mut merged: Vec<Excerpt> = Vec::new();
    for excerpt in excerpts {
        if let Some(last) = merged.last_mut() {
            if excerpt.path == last.path && excerpt.start_line <= last.end_line + 1 {
                if excerpt.end_line > last.end_line {
                    last.end_line = excerpt.end_line;
                    last.truncated = last.truncated || excerpt.truncated;
                }
                continue;
            }
        }
        merged.push(excerpt);
    }
    merged
}
