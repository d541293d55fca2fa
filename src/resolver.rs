//! §4.9 TaskResolver. Fuses KeywordExtractor, StacktraceParser and
//! DiffAnalyzer output into a single `ResolvedTask`, the shared input to
//! CandidateDiscovery and the Scorer.

use crate::domains::DomainManager;
use crate::keywords::KeywordExtractor;
use crate::model::{ChangeType, ConfidenceBreakdown, ResolvedTask};
use crate::{diff, stacktrace};

/// Mirrors the `PackOptions` resolver input described in spec §6 (minus
/// the out-of-scope CLI-only fields like `format`/`interactive`).
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub task: Option<String>,
    pub error: Option<String>,
    pub diff: Option<String>,
    pub files: Vec<String>,
    pub symbols: Vec<String>,
}

pub struct TaskResolver {
    extractor: KeywordExtractor,
}

impl TaskResolver {
    pub fn new(domains: DomainManager) -> Self {
        Self {
            extractor: KeywordExtractor::new(domains),
        }
    }

    pub fn resolve(&self, input: &TaskInput) -> ResolvedTask {
        let raw = input.task.clone().unwrap_or_default();
        let extraction = self.extractor.extract(&raw);

        let stack_frames = input.error.as_deref().map(stacktrace::parse).unwrap_or_default();
        let diff_entries = input.diff.as_deref().map(diff::parse).unwrap_or_default();
        let stack_files = stacktrace::frame_files(&stack_frames);
        let diff_files = diff::diff_files(&diff_entries);

        let mut files_hint = Vec::new();
        files_hint.extend(input.files.iter().cloned());
        files_hint.extend(stack_files.iter().cloned());
        files_hint.extend(diff_files.iter().cloned());
        files_hint.extend(extraction.entities.file_names.iter().cloned());
        dedup(&mut files_hint);

        let mut symbols = Vec::new();
        symbols.extend(input.symbols.iter().cloned());
        symbols.extend(extraction.entities.class_names.iter().cloned());
        symbols.extend(extraction.entities.method_names.iter().cloned());
        dedup(&mut symbols);

        let mut domains = extraction.domains.clone();
        for path in &files_hint {
            if let Some(d) = self.extractor.domain_for_path(path) {
                domains.push(d);
            }
        }
        dedup(&mut domains);

        let change_type = if !stack_frames.is_empty() {
            ChangeType::Bugfix
        } else if !diff_entries.is_empty() && extraction.change_type == ChangeType::Unknown {
            ChangeType::Bugfix
        } else {
            extraction.change_type
        };

        let has_exact_file_name = !input.files.is_empty() || !extraction.entities.file_names.is_empty();
        let confidence = ConfidenceBreakdown::compute(
            has_exact_file_name,
            !extraction.entities.class_names.is_empty(),
            !extraction.entities.method_names.is_empty(),
            !extraction.entities.route_patterns.is_empty(),
            !extraction.entities.error_codes.is_empty(),
            extraction.keywords.len(),
        );

        ResolvedTask {
            raw,
            keywords: extraction.keywords,
            entities: extraction.entities,
            domains,
            domain_weights: extraction.domain_weights,
            change_type: Some(change_type),
            confidence,
            files_hint,
            symbols,
        }
    }
}

fn dedup(v: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    v.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolver() -> TaskResolver {
        TaskResolver::new(DomainManager::new(&HashMap::new()))
    }

    #[test]
    fn stacktrace_forces_bugfix_change_type() {
        let input = TaskInput {
            task: Some("Add a new payment feature".to_string()),
            error: Some(
                "TypeError\n    at PaymentService.handleWebhook (src/services/PaymentService.ts:42:17)"
                    .to_string(),
            ),
            ..Default::default()
        };
        let resolved = resolver().resolve(&input);
        assert_eq!(resolved.change_type, Some(ChangeType::Bugfix));
        assert!(resolved.files_hint.contains(&"src/services/PaymentService.ts".to_string()));
    }

    #[test]
    fn resolve_is_idempotent() {
        let input = TaskInput {
            task: Some("Fix bug in UserController".to_string()),
            ..Default::default()
        };
        let r = resolver();
        assert_eq!(r.resolve(&input), r.resolve(&input));
    }

    #[test]
    fn confidence_rises_with_recognized_entities() {
        let input = TaskInput {
            task: Some("Bug in UserController when creating PaymentService".to_string()),
            ..Default::default()
        };
        let resolved = resolver().resolve(&input);
        assert!(resolved.confidence.overall > 0.0);
        assert!(resolved.confidence.has_class_name);
    }
}
