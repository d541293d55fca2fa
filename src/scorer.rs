//! §4.11 Scorer. Weighted linear combination of signal channels plus
//! boosts, with a fully deterministic tie-break so identical inputs
//! always produce identical orderings (§8 "Scorer determinism").

use crate::config::Weights;
use crate::domains::DomainManager;
use crate::model::{Candidate, ResolvedTask};
use std::path::Path;

pub fn score(
    mut candidates: Vec<Candidate>,
    task: &ResolvedTask,
    weights: &Weights,
    domains: &DomainManager,
) -> Vec<Candidate> {
    let matches_test_domain = task
        .domains
        .iter()
        .any(|d| d == "testing" || task.keywords.iter().any(|k| k == "test" || k == "testing"));

    for candidate in &mut candidates {
        let mut total = 0.0f32;
        let s = &candidate.signals;

        if s.stacktrace_hit {
            total += weights.stacktrace_hit;
        }
        if s.diff_hit {
            total += weights.diff_hit;
        }
        if s.symbol_match {
            total += weights.symbol_match;
        }
        if s.keyword_match {
            total += weights.keyword_match;
        }
        if s.graph_related {
            total += weights.graph_related;
        }
        if s.git_hotspot {
            total += weights.git_hotspot;
        }
        if s.test_file && !matches_test_domain {
            total += weights.test_file_penalty;
        }

        if task.files_hint.iter().any(|f| f == &candidate.path) {
            total += weights.files_hint_boost;
        }

        let path_lower = candidate.path.to_lowercase();
        let basename = Path::new(&candidate.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&candidate.path)
            .to_lowercase();
        let mut domain_hits = 0usize;
        for domain in &task.domains {
            let Some(kws) = domains.keywords_for(domain) else { continue };
            if kws.iter().any(|kw| basename.contains(kw) || path_lower.contains(kw)) {
                domain_hits += 1;
            }
        }
        total += weights.domain_boost * domain_hits as f32;

        candidate.score = total;
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.signals.stacktrace_hit.cmp(&a.signals.stacktrace_hit))
            .then_with(|| a.path.len().cmp(&b.path.len()))
            .then_with(|| a.path.cmp(&b.path))
    });

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Signals;
    use std::collections::HashMap;

    fn candidate(path: &str, signals: Signals) -> Candidate {
        Candidate {
            path: path.to_string(),
            score: 0.0,
            reasons: Vec::new(),
            signals,
        }
    }

    #[test]
    fn stacktrace_outranks_keyword_only() {
        let task = ResolvedTask::default();
        let weights = Weights::default();
        let domains = DomainManager::new(&HashMap::new());
        let candidates = vec![
            candidate(
                "a.ts",
                Signals {
                    keyword_match: true,
                    ..Default::default()
                },
            ),
            candidate(
                "b.ts",
                Signals {
                    stacktrace_hit: true,
                    ..Default::default()
                },
            ),
        ];
        let ranked = score(candidates, &task, &weights, &domains);
        assert_eq!(ranked[0].path, "b.ts");
    }

    #[test]
    fn ordering_is_deterministic_across_runs() {
        let task = ResolvedTask::default();
        let weights = Weights::default();
        let domains = DomainManager::new(&HashMap::new());
        let candidates = vec![
            candidate("same_score_b.ts", Signals::default()),
            candidate("same_score_a.ts", Signals::default()),
        ];
        let ranked_once = score(candidates.clone(), &task, &weights, &domains);
        let ranked_twice = score(candidates, &task, &weights, &domains);
        assert_eq!(ranked_once, ranked_twice);
        assert_eq!(ranked_once[0].path, "same_score_a.ts");
    }

    #[test]
    fn files_hint_membership_boosts_score() {
        let mut task = ResolvedTask::default();
        task.files_hint = vec!["hinted.ts".to_string()];
        let weights = Weights::default();
        let domains = DomainManager::new(&HashMap::new());
        let candidates = vec![candidate("hinted.ts", Signals::default()), candidate("other.ts", Signals::default())];
        let ranked = score(candidates, &task, &weights, &domains);
        assert_eq!(ranked[0].path, "hinted.ts");
        assert!(ranked[0].score > ranked[1].score);
    }
}
