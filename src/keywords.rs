//! §4.7 KeywordExtractor. Tokenizes a free-form task description into
//! stemmed keywords, classifies named entities, detects domains (via the
//! §4.9 DomainManager) and a change type. Regex-driven, like the rest of
//! the extraction stack — no NLP dependency beyond the Porter stemmer.

use crate::domains::DomainManager;
use crate::model::{ChangeType, Entities};
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct KeywordExtraction {
    pub keywords: Vec<String>,
    pub keyphrases: Vec<String>,
    pub entities: Entities,
    pub domains: Vec<String>,
    pub domain_weights: std::collections::HashMap<String, f32>,
    pub change_type: ChangeType,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "in", "on", "of", "to", "for", "and", "or", "is", "are", "was", "were",
    "be", "been", "this", "that", "these", "those", "with", "where", "when", "it", "its", "as",
    "at", "by", "from", "into", "but", "not", "no", "so", "if", "then", "than", "which", "who",
    "what", "has", "have", "had", "do", "does", "did", "i", "we", "you", "they", "he", "she",
];

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w]+(?:\.[\w]+)*").unwrap())
}

pub struct KeywordExtractor {
    domains: DomainManager,
    stemmer: Stemmer,
}

impl KeywordExtractor {
    pub fn new(domains: DomainManager) -> Self {
        Self {
            domains,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Delegates to the wrapped `DomainManager`; used by TaskResolver to
    /// derive extra domains from `files_hint` path prefixes (§4.9).
    pub fn domain_for_path(&self, path: &str) -> Option<String> {
        self.domains.domain_for_path(path)
    }

    pub fn extract(&self, raw: &str) -> KeywordExtraction {
        let tokens: Vec<&str> = token_regex().find_iter(raw).map(|m| m.as_str()).collect();

        let entities = self.extract_entities(raw, &tokens);
        let (keywords, keyphrases) = self.extract_keywords(&tokens);
        let (domains, domain_weights) = self.domains.detect(&keywords);
        let change_type = classify_change_type(raw);

        KeywordExtraction {
            keywords,
            keyphrases,
            entities,
            domains,
            domain_weights,
            change_type,
        }
    }

    fn extract_entities(&self, raw: &str, tokens: &[&str]) -> Entities {
        let mut class_names = Vec::new();
        let mut method_names = Vec::new();
        let mut error_codes = Vec::new();

        for &tok in tokens {
            if tok.contains('.') {
                continue;
            }
            if is_pascal_case(tok) {
                class_names.push(tok.to_string());
            } else if is_camel_case(tok) {
                method_names.push(tok.to_string());
            } else if is_error_code(tok) {
                error_codes.push(tok.to_string());
            }
        }

        let mut route_patterns = Vec::new();
        let mut file_names = Vec::new();
        for raw_word in raw.split_whitespace() {
            let cleaned = raw_word.trim_matches(|c: char| ".,;:!?()'\"".contains(c));
            if cleaned.starts_with('/') && cleaned.len() > 1 {
                route_patterns.push(cleaned.to_string());
                continue;
            }
            let stripped = cleaned.strip_prefix('@').unwrap_or(cleaned);
            if looks_like_file_name(stripped) {
                file_names.push(stripped.to_string());
            }
        }

        dedup(&mut class_names);
        dedup(&mut method_names);
        dedup(&mut file_names);
        dedup(&mut route_patterns);
        dedup(&mut error_codes);

        Entities {
            class_names,
            method_names,
            file_names,
            route_patterns,
            error_codes,
        }
    }

    /// Returns `(keywords, keyphrases)`. Each token is split into
    /// case-delimited subwords; subwords are lowercased, stopword-filtered,
    /// and Porter-stemmed, while the identifier itself is preserved
    /// verbatim (lowercased) alongside its stems, per spec §4.7.
    fn extract_keywords(&self, tokens: &[&str]) -> (Vec<String>, Vec<String>) {
        let mut keywords = Vec::new();
        let mut filtered_sequence: Vec<String> = Vec::new();

        for &tok in tokens {
            let lower = tok.to_lowercase();
            if STOPWORDS.contains(&lower.as_str()) {
                continue;
            }
            filtered_sequence.push(lower.clone());
            keywords.push(lower.clone());
            for subword in split_words(tok) {
                let sub_lower = subword.to_lowercase();
                if sub_lower.is_empty() || STOPWORDS.contains(&sub_lower.as_str()) {
                    continue;
                }
                keywords.push(self.stemmer.stem(&sub_lower).to_string());
            }
        }

        dedup(&mut keywords);

        let mut keyphrases = Vec::new();
        for window in filtered_sequence.windows(2) {
            keyphrases.push(window.join(" "));
        }
        for window in filtered_sequence.windows(3) {
            keyphrases.push(window.join(" "));
        }
        dedup(&mut keyphrases);

        (keywords, keyphrases)
    }
}

fn dedup(v: &mut Vec<String>) {
    let mut seen = HashSet::new();
    v.retain(|item| seen.insert(item.clone()));
}

fn is_pascal_case(tok: &str) -> bool {
    let mut chars = tok.chars();
    let Some(first) = chars.next() else { return false };
    if !first.is_uppercase() {
        return false;
    }
    if tok.contains('_') {
        return false;
    }
    tok.chars().any(|c| c.is_lowercase())
}

fn is_camel_case(tok: &str) -> bool {
    let mut chars = tok.chars();
    let Some(first) = chars.next() else { return false };
    if !first.is_lowercase() {
        return false;
    }
    if tok.contains('_') {
        return false;
    }
    tok.chars().any(|c| c.is_uppercase())
}

fn is_error_code(tok: &str) -> bool {
    if tok.len() < 2 {
        return false;
    }
    let has_upper_start = tok.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    let all_caps_or_digits_or_underscore = tok
        .chars()
        .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_');
    let has_digit_or_underscore = tok.chars().any(|c| c.is_ascii_digit() || c == '_');
    has_upper_start && all_caps_or_digits_or_underscore && has_digit_or_underscore
}

fn looks_like_file_name(tok: &str) -> bool {
    if tok.is_empty() {
        return false;
    }
    if let Some(ext) = tok.rsplit('.').next() {
        if ext.len() != tok.len() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return true;
        }
    }
    tok.contains('/')
}

/// Splits an identifier into its constituent words, recognizing
/// `snake_case`, `PascalCase`, and `camelCase` boundaries.
pub fn split_words(id: &str) -> Vec<String> {
    if id.contains('_') {
        return id.split('_').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect();
    }
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = id.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let starts_new_word = c.is_uppercase()
            && !current.is_empty()
            && (chars.get(i.wrapping_sub(1)).map(|p| p.is_lowercase()).unwrap_or(false)
                || chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false));
        if starts_new_word {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Expands `id` into its `snake_case`, `camelCase`, `PascalCase`, and
/// all-lowercase-concatenated forms. Superset membership only — callers
/// should check `⊇`, not set equality, per spec §8.
pub fn generate_case_variants(id: &str) -> HashSet<String> {
    let words = split_words(id);
    let mut variants = HashSet::new();
    variants.insert(id.to_string());
    if words.is_empty() {
        return variants;
    }

    let snake = words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    let lower_concat = words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("");
    let pascal = words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join("");
    let camel = words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
        .collect::<Vec<_>>()
        .join("");

    variants.insert(snake);
    variants.insert(lower_concat);
    variants.insert(pascal);
    variants.insert(camel);
    variants
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// First-match classification, but checked from most to least specific:
/// security/perf/refactor/feature lexemes are more informative than the
/// generic bugfix lexemes (`fix`, `bug`), which co-occur freely with them
/// (e.g. "Fix XSS vulnerability" names a security fix, not a generic bug).
fn classify_change_type(raw: &str) -> ChangeType {
    let lower = raw.to_lowercase();
    let any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if any(&["xss", "csrf", "inject", "vuln", "secure"]) {
        ChangeType::Security
    } else if any(&["optim", "perf", "speed", "slow"]) {
        ChangeType::Perf
    } else if any(&["refactor", "rename", "restructure"]) {
        ChangeType::Refactor
    } else if any(&["add", "new", "feature", "implement"]) {
        ChangeType::Feature
    } else if any(&["fix", "bug", "error", "crash"]) {
        ChangeType::Bugfix
    } else {
        ChangeType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn extractor() -> KeywordExtractor {
        KeywordExtractor::new(DomainManager::new(&HashMap::new()))
    }

    #[test]
    fn change_type_scenarios_match_spec() {
        assert_eq!(
            classify_change_type("Fix bug in user authentication where login fails"),
            ChangeType::Bugfix
        );
        assert_eq!(classify_change_type("Add new user registration feature"), ChangeType::Feature);
        assert_eq!(classify_change_type("Refactor auth module"), ChangeType::Refactor);
        assert_eq!(classify_change_type("Optimize database queries"), ChangeType::Perf);
        assert_eq!(classify_change_type("Fix XSS vulnerability"), ChangeType::Security);
    }

    #[test]
    fn domain_selection_scenario() {
        let result = extractor().extract("Payment webhook failing for Stripe integration");
        assert!(result.domains.contains(&"payments".to_string()));
    }

    #[test]
    fn class_name_entity_extraction() {
        let result = extractor().extract("Bug in UserController when creating PaymentService");
        assert!(result.entities.class_names.contains(&"UserController".to_string()));
        assert!(result.entities.class_names.contains(&"PaymentService".to_string()));
    }

    #[test]
    fn route_pattern_extraction() {
        let result = extractor().extract("Error on POST /api/checkout endpoint");
        assert!(result.entities.route_patterns.contains(&"/api/checkout".to_string()));
    }

    #[test]
    fn file_name_mention_extraction() {
        let result = extractor().extract("Fix issue in @PaymentController.php");
        assert!(result.entities.file_names.contains(&"PaymentController.php".to_string()));
    }

    #[test]
    fn case_variants_cover_required_forms() {
        let variants = generate_case_variants("manage_credit");
        for expected in ["manage_credit", "manageCredit", "ManageCredit"] {
            assert!(variants.contains(expected), "missing {expected}");
        }

        let variants = generate_case_variants("ManageCredit");
        for expected in ["ManageCredit", "manage_credit", "managecredit"] {
            assert!(variants.contains(expected), "missing {expected}");
        }
    }
}
