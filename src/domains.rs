//! §2/§4.7 DomainManager. A small built-in keyword table covering the
//! domains common to web-service repositories, merged with any
//! project-configured `custom_domains` from `.context/config.toml`.

use crate::config::CustomDomain;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Domain {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

/// Keyword ⊇ relation with scenario 2 in spec §8: "Payment webhook failing
/// for Stripe integration" must select "payments".
pub const CORE_DOMAINS: &[Domain] = &[
    Domain {
        name: "payments",
        keywords: &[
            "payment", "payments", "stripe", "invoice", "billing", "checkout", "charge",
            "refund", "webhook", "subscription", "ledger",
        ],
    },
    Domain {
        name: "auth",
        keywords: &[
            "auth", "authentication", "authorization", "login", "logout", "session",
            "token", "jwt", "oauth", "password", "credential", "permission",
        ],
    },
    Domain {
        name: "database",
        keywords: &[
            "database", "db", "query", "migration", "schema", "index", "transaction",
            "sql", "orm", "connection", "pool",
        ],
    },
    Domain {
        name: "api",
        keywords: &[
            "api", "endpoint", "route", "controller", "request", "response", "rest",
            "graphql", "grpc", "handler",
        ],
    },
    Domain {
        name: "frontend",
        keywords: &[
            "component", "ui", "render", "button", "form", "style", "css", "layout",
            "page", "view",
        ],
    },
    Domain {
        name: "testing",
        keywords: &["test", "spec", "mock", "fixture", "assert", "coverage"],
    },
    Domain {
        name: "security",
        keywords: &[
            "security", "vulnerability", "xss", "csrf", "injection", "sanitize",
            "exploit", "cve",
        ],
    },
    Domain {
        name: "infra",
        keywords: &[
            "deploy", "docker", "kubernetes", "ci", "pipeline", "terraform", "config",
            "environment",
        ],
    },
];

pub struct DomainManager {
    domains: Vec<Domain>,
}

impl DomainManager {
    pub fn new(custom_domains: &HashMap<String, CustomDomain>) -> Self {
        let mut domains: Vec<Domain> = CORE_DOMAINS.to_vec();
        for (name, def) in custom_domains {
            domains.push(Domain {
                name: Box::leak(name.clone().into_boxed_str()),
                keywords: Box::leak(
                    def.keywords
                        .iter()
                        .map(|k| Box::leak(k.clone().into_boxed_str()) as &'static str)
                        .collect::<Vec<_>>()
                        .into_boxed_slice(),
                ),
            });
        }
        Self { domains }
    }

    /// A domain is selected when ≥1 keyword (case-insensitive) is present
    /// in `keywords`; its weight is `hits / total_keywords`, clamped to
    /// [0, 1], per spec §4.7.
    pub fn detect(&self, keywords: &[String]) -> (Vec<String>, HashMap<String, f32>) {
        let total = keywords.len().max(1) as f32;
        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

        let mut selected = Vec::new();
        let mut weights = HashMap::new();

        for domain in &self.domains {
            let hits = lowered
                .iter()
                .filter(|kw| domain.keywords.iter().any(|dk| dk == kw))
                .count();
            if hits > 0 {
                selected.push(domain.name.to_string());
                weights.insert(domain.name.to_string(), (hits as f32 / total).clamp(0.0, 1.0));
            }
        }
        (selected, weights)
    }

    pub fn keywords_for(&self, name: &str) -> Option<&[&'static str]> {
        self.domains.iter().find(|d| d.name == name).map(|d| d.keywords)
    }

    /// Maps a detected path prefix like `app/Services/Payment` onto a
    /// domain name if any domain keyword appears in it, per §4.9's
    /// "domains derived from detected file-path prefixes" rule.
    pub fn domain_for_path(&self, path: &str) -> Option<String> {
        let lower = path.to_lowercase();
        self.domains
            .iter()
            .find(|d| d.keywords.iter().any(|kw| lower.contains(kw)))
            .map(|d| d.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_payments_domain() {
        let mgr = DomainManager::new(&HashMap::new());
        let (domains, weights) = mgr.detect(&[
            "payment".to_string(),
            "webhook".to_string(),
            "stripe".to_string(),
        ]);
        assert!(domains.contains(&"payments".to_string()));
        assert!(weights["payments"] > 0.0);
    }

    #[test]
    fn custom_domain_is_merged() {
        let mut custom = HashMap::new();
        custom.insert(
            "billing".to_string(),
            CustomDomain {
                description: "Billing".to_string(),
                keywords: vec!["dunning".to_string()],
            },
        );
        let mgr = DomainManager::new(&custom);
        let (domains, _) = mgr.detect(&["dunning".to_string()]);
        assert!(domains.contains(&"billing".to_string()));
    }

    #[test]
    fn domain_for_path_matches_prefix() {
        let mgr = DomainManager::new(&HashMap::new());
        assert_eq!(
            mgr.domain_for_path("app/Services/PaymentGateway.php"),
            Some("payments".to_string())
        );
    }
}
