//! Integration coverage for the full index → resolve → discover → score →
//! excerpt pipeline against a small fixture repo written to a tempdir.

use ctxpack::config::Config;
use ctxpack::discovery::{self, DiscoveryInput};
use ctxpack::domains::DomainManager;
use ctxpack::excerpt::{ExcerptExtractor, Snapshot};
use ctxpack::indexer::Indexer;
use ctxpack::resolver::{TaskInput, TaskResolver};
use ctxpack::scorer;
use ctxpack::store::Store;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn write(dir: &Path, rel: &str, content: &str) {
    let full = dir.join(rel);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

/// Spec §8 scenario 6: given a fixture repo containing
/// `src/services/PaymentService.ts` and the task "payment webhook
/// failing", discovery surfaces that file, the scorer ranks it first, and
/// the reasons mention both the FTS hit and the matched symbol.
#[test]
fn payment_webhook_scenario_ranks_payment_service_first() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/services/PaymentService.ts",
        "export class PaymentService {\n  handleWebhook(payload: string) {\n    return verify(payload);\n  }\n}\n",
    );
    write(
        dir.path(),
        "src/routes/checkout.ts",
        "import { PaymentService } from '../services/PaymentService';\n\nexport function checkout() {}\n",
    );
    write(
        dir.path(),
        "src/utils/logger.ts",
        "export function log(msg: string) {\n  console.log(msg);\n}\n",
    );

    let cfg = Config::default();
    let indexer = Indexer::new(dir.path(), cfg.clone());
    let mut store = Store::open_in_memory().unwrap();
    let stats = indexer.index(&mut store).unwrap();
    assert_eq!(stats.files, 3);

    let domain_manager = DomainManager::new(&cfg.custom_domains);
    let resolver = TaskResolver::new(DomainManager::new(&cfg.custom_domains));
    let resolved = resolver.resolve(&TaskInput {
        task: Some("payment webhook failing".to_string()),
        ..Default::default()
    });

    let discovery_input = DiscoveryInput {
        task: &resolved,
        stack_frames: &[],
        diff_entries: &[],
    };
    let candidates = discovery::discover(&store, &discovery_input).unwrap();
    assert!(candidates.iter().any(|c| c.path == "src/services/PaymentService.ts"));

    let ranked = scorer::score(candidates, &resolved, &cfg.weights, &domain_manager);
    assert_eq!(ranked[0].path, "src/services/PaymentService.ts");
    assert!(ranked[0].signals.keyword_match);

    let truncated_reasons: Vec<&str> = ranked[0].reasons.iter().take(5).map(|r| r.as_str()).collect();
    assert!(truncated_reasons.iter().any(|r| r.starts_with("fts:")));
    assert!(truncated_reasons.iter().any(|r| *r == "symbol:PaymentService"));
}

#[test]
fn incremental_update_leaves_untouched_files_intact() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.rs", "fn a() {}\n");
    write(dir.path(), "b.rs", "fn b() {}\n");

    let indexer = Indexer::new(dir.path(), Config::default());
    let mut store = Store::open_in_memory().unwrap();
    indexer.index(&mut store).unwrap();

    let before = store.get_file("b.rs").unwrap().unwrap();

    write(dir.path(), "a.rs", "fn a() {\n  println!(\"changed\");\n}\n");
    indexer.incremental_update(&mut store, &["a.rs".to_string()]).unwrap();

    let after = store.get_file("b.rs").unwrap().unwrap();
    assert_eq!(before, after);

    let changed = store.get_file("a.rs").unwrap().unwrap();
    assert_ne!(changed.content_hash, before.content_hash);
}

#[test]
fn excerpts_for_ranked_candidates_stay_within_file_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let long_file: String = (1..=300).map(|i| format!("line {i}\n")).collect();
    write(dir.path(), "big.rs", &long_file);

    let indexer = Indexer::new(dir.path(), Config::default());
    let mut store = Store::open_in_memory().unwrap();
    indexer.index(&mut store).unwrap();

    let content = fs::read_to_string(dir.path().join("big.rs")).unwrap();
    let excerpt = ExcerptExtractor::extract("big.rs", &content, None, None, Snapshot::Excerpts);
    assert!(excerpt.truncated);
    assert_eq!(excerpt.end_line, 120);

    let _ = HashMap::<String, String>::new();
}
