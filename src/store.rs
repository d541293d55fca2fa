//! §4.1 Store. A single SQLite database (`rusqlite`, bundled) holding
//! files/symbols/imports/git_signals plus an FTS5 full-text index over file
//! content. All writes go through one connection behind a mutex-free
//! `&mut self` API; callers serialize access (the Indexer owns the only
//! writer).

use crate::error::{ContextError, Result};
use crate::keywords::split_words;
use crate::model::{FileRecord, GitSignal, ImportEdge, Language, SymbolKind, SymbolRecord};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::OnceLock;

pub struct Store {
    conn: Connection,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StoreStats {
    pub file_count: u64,
    pub symbol_count: u64,
    pub import_count: u64,
    pub total_bytes: u64,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mtime_ms INTEGER NOT NULL,
    content_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    signature TEXT
);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
    target_path TEXT NOT NULL,
    symbol TEXT
);
CREATE INDEX IF NOT EXISTS idx_imports_source ON imports(source_path);
CREATE INDEX IF NOT EXISTS idx_imports_target ON imports(target_path);

CREATE TABLE IF NOT EXISTS git_signals (
    path TEXT PRIMARY KEY REFERENCES files(path) ON DELETE CASCADE,
    last_modified TEXT,
    commit_count INTEGER NOT NULL DEFAULT 0,
    churn_score REAL NOT NULL DEFAULT 0.0,
    hotspot_score REAL NOT NULL DEFAULT 0.0
);

CREATE VIRTUAL TABLE IF NOT EXISTS file_content_fts USING fts5(
    path UNINDEXED,
    content,
    tokenize = 'porter unicode61'
);
"#;

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContextError::io(parent, e))?;
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn upsert_file(&mut self, file: &FileRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO files (path, language, size_bytes, mtime_ms, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                size_bytes = excluded.size_bytes,
                mtime_ms = excluded.mtime_ms,
                content_hash = excluded.content_hash",
            params![
                file.path,
                file.language.as_str(),
                file.size_bytes,
                file.mtime_ms,
                file.content_hash,
            ],
        )?;
        Ok(())
    }

    pub fn delete_file(&mut self, path: &str) -> Result<()> {
        self.conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        self.conn
            .execute("DELETE FROM file_content_fts WHERE path = ?1", params![path])?;
        Ok(())
    }

    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT path, language, size_bytes, mtime_ms, content_hash FROM files WHERE path = ?1",
                params![path],
                |r| {
                    Ok(FileRecord {
                        path: r.get(0)?,
                        language: Language::from_str_loose(&r.get::<_, String>(1)?),
                        size_bytes: r.get(2)?,
                        mtime_ms: r.get(3)?,
                        content_hash: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, language, size_bytes, mtime_ms, content_hash FROM files")?;
        let rows = stmt.query_map([], |r| {
            Ok(FileRecord {
                path: r.get(0)?,
                language: Language::from_str_loose(&r.get::<_, String>(1)?),
                size_bytes: r.get(2)?,
                mtime_ms: r.get(3)?,
                content_hash: r.get(4)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    pub fn clear_symbols_for_file(&mut self, path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM symbols WHERE file_path = ?1", params![path])?;
        Ok(())
    }

    pub fn insert_symbol(&mut self, symbol: &SymbolRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO symbols (file_path, name, kind, start_line, end_line, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                symbol.file_path,
                symbol.name,
                symbol.kind.as_str(),
                symbol.start_line,
                symbol.end_line,
                symbol.signature,
            ],
        )?;
        Ok(())
    }

    pub fn clear_imports_for_file(&mut self, source_path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM imports WHERE source_path = ?1", params![source_path])?;
        Ok(())
    }

    pub fn insert_import(&mut self, edge: &ImportEdge) -> Result<()> {
        self.conn.execute(
            "INSERT INTO imports (source_path, target_path, symbol) VALUES (?1, ?2, ?3)",
            params![edge.source_path, edge.target_path, edge.symbol],
        )?;
        Ok(())
    }

    pub fn upsert_git_signal(&mut self, signal: &GitSignal) -> Result<()> {
        self.conn.execute(
            "INSERT INTO git_signals (path, last_modified, commit_count, churn_score, hotspot_score)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                last_modified = excluded.last_modified,
                commit_count = excluded.commit_count,
                churn_score = excluded.churn_score,
                hotspot_score = excluded.hotspot_score",
            params![
                signal.path,
                signal.last_modified,
                signal.commit_count,
                signal.churn_score,
                signal.hotspot_score,
            ],
        )?;
        Ok(())
    }

    pub fn get_git_signal(&self, path: &str) -> Result<Option<GitSignal>> {
        let row = self
            .conn
            .query_row(
                "SELECT path, last_modified, commit_count, churn_score, hotspot_score
                 FROM git_signals WHERE path = ?1",
                params![path],
                |r| {
                    Ok(GitSignal {
                        path: r.get(0)?,
                        last_modified: r.get(1)?,
                        commit_count: r.get(2)?,
                        churn_score: r.get(3)?,
                        hotspot_score: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Replaces the FTS row for `path` with `content`. Safe to call
    /// repeatedly for the same path; the old row is deleted first since
    /// FTS5 has no native upsert. `content` is expanded into a decomposed
    /// token stream before indexing (see `decompose_for_fts`).
    pub fn index_file_content(&mut self, path: &str, content: &str) -> Result<()> {
        let decomposed = decompose_for_fts(content);
        self.conn
            .execute("DELETE FROM file_content_fts WHERE path = ?1", params![path])?;
        self.conn.execute(
            "INSERT INTO file_content_fts (path, content) VALUES (?1, ?2)",
            params![path, decomposed],
        )?;
        Ok(())
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let file_count: u64 = self.conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        let symbol_count: u64 = self.conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let import_count: u64 = self.conn.query_row("SELECT COUNT(*) FROM imports", [], |r| r.get(0))?;
        let total_bytes: u64 = self
            .conn
            .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM files", [], |r| r.get(0))?;
        Ok(StoreStats {
            file_count,
            symbol_count,
            import_count,
            total_bytes,
        })
    }

    pub fn find_symbols_by_name(&self, name: &str) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, name, kind, start_line, end_line, signature
             FROM symbols WHERE name = ?1",
        )?;
        let rows = stmt.query_map(params![name], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    /// Case-insensitive substring match, used when an exact name lookup
    /// misses (spec §4.10 symbol-match channel).
    pub fn find_symbols_by_fuzzy(&self, needle: &str, limit: usize) -> Result<Vec<SymbolRecord>> {
        let pattern = format!("%{}%", needle.to_lowercase());
        let mut stmt = self.conn.prepare(
            "SELECT file_path, name, kind, start_line, end_line, signature
             FROM symbols WHERE LOWER(name) LIKE ?1 LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], row_to_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    pub fn find_files_by_basename(&self, basename: &str) -> Result<Vec<String>> {
        let pattern = format!("%/{}", basename);
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM files WHERE path = ?1 OR path LIKE ?2")?;
        let rows = stmt.query_map(params![basename, pattern], |r| r.get::<_, String>(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    /// BM25-ranked full text search, ordered best match first.
    pub fn fulltext_search(&self, query: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let escaped = fts_escape(query);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT path, bm25(file_content_fts) AS rank
             FROM file_content_fts WHERE file_content_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![escaped, limit as i64], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    /// Direct import-graph neighbors of `path`: files it imports and files
    /// that import it (depth 1, per spec §4.10's graph-related channel).
    pub fn neighbors_of(&self, path: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT target_path FROM imports WHERE source_path = ?1")?;
        let mut out: Vec<String> = stmt
            .query_map(params![path], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT source_path FROM imports WHERE target_path = ?1")?;
        let incoming: Vec<String> = stmt
            .query_map(params![path], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        out.extend(incoming);
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Ranks by §4.5's 6-month-commit-count hotspot metric (`hotspot_score`),
    /// not `churn_score` — churn measures recent line turnover, hotspots
    /// measure how often a path gets touched.
    pub fn top_hotspots(&self, limit: usize) -> Result<Vec<(String, f32)>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, hotspot_score FROM git_signals
             WHERE hotspot_score > 0 ORDER BY hotspot_score DESC, path ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, f32>(1)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ContextError::from)
    }

    pub fn transaction(&mut self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

fn row_to_symbol(r: &rusqlite::Row) -> rusqlite::Result<SymbolRecord> {
    let kind_str: String = r.get(2)?;
    Ok(SymbolRecord {
        file_path: r.get(0)?,
        name: r.get(1)?,
        kind: SymbolKind::from_str_loose(&kind_str).unwrap_or(SymbolKind::Variable),
        start_line: r.get(3)?,
        end_line: r.get(4)?,
        signature: r.get(5)?,
    })
}

fn fts_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap())
}

/// `tokenize = 'porter unicode61'` never splits compound identifiers —
/// `PaymentService` and `handleWebhook` each come out as one opaque token,
/// so a query for "payment" or "webhook" alone can never MATCH them. Before
/// a file's content reaches the FTS table, every identifier-like run is
/// kept verbatim *and* exploded into its `split_words` subwords, so the
/// index carries both `handlewebhook` and the standalone `handle`/`webhook`
/// tokens a keyword search actually looks for.
fn decompose_for_fts(content: &str) -> String {
    let mut out = String::with_capacity(content.len() * 2);
    for tok in fts_word_re().find_iter(content) {
        let raw = tok.as_str();
        out.push_str(raw);
        out.push(' ');
        for sub in split_words(raw) {
            if sub.len() > 1 {
                out.push_str(&sub.to_lowercase());
                out.push(' ');
            }
        }
    }
    out
}

/// FTS5 MATCH syntax treats `.`, `-`, `:` etc. specially; quote each token
/// so identifiers like `PaymentService.ts` or `user-auth` search literally.
fn fts_escape(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    fn sample_file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: Language::TypeScript,
            size_bytes: 100,
            mtime_ms: 0,
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn upsert_and_get_file_roundtrips() {
        let mut store = Store::open_in_memory().unwrap();
        let file = sample_file("src/a.ts");
        store.upsert_file(&file).unwrap();
        let fetched = store.get_file("src/a.ts").unwrap().unwrap();
        assert_eq!(fetched.content_hash, "abc");

        let mut updated = file.clone();
        updated.content_hash = "def".to_string();
        store.upsert_file(&updated).unwrap();
        let fetched = store.get_file("src/a.ts").unwrap().unwrap();
        assert_eq!(fetched.content_hash, "def");
        assert_eq!(store.get_stats().unwrap().file_count, 1);
    }

    #[test]
    fn delete_file_cascades_symbols_and_imports() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("src/a.ts")).unwrap();
        store
            .insert_symbol(&SymbolRecord {
                file_path: "src/a.ts".to_string(),
                name: "Foo".to_string(),
                kind: SymbolKind::Class,
                start_line: 1,
                end_line: 10,
                signature: None,
            })
            .unwrap();
        store.delete_file("src/a.ts").unwrap();
        assert!(store.find_symbols_by_name("Foo").unwrap().is_empty());
    }

    #[test]
    fn fulltext_search_finds_indexed_content() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("src/services/PaymentService.ts")).unwrap();
        store
            .index_file_content(
                "src/services/PaymentService.ts",
                "class PaymentService { handleWebhook() {} }",
            )
            .unwrap();
        let hits = store.fulltext_search("webhook", 10).unwrap();
        assert_eq!(hits[0].0, "src/services/PaymentService.ts");
    }

    #[test]
    fn fulltext_search_matches_compound_identifier_subwords() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("src/services/PaymentService.ts")).unwrap();
        store
            .index_file_content(
                "src/services/PaymentService.ts",
                "export class PaymentService {\n  handleWebhook(payload: string) {}\n}\n",
            )
            .unwrap();
        // Neither "payment" nor "webhook" appears verbatim in the source —
        // they're only substrings of the compound identifiers
        // `PaymentService` and `handleWebhook`.
        assert_eq!(store.fulltext_search("payment", 10).unwrap()[0].0, "src/services/PaymentService.ts");
        assert_eq!(store.fulltext_search("webhook", 10).unwrap()[0].0, "src/services/PaymentService.ts");
    }

    #[test]
    fn top_hotspots_ranks_by_hotspot_score_not_churn() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("src/hot.ts")).unwrap();
        store.upsert_file(&sample_file("src/churny.ts")).unwrap();
        store
            .upsert_git_signal(&GitSignal {
                path: "src/hot.ts".to_string(),
                last_modified: None,
                commit_count: 40,
                churn_score: 0.1,
                hotspot_score: 0.9,
            })
            .unwrap();
        store
            .upsert_git_signal(&GitSignal {
                path: "src/churny.ts".to_string(),
                last_modified: None,
                commit_count: 2,
                churn_score: 0.8,
                hotspot_score: 0.05,
            })
            .unwrap();
        let ranked = store.top_hotspots(10).unwrap();
        assert_eq!(ranked[0].0, "src/hot.ts");
    }

    #[test]
    fn neighbors_of_includes_both_directions() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("a.ts")).unwrap();
        store.upsert_file(&sample_file("b.ts")).unwrap();
        store
            .insert_import(&ImportEdge {
                source_path: "a.ts".to_string(),
                target_path: "b.ts".to_string(),
                symbol: None,
            })
            .unwrap();
        assert_eq!(store.neighbors_of("a.ts").unwrap(), vec!["b.ts".to_string()]);
        assert_eq!(store.neighbors_of("b.ts").unwrap(), vec!["a.ts".to_string()]);
    }
}
