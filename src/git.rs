//! §4.5 GitProbe. A contract, not a shell-string protocol: implementations
//! may shell to `git` or use a library. This one uses `git2` and resolves
//! the §9 Open Question by walking history exactly once per probe
//! construction (a single in-process revwalk) rather than per file.

use crate::model::GitSignal;
use chrono::{TimeZone, Utc};
use git2::{Repository, Sort};
use std::collections::HashMap;
use std::path::Path;

pub trait GitProbe: Send + Sync {
    fn is_available(&self) -> bool;
    fn commit_count(&self, path: &str) -> u32;
    fn last_modified(&self, path: &str) -> Option<String>;
    fn churn(&self, path: &str) -> f32;
    fn recent_files(&self, since_days: i64, limit: usize) -> Vec<String>;
    fn hotspots(&self, limit: usize) -> Vec<(String, f32)>;
    /// Normalized 6-month hotspot score for a single path (§4.5); 0.0 when
    /// the path has no recent history or the repo has no history at all.
    fn hotspot_score(&self, path: &str) -> f32;
    fn head_commit(&self) -> Option<String>;
    fn current_branch(&self) -> Option<String>;
    /// Batched fetch for every path the Indexer knows about; the default
    /// implementation calls the per-path methods, but a real probe
    /// precomputes everything in one revwalk (see `Git2Probe::signals_for`).
    fn signals_for(&self, paths: &[String]) -> Vec<GitSignal> {
        paths
            .iter()
            .map(|p| GitSignal {
                path: p.clone(),
                last_modified: self.last_modified(p),
                commit_count: self.commit_count(p),
                churn_score: self.churn(p),
                hotspot_score: self.hotspot_score(p),
            })
            .collect()
    }
}

/// Used when `git rev-parse --git-dir` would fail (no repository): every
/// operation returns empty, per §4.5.
pub struct NullGitProbe;

impl GitProbe for NullGitProbe {
    fn is_available(&self) -> bool {
        false
    }
    fn commit_count(&self, _path: &str) -> u32 {
        0
    }
    fn last_modified(&self, _path: &str) -> Option<String> {
        None
    }
    fn churn(&self, _path: &str) -> f32 {
        0.0
    }
    fn recent_files(&self, _since_days: i64, _limit: usize) -> Vec<String> {
        Vec::new()
    }
    fn hotspots(&self, _limit: usize) -> Vec<(String, f32)> {
        Vec::new()
    }
    fn hotspot_score(&self, _path: &str) -> f32 {
        0.0
    }
    fn head_commit(&self) -> Option<String> {
        None
    }
    fn current_branch(&self) -> Option<String> {
        None
    }
    fn signals_for(&self, _paths: &[String]) -> Vec<GitSignal> {
        Vec::new()
    }
}

#[derive(Default, Clone)]
struct PathHistory {
    commit_count: u32,
    last_commit_time: Option<i64>,
    /// (additions + deletions) per commit touching the path, within the
    /// last 3 months, used for churn.
    recent_changes: u32,
    /// Commit count within the last 6 months, used for hotspots.
    recent_commit_count_6mo: u32,
    last_activity_time: Option<i64>,
}

pub struct Git2Probe {
    repo_root: std::path::PathBuf,
    history: HashMap<String, PathHistory>,
    head: Option<String>,
    branch: Option<String>,
}

const CHURN_WINDOW_SECS: i64 = 90 * 24 * 3600;
const HOTSPOT_WINDOW_SECS: i64 = 182 * 24 * 3600;

impl Git2Probe {
    /// Opens the repository at `root` (if any) and performs the single
    /// batched revwalk described in SPEC_FULL.md §3. `root` not being a git
    /// repository is not an error — it simply produces an unavailable
    /// probe, per §4.5 / §7 (GitError degrades to empty, never fatal).
    pub fn open(root: &Path) -> Box<dyn GitProbe> {
        match Self::build(root) {
            Ok(probe) => Box::new(probe),
            Err(e) => {
                tracing::debug!("git probe unavailable at {}: {e}", root.display());
                Box::new(NullGitProbe)
            }
        }
    }

    fn build(root: &Path) -> Result<Self, git2::Error> {
        let repo = Repository::discover(root)?;
        let repo_root = repo
            .workdir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.to_path_buf());

        let head = repo.head().ok().and_then(|h| h.target()).map(|oid| oid.to_string());
        let branch = repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(|s| s.to_string()));

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.push_head()?;

        let now = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .map(|c| c.time().seconds())
            .unwrap_or(0);

        let mut history: HashMap<String, PathHistory> = HashMap::new();

        for oid in revwalk.flatten() {
            let commit = match repo.find_commit(oid) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let commit_time = commit.time().seconds();
            let tree = match commit.tree() {
                Ok(t) => t,
                Err(_) => continue,
            };
            let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());

            let diff = match repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None) {
                Ok(d) => d,
                Err(_) => continue,
            };

            let mut touched: Vec<String> = Vec::new();
            let _ = diff.foreach(
                &mut |delta, _| {
                    if let Some(p) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                        touched.push(crate::scanner::normalize_path(p));
                    }
                    true
                },
                None,
                None,
                None,
            );

            let stats = diff.stats().ok();
            let insertions = stats.as_ref().map(|s| s.insertions()).unwrap_or(0) as u32;
            let deletions = stats.as_ref().map(|s| s.deletions()).unwrap_or(0) as u32;
            let per_file_changes = if touched.is_empty() {
                0
            } else {
                (insertions + deletions) / touched.len() as u32
            };

            for path in touched {
                let entry = history.entry(path).or_default();
                entry.commit_count += 1;
                entry.last_commit_time = Some(
                    entry
                        .last_commit_time
                        .map(|t| t.max(commit_time))
                        .unwrap_or(commit_time),
                );
                entry.last_activity_time = entry.last_commit_time;
                if now - commit_time <= CHURN_WINDOW_SECS {
                    entry.recent_changes += per_file_changes;
                }
                if now - commit_time <= HOTSPOT_WINDOW_SECS {
                    entry.recent_commit_count_6mo += 1;
                }
            }
        }

        Ok(Self {
            repo_root,
            history,
            head,
            branch,
        })
    }
}

impl GitProbe for Git2Probe {
    fn is_available(&self) -> bool {
        true
    }

    fn commit_count(&self, path: &str) -> u32 {
        self.history.get(path).map(|h| h.commit_count).unwrap_or(0)
    }

    fn last_modified(&self, path: &str) -> Option<String> {
        self.history
            .get(path)
            .and_then(|h| h.last_commit_time)
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
            .map(|dt| dt.to_rfc3339())
    }

    fn churn(&self, path: &str) -> f32 {
        let changes = self.history.get(path).map(|h| h.recent_changes).unwrap_or(0);
        (changes as f32 / 1000.0).min(1.0)
    }

    fn recent_files(&self, since_days: i64, limit: usize) -> Vec<String> {
        let cutoff = self
            .history
            .values()
            .filter_map(|h| h.last_activity_time)
            .max()
            .unwrap_or(0)
            - since_days * 24 * 3600;
        let mut items: Vec<(&String, i64)> = self
            .history
            .iter()
            .filter_map(|(p, h)| h.last_activity_time.map(|t| (p, t)))
            .filter(|(_, t)| *t >= cutoff)
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items.into_iter().take(limit).map(|(p, _)| p.clone()).collect()
    }

    fn hotspots(&self, limit: usize) -> Vec<(String, f32)> {
        let max_count = self.max_recent_commit_count_6mo();
        if max_count == 0 {
            return Vec::new();
        }
        let mut items: Vec<(String, f32)> = self
            .history
            .iter()
            .map(|(p, h)| (p.clone(), h.recent_commit_count_6mo as f32 / max_count as f32))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        items.truncate(limit);
        items
    }

    fn hotspot_score(&self, path: &str) -> f32 {
        let max_count = self.max_recent_commit_count_6mo();
        if max_count == 0 {
            return 0.0;
        }
        let count = self.history.get(path).map(|h| h.recent_commit_count_6mo).unwrap_or(0);
        count as f32 / max_count as f32
    }

    fn head_commit(&self) -> Option<String> {
        self.head.clone()
    }

    fn current_branch(&self) -> Option<String> {
        self.branch.clone()
    }

    fn signals_for(&self, paths: &[String]) -> Vec<GitSignal> {
        let max_count = self.max_recent_commit_count_6mo();
        paths
            .iter()
            .map(|p| {
                let count = self.history.get(p).map(|h| h.recent_commit_count_6mo).unwrap_or(0);
                let hotspot_score = if max_count == 0 { 0.0 } else { count as f32 / max_count as f32 };
                GitSignal {
                    path: p.clone(),
                    last_modified: self.last_modified(p),
                    commit_count: self.commit_count(p),
                    churn_score: self.churn(p),
                    hotspot_score,
                }
            })
            .collect()
    }
}

impl Git2Probe {
    fn max_recent_commit_count_6mo(&self) -> u32 {
        self.history.values().map(|h| h.recent_commit_count_6mo).max().unwrap_or(0)
    }
}

impl Git2Probe {
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_probe_is_always_empty() {
        let probe = NullGitProbe;
        assert!(!probe.is_available());
        assert_eq!(probe.commit_count("x"), 0);
        assert!(probe.last_modified("x").is_none());
        assert_eq!(probe.churn("x"), 0.0);
        assert!(probe.hotspots(10).is_empty());
    }

    #[test]
    fn non_repo_dir_degrades_to_null_probe() {
        let dir = tempfile::tempdir().unwrap();
        let probe = Git2Probe::open(dir.path());
        assert!(!probe.is_available());
    }
}
