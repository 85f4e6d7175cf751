use crate::errors::*;
use codeatlas_core::{ChangeType, ChangedFile};
use git2::{BranchType, Delta, DiffOptions, Repository, RepositoryOpenFlags};
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Result of comparing two revisions.
#[derive(Debug, Clone)]
pub enum DiffOutcome {
    Changes(Vec<ChangedFile>),
    /// The before-revision is gone from history (forced push). The caller
    /// must fall back to a full rescan; this is never reported as "no changes".
    FullRescanRequired { missing_revision: String },
}

pub struct DiffComputer {
    repo: Repository,
}

impl DiffComputer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let repo = Repository::open_ext(
            path_ref,
            RepositoryOpenFlags::empty(),
            &[] as &[&std::ffi::OsStr],
        )
        .map_err(|_| GitIntegrationError::RepoNotFound(path_ref.display().to_string()))?;
        Ok(Self { repo })
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Tree-to-tree diff between two revisions, normalized into changed-file
    /// records. Rename detection is deliberately off: a moved file surfaces
    /// as removed + added, matching the engine's delete-and-recreate
    /// identity model.
    pub fn diff(&self, before: &str, after: &str) -> Result<DiffOutcome> {
        let before_commit = match self.repo.revparse_single(before) {
            Ok(obj) => obj.peel_to_commit()?,
            Err(e) => {
                warn!(
                    revision = before,
                    error = %e,
                    "before-revision unresolvable, signalling full rescan"
                );
                return Ok(DiffOutcome::FullRescanRequired {
                    missing_revision: before.to_string(),
                });
            }
        };
        let after_commit = self.repo.revparse_single(after)?.peel_to_commit()?;

        let before_tree = before_commit.tree()?;
        let after_tree = after_commit.tree()?;
        let mut opts = DiffOptions::new();
        let diff = self.repo.diff_tree_to_tree(
            Some(&before_tree),
            Some(&after_tree),
            Some(&mut opts),
        )?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let (path, change_type) = match delta.status() {
                Delta::Added | Delta::Copied => (delta.new_file().path(), ChangeType::Added),
                Delta::Deleted => (delta.old_file().path(), ChangeType::Removed),
                Delta::Modified | Delta::Typechange => {
                    (delta.new_file().path(), ChangeType::Modified)
                }
                // With rename detection off libgit2 reports renames as
                // delete + add pairs; this arm is unreachable in practice.
                Delta::Renamed => {
                    if let Some(old) = normalize(delta.old_file().path()) {
                        changes.push(ChangedFile::new(old, ChangeType::Removed));
                    }
                    (delta.new_file().path(), ChangeType::Added)
                }
                _ => continue,
            };
            match normalize(path) {
                Some(p) => changes.push(ChangedFile::new(p, change_type)),
                None => debug!("skipping diff entry with unusable path"),
            }
        }
        debug!(
            before,
            after,
            files = changes.len(),
            "computed revision diff"
        );
        Ok(DiffOutcome::Changes(changes))
    }

    /// Fetch the branch from origin and fast-forward the local ref to it.
    pub fn pull_latest(&self, branch: &str) -> Result<()> {
        if self.repo.is_bare() {
            return Err(GitIntegrationError::BareRepository);
        }
        let mut remote = self.repo.find_remote("origin")?;
        remote.fetch(&[branch], None, None)?;

        let fetch_head = self
            .repo
            .revparse_single(&format!("refs/remotes/origin/{}", branch))?
            .id();
        let lb = self
            .repo
            .find_branch(branch, BranchType::Local)
            .map_err(|_| GitIntegrationError::BranchNotFound(branch.to_string()))?;
        let mut lb_ref = lb.into_reference();
        let analysis = self
            .repo
            .merge_analysis(&[&self.repo.find_annotated_commit(fetch_head)?])?;
        if analysis.0.is_fast_forward() {
            lb_ref.set_target(fetch_head, "fast-forward")?;
            self.repo.set_head(&format!("refs/heads/{}", branch))?;
            self.repo.checkout_head(None)?;
        }
        Ok(())
    }
}

/// Repo-relative, forward-slash path; entries that escape the workspace or
/// are not valid UTF-8 are dropped.
fn normalize(path: Option<&Path>) -> Option<String> {
    let path = path?;
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    let s = path.to_str()?;
    Some(s.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        // add_all does not record deletions; bring the index in line with
        // the working tree before writing it out.
        index
            .update_all(["*"].iter(), None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn fixture() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn classifies_added_modified_removed() {
        let (dir, repo) = fixture();
        fs::write(dir.path().join("a.ts"), "export function foo() {}\n").unwrap();
        fs::write(dir.path().join("b.ts"), "export function bar() {}\n").unwrap();
        let first = commit_all(&repo, "initial");

        fs::write(dir.path().join("a.ts"), "export function foo() { return 1 }\n").unwrap();
        fs::write(dir.path().join("c.ts"), "export function baz() {}\n").unwrap();
        fs::remove_file(dir.path().join("b.ts")).unwrap();
        let second = commit_all(&repo, "churn");

        let computer = DiffComputer::open(dir.path()).unwrap();
        let outcome = computer
            .diff(&first.to_string(), &second.to_string())
            .unwrap();
        let mut changes = match outcome {
            DiffOutcome::Changes(c) => c,
            DiffOutcome::FullRescanRequired { .. } => panic!("unexpected rescan signal"),
        };
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            changes,
            vec![
                ChangedFile::new("a.ts", ChangeType::Modified),
                ChangedFile::new("b.ts", ChangeType::Removed),
                ChangedFile::new("c.ts", ChangeType::Added),
            ]
        );
    }

    #[test]
    fn missing_before_revision_signals_full_rescan() {
        let (dir, repo) = fixture();
        fs::write(dir.path().join("a.ts"), "let x = 1\n").unwrap();
        let head = commit_all(&repo, "initial");

        let computer = DiffComputer::open(dir.path()).unwrap();
        let outcome = computer
            .diff("0000000000000000000000000000000000000000", &head.to_string())
            .unwrap();
        match outcome {
            DiffOutcome::FullRescanRequired { missing_revision } => {
                assert!(missing_revision.starts_with("0000"));
            }
            DiffOutcome::Changes(_) => panic!("missing base must not look like an empty diff"),
        }
    }
}
