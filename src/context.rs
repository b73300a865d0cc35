use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Content of a tracked file as last observed before a generation request.
///
/// The lines are the baseline every [`crate::edit::Replacement`] addresses;
/// the fingerprint is the baseline for out-of-band change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub lines: Vec<String>,
    fingerprint: u64,
}

impl FileSnapshot {
    pub fn from_content(content: &str) -> Self {
        Self {
            lines: split_lines(content),
            fingerprint: xxh3_64(content.as_bytes()),
        }
    }

    pub fn empty() -> Self {
        Self::from_content("")
    }

    /// Check whether `content` still matches the snapshot.
    pub fn matches(&self, content: &str) -> bool {
        self.fingerprint == xxh3_64(content.as_bytes())
    }
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("path escapes the workspace root: {0}")]
    OutsideWorkspace(PathBuf),

    #[error("absolute path not allowed in wire format: {0}")]
    AbsolutePath(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Explicit per-session state shared by the parser and the mutation engine:
/// the workspace root all wire-format paths resolve against, and the set of
/// in-scope files with their pre-edit snapshots.
///
/// Only tracked files may be edited; untracked paths may only be created.
#[derive(Debug)]
pub struct SessionContext {
    root: PathBuf,
    files: HashMap<PathBuf, FileSnapshot>,
}

impl SessionContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative wire-format path to an absolute one.
    ///
    /// The path is normalized lexically (the target may not exist yet, so
    /// canonicalization is not an option) and rejected if it is absolute or
    /// climbs out of the root via `..`.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, ScopeError> {
        Ok(self.root.join(normalize_rel(path)?))
    }

    /// Admit a file into the working set, snapshotting its current content.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> Result<(), ScopeError> {
        let rel = normalize_rel(&path.into())?;
        let abs = self.root.join(&rel);
        let content = fs::read_to_string(&abs).map_err(|source| ScopeError::Read {
            path: abs.clone(),
            source,
        })?;
        log::debug!("tracking {} ({} bytes)", rel.display(), content.len());
        self.files.insert(rel, FileSnapshot::from_content(&content));
        Ok(())
    }

    /// Admit a file whose baseline content the caller already holds, e.g.
    /// when an outer context-selection layer did the reading.
    pub fn track_with_content(
        &mut self,
        path: impl Into<PathBuf>,
        content: &str,
    ) -> Result<(), ScopeError> {
        let rel = normalize_rel(&path.into())?;
        self.files.insert(rel, FileSnapshot::from_content(content));
        Ok(())
    }

    /// Register a freshly created file with an empty snapshot.
    pub fn track_new(&mut self, path: impl Into<PathBuf>) -> Result<(), ScopeError> {
        let rel = normalize_rel(&path.into())?;
        self.files.insert(rel, FileSnapshot::empty());
        Ok(())
    }

    pub fn untrack(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn snapshot(&self, path: &Path) -> Option<&FileSnapshot> {
        self.files.get(path)
    }

    /// Refresh a tracked file's snapshot after the engine rewrote it, so the
    /// file's new content becomes the baseline for any later batch.
    pub fn refresh(&mut self, path: &Path, content: &str) {
        self.files
            .insert(path.to_path_buf(), FileSnapshot::from_content(content));
    }

    pub fn tracked_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

/// Split file content into lines the way the wire format addresses them:
/// on `\n`, keeping a trailing empty line when the file ends with a newline.
/// The inverse operation is a plain `join("\n")`.
pub fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

/// Lexically normalize a workspace-relative path, rejecting absolute paths
/// and any `..` sequence that would climb out of the root.
fn normalize_rel(path: &Path) -> Result<PathBuf, ScopeError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ScopeError::OutsideWorkspace(path.to_path_buf()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ScopeError::AbsolutePath(path.to_path_buf()));
            }
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_split_lines_keeps_trailing_newline() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b", ""]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_split_join_round_trip() {
        let content = "fn main() {\n    println!(\"hi\");\n}\n";
        assert_eq!(split_lines(content).join("\n"), content);
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let ctx = SessionContext::new("/workspace");
        let result = ctx.resolve(Path::new("../outside.rs"));
        assert!(matches!(result, Err(ScopeError::OutsideWorkspace(_))));
    }

    #[test]
    fn test_resolve_rejects_absolute() {
        let ctx = SessionContext::new("/workspace");
        let result = ctx.resolve(Path::new("/etc/passwd"));
        assert!(matches!(result, Err(ScopeError::AbsolutePath(_))));
    }

    #[test]
    fn test_resolve_normalizes_internal_dotdot() {
        let ctx = SessionContext::new("/workspace");
        let resolved = ctx.resolve(Path::new("src/../lib/mod.rs")).unwrap();
        assert_eq!(resolved, Path::new("/workspace/lib/mod.rs"));
    }

    #[test]
    fn test_track_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "one\ntwo\n").unwrap();

        let mut ctx = SessionContext::new(dir.path());
        ctx.track("f.txt").unwrap();

        assert!(ctx.is_tracked(Path::new("f.txt")));
        let snapshot = ctx.snapshot(Path::new("f.txt")).unwrap();
        assert_eq!(snapshot.lines, vec!["one", "two", ""]);
        assert!(snapshot.matches("one\ntwo\n"));
        assert!(!snapshot.matches("one\ntwo\nthree\n"));
    }

    #[test]
    fn test_track_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = SessionContext::new(dir.path());
        assert!(matches!(ctx.track("gone.txt"), Err(ScopeError::Read { .. })));
    }

    #[test]
    fn test_untrack() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "x").unwrap();

        let mut ctx = SessionContext::new(dir.path());
        ctx.track("f.txt").unwrap();
        ctx.untrack(Path::new("f.txt"));
        assert!(!ctx.is_tracked(Path::new("f.txt")));
    }
}
