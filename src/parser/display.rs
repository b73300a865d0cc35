use crate::edit::EditAction;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Ephemeral description of one pending edit, derived from the pre-edit
/// snapshot when a block's header finishes decoding.
///
/// This exists so a consumer can show *where* a change lands (file, action,
/// affected lines) before the replacement content has finished streaming.
/// It is display-only: the mutation engine never reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInformation {
    /// Workspace-relative path, after rename-alias resolution
    pub path: PathBuf,
    pub action: EditAction,
    /// Snapshot lines the action removes, in order
    pub removed_lines: Vec<String>,
}

impl DisplayInformation {
    /// One-line summary, e.g. `replace lines 2-3 of src/main.rs`.
    pub fn describe(&self) -> String {
        let path = self.path.display();
        match &self.action {
            EditAction::Insert { start, .. } => {
                format!("insert at line {} of {}", start + 1, path)
            }
            EditAction::Replace { start, end } => {
                format!("replace lines {}-{} of {}", start + 1, end, path)
            }
            EditAction::Delete { start, end } => {
                format!("delete lines {}-{} of {}", start + 1, end, path)
            }
            EditAction::CreateFile { path } => format!("create {}", path.display()),
            EditAction::DeleteFile => format!("delete {}", path),
            EditAction::RenameFile { target } => {
                format!("rename {} to {}", path, target.display())
            }
        }
    }

    /// Diff-style preview: removed snapshot lines in red, added lines in
    /// green, with 1-indexed line numbers relative to the snapshot.
    pub fn preview(&self, added_lines: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.describe().bold());

        let start = self.action.line_range().map_or(0, |(start, _)| start);
        for (offset, line) in self.removed_lines.iter().enumerate() {
            let numbered = format!("{:>4} - {}", start + offset + 1, line);
            let _ = writeln!(out, "{}", numbered.red());
        }
        for line in added_lines {
            let numbered = format!("{:>4} + {}", "", line);
            let _ = writeln!(out, "{}", numbered.green());
        }
        out
    }
}
