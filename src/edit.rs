use std::path::PathBuf;
use thiserror::Error;

/// The fundamental edit primitive: line-range replacement over a snapshot.
///
/// All wire-format actions compile down to this single primitive plus the
/// create/delete/rename flags on [`FileEdit`]. Intelligence lives in range
/// resolution (the dialect header decoders), not in application.
///
/// `start` and `end` address a half-open, 0-indexed range `[start, end)` of
/// the file's pre-edit snapshot. `start == end` is a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// First replaced line (inclusive)
    pub start: usize,
    /// One past the last replaced line (exclusive)
    pub end: usize,
    /// Lines inserted in place of `[start, end)`
    pub new_lines: Vec<String>,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("invalid line range: [{start}, {end})")]
    InvalidRange { start: usize, end: usize },

    #[error("line range [{start}, {end}) exceeds snapshot of {len} lines")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("overlapping replacements: [{0}, {1}) and [{2}, {3})")]
    OverlappingReplacements(usize, usize, usize, usize),
}

impl Replacement {
    pub fn new(start: usize, end: usize, new_lines: Vec<String>) -> Result<Self, EditError> {
        if start > end {
            return Err(EditError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            new_lines,
        })
    }

    /// Apply this replacement to a snapshot, yielding
    /// `lines[..start] + new_lines + lines[end..]`.
    pub fn apply(&self, lines: &[String]) -> Result<Vec<String>, EditError> {
        if self.end > lines.len() {
            return Err(EditError::RangeOutOfBounds {
                start: self.start,
                end: self.end,
                len: lines.len(),
            });
        }
        let mut updated = Vec::with_capacity(lines.len() + self.new_lines.len());
        updated.extend_from_slice(&lines[..self.start]);
        updated.extend(self.new_lines.iter().cloned());
        updated.extend_from_slice(&lines[self.end..]);
        Ok(updated)
    }
}

/// What a single wire-format block asks for, with exactly the fields that
/// action needs. Invalid combinations (a file deletion carrying a line
/// range) are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Insert { start: usize, end: usize },
    Replace { start: usize, end: usize },
    Delete { start: usize, end: usize },
    CreateFile { path: PathBuf },
    DeleteFile,
    RenameFile { target: PathBuf },
}

impl EditAction {
    /// The affected snapshot range, for the range-carrying actions.
    pub fn line_range(&self) -> Option<(usize, usize)> {
        match self {
            EditAction::Insert { start, end }
            | EditAction::Replace { start, end }
            | EditAction::Delete { start, end } => Some((*start, *end)),
            _ => None,
        }
    }
}

/// A pending mutation of one workspace file: zero or more replacements over
/// the same pre-edit snapshot plus creation/deletion/rename intent.
///
/// A `FileEdit` is built up by the streaming parser as a block's sections
/// complete and is consumed exactly once by the mutation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a FileEdit does nothing until the mutation engine applies it"]
pub struct FileEdit {
    /// Workspace-relative path of the edited file
    pub path: PathBuf,
    /// Replacements over the pre-edit snapshot, in wire order
    pub replacements: Vec<Replacement>,
    pub is_creation: bool,
    pub is_deletion: bool,
    /// Destination path for a rename, workspace-relative
    pub rename_target: Option<PathBuf>,
}

impl FileEdit {
    /// An in-place update of an existing tracked file.
    pub fn update(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            replacements: Vec::new(),
            is_creation: false,
            is_deletion: false,
            rename_target: None,
        }
    }

    pub fn creation(path: impl Into<PathBuf>) -> Self {
        Self {
            is_creation: true,
            ..Self::update(path)
        }
    }

    pub fn deletion(path: impl Into<PathBuf>) -> Self {
        Self {
            is_deletion: true,
            ..Self::update(path)
        }
    }

    pub fn rename(path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            rename_target: Some(target.into()),
            ..Self::update(path)
        }
    }

    /// Reject replacements whose snapshot ranges overlap.
    ///
    /// Ranges are half-open, so two insertions at the same line, or a range
    /// ending exactly where the next begins, do not overlap.
    pub fn validate_replacements(&self) -> Result<(), EditError> {
        let mut ranges: Vec<(usize, usize)> = self
            .replacements
            .iter()
            .map(|r| (r.start, r.end))
            .collect();
        ranges.sort_unstable();
        for window in ranges.windows(2) {
            let (earlier, later) = (window[0], window[1]);
            if earlier.1 > later.0 {
                return Err(EditError::OverlappingReplacements(
                    earlier.0, earlier.1, later.0, later.1,
                ));
            }
        }
        Ok(())
    }

    /// Compute the post-edit lines for this file.
    ///
    /// Replacements are applied in descending order of `start` (bottom of the
    /// file first) so every range stays valid relative to the original
    /// snapshot no matter how many lines earlier replacements insert or
    /// remove. Overlaps are rejected before anything is touched.
    pub fn updated_lines(&self, snapshot: &[String]) -> Result<Vec<String>, EditError> {
        self.validate_replacements()?;

        let mut order: Vec<usize> = (0..self.replacements.len()).collect();
        order.sort_by_key(|&i| self.replacements[i].start);

        let mut lines = snapshot.to_vec();
        for &i in order.iter().rev() {
            lines = self.replacements[i].apply(&lines)?;
        }
        Ok(lines)
    }
}
