//! File mutation engine: materializes a batch of [`FileEdit`]s on disk.
//!
//! Edits are applied sequentially in batch order. Scope and existence
//! violations abort the whole batch; destructive operations and snapshot
//! drift route through the [`Interaction`] capability and, on decline, skip
//! only the affected edit. Nothing applied earlier is rolled back.

use crate::context::{ScopeError, SessionContext};
use crate::edit::{EditError, FileEdit};
use crate::interact::Interaction;
use colored::Colorize;
use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Batch-fatal failures. No further edits are applied after one of these;
/// edits already applied stay applied.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("attempted to create {0}, which already exists")]
    CreateExisting(PathBuf),

    #[error("attempted to edit non-existent file {0}")]
    MissingTarget(PathBuf),

    #[error("attempted to edit {0}, which is not in scope")]
    OutOfScope(PathBuf),

    #[error("attempted to rename {from} to existing file {to}")]
    RenameTargetExists { from: PathBuf, to: PathBuf },

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("invalid replacements for {path}: {source}")]
    Edit { path: PathBuf, source: EditError },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

/// What became of one edit in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditOutcome reports skips the caller should surface"]
pub enum EditOutcome {
    Applied { path: PathBuf },
    Created { path: PathBuf },
    Deleted { path: PathBuf },
    /// Deletion declined at the confirmation prompt
    DeclinedDeletion { path: PathBuf },
    /// On-disk content drifted from the snapshot and the overwrite was
    /// declined
    SkippedConflict { path: PathBuf },
}

impl fmt::Display for EditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOutcome::Applied { path } => write!(f, "Applied edits to {}", path.display()),
            EditOutcome::Created { path } => write!(f, "Created {}", path.display()),
            EditOutcome::Deleted { path } => write!(f, "Deleted {}", path.display()),
            EditOutcome::DeclinedDeletion { path } => {
                write!(f, "Kept {} (deletion declined)", path.display())
            }
            EditOutcome::SkippedConflict { path } => {
                write!(f, "Skipped {} (changed on disk)", path.display())
            }
        }
    }
}

pub struct MutationEngine<'a> {
    ctx: &'a mut SessionContext,
    interaction: &'a mut dyn Interaction,
}

impl<'a> MutationEngine<'a> {
    pub fn new(ctx: &'a mut SessionContext, interaction: &'a mut dyn Interaction) -> Self {
        Self { ctx, interaction }
    }

    /// Apply a whole batch in order, stopping at the first batch-fatal
    /// error. Returns one outcome per applied or skipped edit.
    pub fn apply(&mut self, edits: Vec<FileEdit>) -> Result<Vec<EditOutcome>, ApplyError> {
        log::info!("applying batch of {} edits", edits.len());
        let mut outcomes = Vec::with_capacity(edits.len());
        for edit in edits {
            outcomes.push(self.apply_one(edit)?);
        }
        Ok(outcomes)
    }

    fn apply_one(&mut self, mut edit: FileEdit) -> Result<EditOutcome, ApplyError> {
        let mut abs = self.ctx.resolve(&edit.path)?;

        if edit.is_creation {
            if abs.exists() {
                return Err(ApplyError::CreateExisting(edit.path));
            }
            self.create_tracked(&abs, &edit.path)?;
            self.interaction
                .notify(&format!("Created {}", edit.path.display()).green().to_string());
        } else {
            if !abs.exists() {
                return Err(ApplyError::MissingTarget(edit.path));
            }
            if !self.ctx.is_tracked(&edit.path) {
                return Err(ApplyError::OutOfScope(edit.path));
            }
        }

        if edit.is_deletion {
            let prompt = format!("Are you sure you want to delete {}?", edit.path.display());
            if self.interaction.ask_yes_no(&prompt.red().to_string(), false) {
                self.interaction
                    .notify(&format!("Deleting {}...", edit.path.display()).red().to_string());
                log::info!("deleting {}", abs.display());
                fs::remove_file(&abs).map_err(|source| ApplyError::Io {
                    path: edit.path.clone(),
                    source,
                })?;
                self.ctx.untrack(&edit.path);
                return Ok(EditOutcome::Deleted { path: edit.path });
            }
            self.interaction
                .notify(&format!("Not deleting {}", edit.path.display()).green().to_string());
            // A rename riding on the same edit is not attempted either.
            return Ok(EditOutcome::DeclinedDeletion { path: edit.path });
        }

        let snapshot = if edit.is_creation {
            Vec::new()
        } else {
            let snapshot = self
                .ctx
                .snapshot(&edit.path)
                .ok_or_else(|| ApplyError::OutOfScope(edit.path.clone()))?;
            let current = fs::read_to_string(&abs).map_err(|source| ApplyError::Io {
                path: edit.path.clone(),
                source,
            })?;
            if !snapshot.matches(&current) {
                log::info!("{} changed while generating edits", edit.path.display());
                let prompt = format!(
                    "File '{}' changed while generating; current file changes will be erased. Continue?",
                    edit.path.display()
                );
                if !self.interaction.ask_yes_no(&prompt.yellow().to_string(), false) {
                    self.interaction
                        .notify(&format!("Not applying changes to {}", edit.path.display()));
                    return Ok(EditOutcome::SkippedConflict { path: edit.path });
                }
            }
            snapshot.lines.clone()
        };

        if let Some(target) = edit.rename_target.take() {
            let abs_target = self.ctx.resolve(&target)?;
            if abs_target.exists() {
                return Err(ApplyError::RenameTargetExists {
                    from: edit.path,
                    to: target,
                });
            }
            // Renames are an add/remove pair so the tracked set stays honest.
            self.create_tracked(&abs_target, &target)?;
            fs::remove_file(&abs).map_err(|source| ApplyError::Io {
                path: edit.path.clone(),
                source,
            })?;
            self.ctx.untrack(&edit.path);
            self.interaction.notify(&format!(
                "Renamed {} to {}",
                edit.path.display(),
                target.display()
            ));
            log::info!("renamed {} to {}", abs.display(), abs_target.display());
            edit.path = target;
            abs = abs_target;
        }

        let was_creation = edit.is_creation;
        let new_lines = edit
            .updated_lines(&snapshot)
            .map_err(|source| ApplyError::Edit {
                path: edit.path.clone(),
                source,
            })?;
        let content = new_lines.join("\n");
        atomic_write(&abs, content.as_bytes()).map_err(|source| ApplyError::Io {
            path: edit.path.clone(),
            source,
        })?;
        self.ctx.refresh(&edit.path, &content);
        log::info!(
            "wrote {} ({} replacements, {} bytes)",
            abs.display(),
            edit.replacements.len(),
            content.len()
        );

        Ok(if was_creation {
            EditOutcome::Created { path: edit.path }
        } else {
            EditOutcome::Applied { path: edit.path }
        })
    }

    /// Create an empty file (and any missing parent directories) and admit
    /// it into the tracked set.
    fn create_tracked(&mut self, abs: &Path, rel: &Path) -> Result<(), ApplyError> {
        let io_err = |source| ApplyError::Io {
            path: rel.to_path_buf(),
            source,
        };
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(abs, "").map_err(io_err)?;
        log::info!("created {}", abs.display());
        self.ctx.track_new(rel)?;
        Ok(())
    }
}

/// Atomic whole-file overwrite: tempfile in the same directory, fsync,
/// rename, then an mtime bump so downstream watchers notice the change.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;
    Ok(())
}
