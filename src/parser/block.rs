//! The block dialect: `@@start` / `@@code` / `@@end` sentinels around a
//! JSON header object.
//!
//! A block is the start sentinel, one or more header lines forming a JSON
//! object, then either a code section (`@@code`, literal lines, `@@end`) or
//! directly `@@end`. Line numbers on the wire are 1-indexed; the header's
//! end line is inclusive. Both are converted here to the internal 0-indexed
//! half-open convention.

use crate::context::SessionContext;
use crate::edit::{EditAction, FileEdit, Replacement};
use crate::parser::dialect::{DecodedHeader, Dialect, RenameMap};
use crate::parser::display::DisplayInformation;
use crate::parser::ParseError;
use serde::Deserialize;
use std::path::PathBuf;

const START: &str = "@@start";
const CODE: &str = "@@code";
const END: &str = "@@end";

const SENTINELS: [&str; 3] = [START, CODE, END];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum BlockAction {
    Insert,
    Replace,
    Delete,
    CreateFile,
    DeleteFile,
    RenameFile,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    file: Option<PathBuf>,
    action: Option<BlockAction>,
    name: Option<PathBuf>,
    #[serde(rename = "insert-before-line")]
    before_line: Option<usize>,
    #[serde(rename = "insert-after-line")]
    after_line: Option<usize>,
    #[serde(rename = "start-line")]
    start_line: Option<usize>,
    #[serde(rename = "end-line")]
    end_line: Option<usize>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlockDialect;

impl BlockDialect {
    /// Resolve the wire `insert-*` directives to a 0-indexed insertion
    /// point. `insert-before-line` wins; a disagreeing `insert-after-line`
    /// alongside it is rejected.
    fn insert_point(header: &BlockHeader) -> Result<usize, ParseError> {
        match (header.before_line, header.after_line) {
            (Some(before), after) => {
                if before < 1 {
                    return Err(ParseError::InvalidLineNumber {
                        key: "insert-before-line",
                        value: before,
                    });
                }
                let start = before - 1;
                match after {
                    Some(after) if after != start => {
                        Err(ParseError::InconsistentInsert { before, after })
                    }
                    _ => Ok(start),
                }
            }
            (None, Some(after)) => Ok(after),
            (None, None) => Err(ParseError::MissingField("insert-before-line")),
        }
    }

    fn replace_range(header: &BlockHeader) -> Result<(usize, usize), ParseError> {
        let start_line = header
            .start_line
            .ok_or(ParseError::MissingField("start-line"))?;
        let end_line = header.end_line.ok_or(ParseError::MissingField("end-line"))?;
        if start_line < 1 {
            return Err(ParseError::InvalidLineNumber {
                key: "start-line",
                value: start_line,
            });
        }
        if end_line < start_line {
            return Err(ParseError::InvalidLineNumber {
                key: "end-line",
                value: end_line,
            });
        }
        Ok((start_line - 1, end_line))
    }
}

impl Dialect for BlockDialect {
    fn name(&self) -> &'static str {
        "block"
    }

    fn could_be_special(&self, partial_line: &str) -> bool {
        SENTINELS
            .iter()
            .any(|sentinel| sentinel.starts_with(partial_line))
    }

    fn starts_special(&self, line: &str) -> bool {
        line == START
    }

    fn ends_special(&self, line: &str) -> bool {
        line == CODE || line == END
    }

    fn ends_code(&self, line: &str) -> bool {
        line == END
    }

    fn decode_header(
        &self,
        ctx: &SessionContext,
        renames: &RenameMap,
        block: &[String],
    ) -> Result<DecodedHeader, ParseError> {
        let header_lines = &block[1..block.len() - 1];
        let header: BlockHeader = serde_json::from_str(&header_lines.join("\n"))?;

        let action = header.action.as_ref().ok_or(ParseError::MissingField("action"))?;
        let file = header
            .file
            .clone()
            .ok_or(ParseError::MissingField("file"))?;

        // A block may address a file by the name it had before an earlier
        // rename in the same session.
        let path = renames.get(&file).cloned().unwrap_or(file);

        let (edit_action, range) = match action {
            BlockAction::Insert => {
                let point = Self::insert_point(&header)?;
                (
                    EditAction::Insert {
                        start: point,
                        end: point,
                    },
                    Some((point, point)),
                )
            }
            BlockAction::Replace => {
                let (start, end) = Self::replace_range(&header)?;
                (EditAction::Replace { start, end }, Some((start, end)))
            }
            BlockAction::Delete => {
                let (start, end) = Self::replace_range(&header)?;
                (EditAction::Delete { start, end }, Some((start, end)))
            }
            BlockAction::CreateFile => (
                EditAction::CreateFile { path: path.clone() },
                None,
            ),
            BlockAction::DeleteFile => (EditAction::DeleteFile, None),
            BlockAction::RenameFile => {
                let target = header
                    .name
                    .clone()
                    .ok_or(ParseError::MissingField("name"))?;
                (EditAction::RenameFile { target }, None)
            }
        };

        // Every action except file creation addresses an existing snapshot.
        let removed_lines = if matches!(action, BlockAction::CreateFile) {
            Vec::new()
        } else {
            let snapshot = ctx
                .snapshot(&path)
                .ok_or_else(|| ParseError::FileNotInScope(path.clone()))?;
            let (start, end) = range.unwrap_or((0, 0));
            snapshot
                .lines
                .get(start..end)
                .ok_or(ParseError::RangeBeyondSnapshot {
                    start,
                    end,
                    len: snapshot.lines.len(),
                })?
                .to_vec()
        };

        let mut edit = match &edit_action {
            EditAction::CreateFile { .. } => FileEdit::creation(path.clone()),
            EditAction::DeleteFile => FileEdit::deletion(path.clone()),
            EditAction::RenameFile { target } => FileEdit::rename(path.clone(), target.clone()),
            _ => FileEdit::update(path.clone()),
        };

        // Deletion carries no code section; its replacement is synthesized
        // from the header alone.
        if let EditAction::Delete { start, end } = edit_action {
            edit.replacements.push(Replacement {
                start,
                end,
                new_lines: Vec::new(),
            });
        }

        let display = DisplayInformation {
            path,
            action: edit_action,
            removed_lines,
        };

        let has_code = block.last().map(String::as_str) == Some(CODE);
        Ok(DecodedHeader {
            display,
            edit,
            has_code,
        })
    }

    fn push_code(
        &self,
        code_lines: Vec<String>,
        display: &DisplayInformation,
        edit: &mut FileEdit,
    ) {
        let (start, end) = display.action.line_range().unwrap_or((0, 0));
        edit.replacements.push(Replacement {
            start,
            end,
            new_lines: code_lines,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn block_of(header_json: &str, has_code: bool) -> Vec<String> {
        let mut lines = vec![START.to_string()];
        lines.extend(header_json.lines().map(str::to_string));
        lines.push(if has_code { CODE } else { END }.to_string());
        lines
    }

    fn ctx_with(path: &str, content: &str) -> SessionContext {
        let mut ctx = SessionContext::new("/ws");
        ctx.track_with_content(path, content).unwrap();
        ctx
    }

    fn decode(
        ctx: &SessionContext,
        header_json: &str,
        has_code: bool,
    ) -> Result<DecodedHeader, ParseError> {
        BlockDialect.decode_header(ctx, &RenameMap::new(), &block_of(header_json, has_code))
    }

    #[test]
    fn test_sentinel_prefixes_could_be_special() {
        let dialect = BlockDialect;
        assert!(dialect.could_be_special("@"));
        assert!(dialect.could_be_special("@@sta"));
        assert!(dialect.could_be_special(""));
        assert!(!dialect.could_be_special("@@x"));
        assert!(!dialect.could_be_special("some prose"));
    }

    #[test]
    fn test_insert_before_line() {
        let ctx = ctx_with("f.txt", "a\nb\nc\nd\ne\nf");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "insert", "insert-before-line": 5}"#,
            true,
        )
        .unwrap();
        assert_eq!(decoded.display.action, EditAction::Insert { start: 4, end: 4 });
        assert!(decoded.has_code);
    }

    #[test]
    fn test_insert_after_line() {
        let ctx = ctx_with("f.txt", "a\nb\nc\nd\ne\nf");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "insert", "insert-after-line": 4}"#,
            true,
        )
        .unwrap();
        assert_eq!(decoded.display.action, EditAction::Insert { start: 4, end: 4 });
    }

    #[test]
    fn test_insert_both_directives_consistent() {
        let ctx = ctx_with("f.txt", "a\nb\nc\nd\ne\nf");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "insert",
               "insert-before-line": 5, "insert-after-line": 4}"#,
            true,
        )
        .unwrap();
        assert_eq!(decoded.display.action, EditAction::Insert { start: 4, end: 4 });
    }

    #[test]
    fn test_insert_both_directives_inconsistent() {
        let ctx = ctx_with("f.txt", "a\nb\nc\nd\ne\nf");
        let result = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "insert",
               "insert-before-line": 5, "insert-after-line": 5}"#,
            true,
        );
        assert!(matches!(
            result,
            Err(ParseError::InconsistentInsert { before: 5, after: 5 })
        ));
    }

    #[test]
    fn test_insert_without_directives() {
        let ctx = ctx_with("f.txt", "a");
        let result = decode(&ctx, r#"{"file": "f.txt", "action": "insert"}"#, true);
        assert!(matches!(result, Err(ParseError::MissingField(_))));
    }

    #[test]
    fn test_replace_converts_to_half_open_range() {
        let ctx = ctx_with("f.txt", "aaa\nbbb\nccc\nddd");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "replace", "start-line": 2, "end-line": 3}"#,
            true,
        )
        .unwrap();
        assert_eq!(decoded.display.action, EditAction::Replace { start: 1, end: 3 });
        assert_eq!(decoded.display.removed_lines, vec!["bbb", "ccc"]);
        assert!(decoded.edit.replacements.is_empty());
    }

    #[test]
    fn test_delete_synthesizes_replacement() {
        let ctx = ctx_with("f.txt", "a\nb\nc\nd");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "delete", "start-line": 2, "end-line": 3}"#,
            false,
        )
        .unwrap();
        assert!(!decoded.has_code);
        assert_eq!(
            decoded.edit.replacements,
            vec![Replacement {
                start: 1,
                end: 3,
                new_lines: Vec::new()
            }]
        );
    }

    #[test]
    fn test_create_file_needs_no_snapshot() {
        let ctx = SessionContext::new("/ws");
        let decoded = decode(
            &ctx,
            r#"{"file": "new_dir/new.txt", "action": "create-file"}"#,
            true,
        )
        .unwrap();
        assert!(decoded.edit.is_creation);
        assert!(decoded.display.removed_lines.is_empty());
    }

    #[test]
    fn test_delete_file_sets_flag() {
        let ctx = ctx_with("f.txt", "x");
        let decoded = decode(&ctx, r#"{"file": "f.txt", "action": "delete-file"}"#, false).unwrap();
        assert!(decoded.edit.is_deletion);
        assert!(decoded.edit.replacements.is_empty());
    }

    #[test]
    fn test_rename_file_requires_name() {
        let ctx = ctx_with("f.txt", "x");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "rename-file", "name": "g.txt"}"#,
            false,
        )
        .unwrap();
        assert_eq!(decoded.edit.rename_target.as_deref(), Some(Path::new("g.txt")));

        let result = decode(&ctx, r#"{"file": "f.txt", "action": "rename-file"}"#, false);
        assert!(matches!(result, Err(ParseError::MissingField("name"))));
    }

    #[test]
    fn test_rename_alias_resolves_old_path() {
        let mut ctx = SessionContext::new("/ws");
        ctx.track_with_content("new.txt", "a\nb").unwrap();
        let mut renames = RenameMap::new();
        renames.insert(PathBuf::from("old.txt"), PathBuf::from("new.txt"));

        let block = block_of(
            r#"{"file": "old.txt", "action": "replace", "start-line": 1, "end-line": 1}"#,
            true,
        );
        let decoded = BlockDialect.decode_header(&ctx, &renames, &block).unwrap();
        assert_eq!(decoded.edit.path, Path::new("new.txt"));
    }

    #[test]
    fn test_malformed_json_is_block_scoped_error() {
        let ctx = ctx_with("f.txt", "x");
        let result = decode(&ctx, r#"{"file": "f.txt", action: oops"#, false);
        assert!(matches!(result, Err(ParseError::MalformedHeader(_))));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let ctx = ctx_with("f.txt", "x");
        let result = decode(&ctx, r#"{"file": "f.txt", "action": "explode"}"#, false);
        assert!(matches!(result, Err(ParseError::MalformedHeader(_))));
    }

    #[test]
    fn test_untracked_file_rejected() {
        let ctx = SessionContext::new("/ws");
        let result = decode(
            &ctx,
            r#"{"file": "ghost.txt", "action": "delete", "start-line": 1, "end-line": 1}"#,
            false,
        );
        assert!(matches!(result, Err(ParseError::FileNotInScope(_))));
    }

    #[test]
    fn test_range_beyond_snapshot_rejected() {
        let ctx = ctx_with("f.txt", "only one line");
        let result = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "replace", "start-line": 5, "end-line": 9}"#,
            true,
        );
        assert!(matches!(result, Err(ParseError::RangeBeyondSnapshot { .. })));
    }

    #[test]
    fn test_push_code_uses_header_range() {
        let ctx = ctx_with("f.txt", "aaa\nbbb\nccc\nddd");
        let decoded = decode(
            &ctx,
            r#"{"file": "f.txt", "action": "replace", "start-line": 2, "end-line": 3}"#,
            true,
        )
        .unwrap();

        let mut edit = decoded.edit;
        BlockDialect.push_code(
            vec!["XXX".to_string(), "YYY".to_string()],
            &decoded.display,
            &mut edit,
        );
        assert_eq!(
            edit.replacements,
            vec![Replacement {
                start: 1,
                end: 3,
                new_lines: vec!["XXX".to_string(), "YYY".to_string()]
            }]
        );
    }
}
