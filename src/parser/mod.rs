//! Streaming parser: a small state machine that turns an incrementally
//! produced response into prose for the transcript plus structured
//! [`FileEdit`]s, driving one concrete [`Dialect`].
//!
//! The parser owns line buffering and the `Prose | Header | Code` state
//! machine; the dialect owns sentinel recognition and block encoding.
//! Fragmentation of the input is invisible: feeding one byte at a time and
//! feeding the whole response at once produce identical output.

pub mod block;
pub mod dialect;
pub mod display;

use crate::context::SessionContext;
use crate::edit::FileEdit;
use dialect::{DecodedHeader, Dialect, RenameMap};
use display::DisplayInformation;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding the wire format.
///
/// All variants except [`Truncated`] are scoped to a single block: the
/// block's edit is discarded and parsing continues with the rest of the
/// stream.
///
/// [`Truncated`]: ParseError::Truncated
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed block header: {0}")]
    MalformedHeader(#[from] serde_json::Error),

    #[error("block header missing required key `{0}`")]
    MissingField(&'static str),

    #[error("insert directives disagree: insert-before-line {before} next to insert-after-line {after}")]
    InconsistentInsert { before: usize, after: usize },

    #[error("invalid value for `{key}`: {value}")]
    InvalidLineNumber { key: &'static str, value: usize },

    #[error("line range [{start}, {end}) exceeds the {len}-line snapshot")]
    RangeBeyondSnapshot {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("file is not in scope: {0}")]
    FileNotInScope(PathBuf),

    #[error("stream ended inside a {0} section")]
    Truncated(&'static str),
}

/// Where the parser is within the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Prose,
    Header,
    Code,
}

/// Receives the user-facing prose between blocks, as soon as each piece is
/// known not to be part of a sentinel.
pub trait ProseSink {
    fn prose(&mut self, text: &str);
}

impl ProseSink for String {
    fn prose(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Everything one fully parsed response produced.
#[derive(Debug)]
pub struct ParseOutcome {
    /// Completed edits, in wire order
    pub edits: Vec<FileEdit>,
    /// Display information parallel to `edits`
    pub displays: Vec<DisplayInformation>,
    /// Block-scoped failures; the offending blocks were discarded
    pub block_errors: Vec<ParseError>,
}

/// One in-flight parse of a streamed response.
pub struct StreamParser<'a> {
    ctx: &'a SessionContext,
    dialect: &'a dyn Dialect,
    sink: &'a mut dyn ProseSink,
    state: ParseState,
    /// Current line still missing its newline
    partial: String,
    /// Bytes of `partial` already flushed to the prose sink
    flushed: usize,
    /// Header section under construction, sentinels included
    block: Vec<String>,
    /// Code section under construction
    code: Vec<String>,
    /// Edit whose code section is still streaming
    current: Option<(DisplayInformation, FileEdit)>,
    /// Header decode failed; swallow the code section without keeping it
    discarding: bool,
    renames: RenameMap,
    edits: Vec<FileEdit>,
    displays: Vec<DisplayInformation>,
    block_errors: Vec<ParseError>,
}

impl<'a> StreamParser<'a> {
    pub fn new(
        ctx: &'a SessionContext,
        dialect: &'a dyn Dialect,
        sink: &'a mut dyn ProseSink,
    ) -> Self {
        Self {
            ctx,
            dialect,
            sink,
            state: ParseState::Prose,
            partial: String::new(),
            flushed: 0,
            block: Vec::new(),
            code: Vec::new(),
            current: None,
            discarding: false,
            renames: RenameMap::new(),
            edits: Vec::new(),
            displays: Vec::new(),
            block_errors: Vec::new(),
        }
    }

    /// Consume the next fragment of the response, in arrival order.
    pub fn push(&mut self, fragment: &str) {
        for ch in fragment.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.partial);
                let flushed = std::mem::replace(&mut self.flushed, 0);
                self.handle_line(line, flushed, true);
            } else {
                self.partial.push(ch);
                // A line-in-progress stays buffered only while it could
                // still grow into a sentinel; everything else is prose the
                // moment we see it.
                if self.state == ParseState::Prose
                    && !self.dialect.could_be_special(&self.partial)
                {
                    self.sink.prose(&self.partial[self.flushed..]);
                    self.flushed = self.partial.len();
                }
            }
        }
    }

    /// Signal end of input and hand back everything parsed.
    ///
    /// A final line without a trailing newline is processed as complete.
    /// Ending anywhere but prose means the stream was cut off mid-block.
    pub fn finish(mut self) -> Result<ParseOutcome, ParseError> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            let flushed = std::mem::replace(&mut self.flushed, 0);
            self.handle_line(line, flushed, false);
        }
        match self.state {
            ParseState::Prose => Ok(ParseOutcome {
                edits: self.edits,
                displays: self.displays,
                block_errors: self.block_errors,
            }),
            ParseState::Header => Err(ParseError::Truncated("header")),
            ParseState::Code => Err(ParseError::Truncated("code")),
        }
    }

    fn handle_line(&mut self, line: String, flushed: usize, had_newline: bool) {
        match self.state {
            ParseState::Prose => {
                // A partially flushed line can no longer be a sentinel.
                if flushed == 0 && self.dialect.starts_special(&line) {
                    self.state = ParseState::Header;
                    self.block.clear();
                    self.block.push(line);
                } else {
                    self.sink.prose(&line[flushed..]);
                    if had_newline {
                        self.sink.prose("\n");
                    }
                }
            }
            ParseState::Header => {
                let terminates = self.dialect.ends_special(&line);
                let closes_block = self.dialect.ends_code(&line);
                self.block.push(line);
                if terminates {
                    self.close_header(closes_block);
                }
            }
            ParseState::Code => {
                if self.dialect.ends_code(&line) {
                    self.close_code();
                } else if !self.discarding {
                    self.code.push(line);
                }
            }
        }
    }

    fn close_header(&mut self, closes_block: bool) {
        match self.dialect.decode_header(self.ctx, &self.renames, &self.block) {
            Ok(DecodedHeader {
                display,
                edit,
                has_code,
            }) => {
                if has_code {
                    self.current = Some((display, edit));
                    self.code.clear();
                    self.state = ParseState::Code;
                } else {
                    self.finalize(display, edit);
                    self.state = ParseState::Prose;
                }
            }
            Err(err) => {
                log::warn!("discarding malformed block: {}", err);
                self.block_errors.push(err);
                if closes_block {
                    self.state = ParseState::Prose;
                } else {
                    // The block announced a code section; consume it so the
                    // rest of the stream still parses.
                    self.discarding = true;
                    self.code.clear();
                    self.state = ParseState::Code;
                }
            }
        }
    }

    fn close_code(&mut self) {
        if self.discarding {
            self.discarding = false;
        } else if let Some((display, mut edit)) = self.current.take() {
            self.dialect
                .push_code(std::mem::take(&mut self.code), &display, &mut edit);
            self.finalize(display, edit);
        }
        self.state = ParseState::Prose;
    }

    fn finalize(&mut self, display: DisplayInformation, edit: FileEdit) {
        if let Some(target) = &edit.rename_target {
            self.renames.insert(edit.path.clone(), target.clone());
        }
        log::debug!("completed edit: {}", display.describe());
        self.displays.push(display);
        self.edits.push(edit);
    }
}
