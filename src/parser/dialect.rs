use crate::context::SessionContext;
use crate::edit::FileEdit;
use crate::parser::display::DisplayInformation;
use crate::parser::ParseError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Rename aliases accumulated within one parse session: old path to new
/// path, so later blocks can keep addressing a file by the name it had when
/// the response started streaming.
pub type RenameMap = HashMap<PathBuf, PathBuf>;

/// A decoded block header: enough to describe the edit before its content
/// has streamed, plus whether a code section follows.
#[derive(Debug)]
pub struct DecodedHeader {
    pub display: DisplayInformation,
    pub edit: FileEdit,
    pub has_code: bool,
}

/// Capability set a concrete wire format provides to the streaming parser.
///
/// The parser owns the state machine and line buffering; the dialect owns
/// sentinel recognition and block encoding. Implementations hold no
/// per-session state: everything mutable lives in the parser.
pub trait Dialect {
    fn name(&self) -> &'static str;

    /// Could this line-in-progress still grow into a sentinel line?
    ///
    /// While it can, the parser buffers the partial line instead of emitting
    /// it as prose, which keeps token-by-token input indistinguishable from
    /// whole-message input.
    fn could_be_special(&self, partial_line: &str) -> bool;

    /// Does this complete line open a block?
    fn starts_special(&self, line: &str) -> bool;

    /// Does this complete line terminate a header section (either by
    /// opening a code section or by closing the block)?
    fn ends_special(&self, line: &str) -> bool;

    /// Does this complete line close a code section?
    fn ends_code(&self, line: &str) -> bool;

    /// Decode a finished header section. `block` holds every line from the
    /// opening sentinel through the terminating sentinel, inclusive.
    fn decode_header(
        &self,
        ctx: &SessionContext,
        renames: &RenameMap,
        block: &[String],
    ) -> Result<DecodedHeader, ParseError>;

    /// Fold a finished code section into the in-progress edit by appending
    /// exactly one replacement derived from the header's resolved range.
    fn push_code(
        &self,
        code_lines: Vec<String>,
        display: &DisplayInformation,
        edit: &mut FileEdit,
    );
}

/// Look up a dialect by its configured name.
pub fn by_name(name: &str) -> Option<Box<dyn Dialect>> {
    match name {
        "block" => Some(Box::new(crate::parser::block::BlockDialect)),
        _ => None,
    }
}

/// Names accepted by [`by_name`], for CLI help and validation.
pub const DIALECT_NAMES: &[&str] = &["block"];
