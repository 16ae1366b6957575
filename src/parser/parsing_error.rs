//! Error types for the tree-string parser and the NEXUS reader.

use crate::error::TreeError;
use crate::parser::scanner::Scanner;
use thiserror::Error;

/// Length of the context window attached to parse errors.
const DEFAULT_CONTEXT_LENGTH: usize = 50;

// =#========================================================================#=
// PARSE ERROR KIND
// =#========================================================================#=
/// The failure classes the parser and NEXUS reader can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    /// No grammar rule advanced the cursor; the tree string is unparseable
    /// at the reported character.
    #[error("tree string unparseable at {0:?}")]
    Stall(char),

    /// A reticulation label occurred twice on the same side.
    #[error("reticulate branch not unique: {0} seen elsewhere in the tree")]
    DuplicateReticulationLabel(String),

    /// A tip or node was attached under a branch that is not a node
    /// (malformed tip names containing structural characters do this).
    #[error("cannot attach a child to a non-node branch")]
    AttachToNonNode,

    /// The tree string does not end in a semicolon.
    #[error("tree string must end in a semicolon")]
    MissingTerminator,

    /// Opening and closing parentheses do not balance.
    #[error("unbalanced parentheses in tree string")]
    UnbalancedParentheses,

    /// The cursor ran past the end of the input mid-tree.
    #[error("unexpected end of tree string")]
    UnexpectedEnd,

    /// A branch length token failed to parse as a float.
    #[error("invalid branch length {0:?}")]
    InvalidBranchLength(String),

    /// NEXUS text contained no tree statement.
    #[error("no tree statement found")]
    MissingTreeStatement,

    /// A structural operation failed while finishing a parsed tree
    /// (e.g. the initial traversal of a malformed topology).
    #[error("invalid tree structure: {0}")]
    InvalidTreeStructure(TreeError),
}

// =#========================================================================#=
// PARSE ERROR
// =#========================================================================#=
/// Parsing error with contextual information: the failure kind, the cursor
/// position, and a bounded window of the input from that position.
#[derive(Debug, Error)]
#[error("{kind} at position {position}\n  context: {context}")]
pub struct ParseError {
    kind: ParseErrorKind,
    position: usize,
    context: String,
}

impl ParseError {
    /// Creates a `ParseError` from an error kind and scanner state.
    pub fn from_scanner(kind: ParseErrorKind, scanner: &Scanner) -> Self {
        Self {
            kind,
            position: scanner.position(),
            context: scanner.context(DEFAULT_CONTEXT_LENGTH),
        }
    }

    /// Creates a `ParseError` without scanner context.
    pub fn without_context(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            position: 0,
            context: String::new(),
        }
    }

    /// The error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// The cursor position where the error occurred.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl From<TreeError> for ParseError {
    fn from(err: TreeError) -> Self {
        ParseError::without_context(ParseErrorKind::InvalidTreeStructure(err))
    }
}
