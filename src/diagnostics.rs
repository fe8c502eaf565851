//! Unified `miette`-based diagnostics for the engine.
//!
//! Two families live here. [`LoadError`] covers every malformation the
//! grammar-table loader can meet; each variant carries the byte offset where
//! decoding failed, since table files are binary and have no line structure.
//! [`EngineDiagnostic`] is the renderable form of a runtime failure (lexical,
//! group, or syntax), built against the caller's input text so reports show
//! a labeled source window.
//!
//! Grammar-corruption conditions (a missing goto, a reduce deeper than the
//! stack) are not represented here: they indicate a corrupt table file or a
//! loader bug rather than bad user input, and the parser treats them as
//! programmer errors.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

// ============================================================================
// TABLE-FILE LOAD ERRORS
// ============================================================================

/// Everything that can go wrong while decoding a compiled grammar-table file.
///
/// Loading is a pure function of the input bytes, so every failure is
/// attributable to a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LoadError {
    #[error("not a grammar-table file: missing or malformed header at byte {offset}")]
    #[diagnostic(code(aurum::tables::bad_header))]
    BadHeader { offset: usize },

    #[error("unsupported table version `{header}` at byte {offset}")]
    #[diagnostic(
        code(aurum::tables::unsupported_version),
        help("only table versions 1.0 and 5.0 are understood")
    )]
    UnsupportedVersion { header: String, offset: usize },

    #[error("expected a `{expected}` field but found `{found}` at byte {offset}")]
    #[diagnostic(code(aurum::tables::unexpected_field))]
    UnexpectedFieldType {
        expected: char,
        found: char,
        offset: usize,
    },

    #[error("record truncated at byte {offset}")]
    #[diagnostic(code(aurum::tables::truncated_record))]
    TruncatedRecord { offset: usize },

    #[error("unknown record type `{tag}` at byte {offset}")]
    #[diagnostic(code(aurum::tables::unknown_record))]
    UnknownRecord { tag: char, offset: usize },

    #[error("{what} index {index} is out of range (record at byte {offset})")]
    #[diagnostic(code(aurum::tables::index_out_of_range))]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        offset: usize,
    },

    #[error("invalid {what} value {value} at byte {offset}")]
    #[diagnostic(code(aurum::tables::invalid_enum))]
    InvalidEnum {
        what: &'static str,
        value: u16,
        offset: usize,
    },
}

impl LoadError {
    /// Byte offset of the failure inside the table file.
    pub fn offset(&self) -> usize {
        match self {
            LoadError::BadHeader { offset }
            | LoadError::UnsupportedVersion { offset, .. }
            | LoadError::UnexpectedFieldType { offset, .. }
            | LoadError::TruncatedRecord { offset }
            | LoadError::UnknownRecord { offset, .. }
            | LoadError::IndexOutOfRange { offset, .. }
            | LoadError::InvalidEnum { offset, .. } => *offset,
        }
    }
}

// ============================================================================
// RUNTIME FAILURE REPORTS
// ============================================================================

/// A runtime parse failure rendered against the input text, suitable for
/// wrapping in a `miette::Report` and printing to a terminal.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineDiagnostic {
    #[error("lexical error: no token recognized")]
    #[diagnostic(code(aurum::lexical))]
    Lexical {
        #[source_code]
        src: NamedSource<String>,
        #[label("no rule matches starting here")]
        at: SourceSpan,
    },

    #[error("unterminated `{name}` group")]
    #[diagnostic(
        code(aurum::group),
        help("this group must be closed before the end of the input")
    )]
    UnterminatedGroup {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("opened here")]
        at: SourceSpan,
    },

    #[error("syntax error: unexpected `{found}`")]
    #[diagnostic(code(aurum::syntax))]
    Syntax {
        found: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unexpected token")]
        at: SourceSpan,
    },

    #[error("syntax error: unexpected end of input")]
    #[diagnostic(code(aurum::syntax))]
    SyntaxAtEnd {
        #[source_code]
        src: NamedSource<String>,
        #[label("input ends here")]
        at: SourceSpan,
    },
}
