//! Runtime engine for grammars compiled by the external GOLD-format grammar
//! builder. Load a compiled table file once, then run any number of parses
//! against it: each parse yields a parse tree or a precisely-located typed
//! error.

pub use crate::diagnostics::LoadError;
pub use crate::engine::{parse, parse_successful, parse_with, CancelToken, ParseOutcome};
pub use crate::tables::{load_grammar, Grammar};
pub use crate::tree::{ParseNode, ParseTree, Span, Token};

pub mod diagnostics;
pub mod engine;
pub mod lexer;
pub mod parser;
pub mod tables;
pub mod tree;
