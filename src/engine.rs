//! The top-level parse driver: wires the lexer to the LALR automaton,
//! filters skippable tokens, synthesizes the end-of-file step, polls for
//! cancellation, and surfaces the terminal result as a [`ParseOutcome`].
//!
//! This is the single execution path for every parse; the lexer and parser
//! are never driven directly by callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use miette::{NamedSource, Report, SourceSpan};

use crate::diagnostics::EngineDiagnostic;
use crate::lexer::{self, InputText, OpenGroup, ScanError};
use crate::parser::{LalrParser, ParseObserver, SilentObserver, StackFrame, Step};
use crate::tables::{Grammar, SymbolKind};
use crate::tree::{ParseTree, Token};

// ============================================================================
// CANCELLATION
// ============================================================================

/// A cloneable cancellation flag. The driver polls it once per loop
/// iteration; flipping it from another thread makes the parse return
/// [`ParseOutcome::Cancelled`] without running further observers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// The terminal result of a parse. Failures are values, never panics: one
/// variant per failure family, each carrying what is needed to point at the
/// exact spot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The input belongs to the grammar's language; here is its tree.
    Accept(ParseTree),
    /// No token could be recognized at this character position.
    Lexical { position: usize },
    /// The input ended inside one or more closed-ending groups, innermost
    /// first.
    UnterminatedGroups { frames: Vec<OpenGroup> },
    /// The parser rejected a look-ahead. `last_token` is `None` when the
    /// rejection happened at end of input.
    Syntax {
        last_token: Option<Token>,
        stack: Vec<StackFrame>,
    },
    /// The cancel token was flipped mid-parse.
    Cancelled,
}

impl ParseOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, ParseOutcome::Accept(_))
    }

    pub fn tree(&self) -> Option<&ParseTree> {
        match self {
            ParseOutcome::Accept(tree) => Some(tree),
            _ => None,
        }
    }
}

/// `true` when the outcome carries a parse tree.
pub fn parse_successful(outcome: &ParseOutcome) -> bool {
    outcome.is_accept()
}

// ============================================================================
// DRIVER
// ============================================================================

/// Parses `input` against a loaded grammar with no observer and no
/// cancellation.
pub fn parse(input: &str, grammar: &Grammar) -> ParseOutcome {
    parse_with(input, grammar, &mut SilentObserver, &CancelToken::new())
}

/// Parses `input`, reporting token/shift/reduce events to `observer` and
/// polling `cancel` between steps.
pub fn parse_with(
    input: &str,
    grammar: &Grammar,
    observer: &mut dyn ParseObserver,
    cancel: &CancelToken,
) -> ParseOutcome {
    let text = InputText::new(input);
    let mut parser = LalrParser::new(grammar);
    let mut position = 0usize;
    let mut look_ahead: Option<Token> = None;

    loop {
        if cancel.is_cancelled() {
            return ParseOutcome::Cancelled;
        }
        match look_ahead.take() {
            None => {
                let (token, next) = match lexer::next_token(&text, position, grammar) {
                    Ok(scanned) => scanned,
                    Err(ScanError::Lexical { position }) => {
                        return ParseOutcome::Lexical { position }
                    }
                    Err(ScanError::UnterminatedGroups { frames }) => {
                        return ParseOutcome::UnterminatedGroups { frames }
                    }
                };
                let kind = grammar.symbol(token.symbol).kind;
                if kind == SymbolKind::EndOfFile {
                    return finish_at_end(&mut parser, token, observer, grammar);
                }
                // A group token's text already covers everything lexed
                // inside it, so advancing to the lexer-reported position
                // counts nested tokens exactly once.
                position = next;
                if kind == SymbolKind::Skippable {
                    continue;
                }
                observer.on_token(&token);
                look_ahead = Some(token);
            }
            Some(token) => match parser.step(&token, observer) {
                Step::Shifted => {}
                Step::Reduced => look_ahead = Some(token),
                Step::Accepted(root) => {
                    return ParseOutcome::Accept(ParseTree::new(root, grammar.symbol_names()))
                }
                Step::Rejected => {
                    return ParseOutcome::Syntax {
                        last_token: Some(token),
                        stack: parser.snapshot(),
                    }
                }
            },
        }
    }
}

/// The input is exhausted: drive the parser with the end-of-file token
/// until it accepts or rejects. Only reduces can intervene; shifting the
/// end of file is impossible in well-formed tables.
fn finish_at_end(
    parser: &mut LalrParser,
    eof: Token,
    observer: &mut dyn ParseObserver,
    grammar: &Grammar,
) -> ParseOutcome {
    loop {
        match parser.step(&eof, observer) {
            Step::Reduced => continue,
            Step::Accepted(root) => {
                return ParseOutcome::Accept(ParseTree::new(root, grammar.symbol_names()))
            }
            Step::Rejected => {
                return ParseOutcome::Syntax {
                    last_token: None,
                    stack: parser.snapshot(),
                }
            }
            Step::Shifted => panic!("end-of-file token was shifted: corrupt grammar tables"),
        }
    }
}

// ============================================================================
// REPORT RENDERING
// ============================================================================

/// Renders a failing outcome as a `miette::Report` against the input text,
/// for terminal display. Successful and cancelled outcomes have nothing to
/// report.
pub fn outcome_report(outcome: &ParseOutcome, source_name: &str, input: &str) -> Option<Report> {
    let text = InputText::new(input);
    let source = || NamedSource::new(source_name, input.to_string());
    let diagnostic = match outcome {
        ParseOutcome::Accept(_) | ParseOutcome::Cancelled => return None,
        ParseOutcome::Lexical { position } => EngineDiagnostic::Lexical {
            src: source(),
            at: char_span(&text, *position, 1),
        },
        ParseOutcome::UnterminatedGroups { frames } => {
            let innermost = frames.first()?;
            EngineDiagnostic::UnterminatedGroup {
                name: innermost.name.clone(),
                src: source(),
                at: char_span(&text, innermost.position, 1),
            }
        }
        ParseOutcome::Syntax {
            last_token: Some(token),
            ..
        } => EngineDiagnostic::Syntax {
            found: token.text.clone(),
            src: source(),
            at: char_span(&text, token.start, token.len()),
        },
        ParseOutcome::Syntax {
            last_token: None, ..
        } => EngineDiagnostic::SyntaxAtEnd {
            src: source(),
            at: char_span(&text, text.len(), 0),
        },
    };
    Some(Report::new(diagnostic))
}

/// Converts a character position and length into a byte-based source span.
fn char_span(text: &InputText, start: usize, len: usize) -> SourceSpan {
    let begin = text.byte_offset(start);
    let end = text.byte_offset(start + len);
    SourceSpan::from((begin, end - begin))
}
