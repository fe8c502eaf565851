//! Longest-match DFA lexer with a group engine for nestable lexical groups
//! (block comments, line comments, strings).
//!
//! The lexer keeps no state between calls; the caller threads the current
//! character position. A call either produces the next token and the
//! position after it, the end-of-file token (at or past the end of input,
//! without advancing), or a failure: a lexical error at a precise position,
//! or a set of groups left unterminated at end of input.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::tables::{AdvanceMode, EndingMode, Grammar, GroupId, SymbolId, SymbolKind};
use crate::tree::Token;

// ============================================================================
// INPUT VIEW
// ============================================================================

/// The engine's view of the caller's input: the original string plus a
/// character index, so every position in the engine is a character offset
/// while diagnostics can still map back to byte spans.
pub struct InputText<'a> {
    text: &'a str,
    chars: Vec<char>,
    /// Byte offset of each character, plus a final entry for the total
    /// byte length.
    byte_offsets: Vec<usize>,
}

impl<'a> InputText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut chars = Vec::new();
        let mut byte_offsets = Vec::new();
        for (offset, c) in text.char_indices() {
            byte_offsets.push(offset);
            chars.push(c);
        }
        byte_offsets.push(text.len());
        Self {
            text,
            chars,
            byte_offsets,
        }
    }

    /// Input length in characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).copied()
    }

    /// The substring covering character positions `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.text[self.byte_offsets[start]..self.byte_offsets[end]].to_string()
    }

    /// Byte offset of a character position, for building source spans.
    pub fn byte_offset(&self, pos: usize) -> usize {
        self.byte_offsets[pos.min(self.chars.len())]
    }

    pub fn as_str(&self) -> &str {
        self.text
    }
}

// ============================================================================
// FAILURES
// ============================================================================

/// A lexical group that was still open when the input ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGroup {
    pub name: String,
    /// Character position where the group was opened.
    pub position: usize,
}

/// Why the lexer could not produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// No DFA path accepts any prefix of the input at `position`.
    Lexical { position: usize },
    /// End of input with closed-ending groups still open, innermost first.
    UnterminatedGroups { frames: Vec<OpenGroup> },
}

// ============================================================================
// DFA DRIVER
// ============================================================================

/// Produces the next token at `pos`. At or past the end of input this is
/// the end-of-file token and the position does not advance.
pub fn next_token(
    input: &InputText,
    pos: usize,
    grammar: &Grammar,
) -> Result<(Token, usize), ScanError> {
    if pos >= input.len() {
        return Ok((Token::new(grammar.eof_symbol(), "", input.len()), pos));
    }
    let Some(token) = dfa_match(input, pos, grammar) else {
        return Err(ScanError::Lexical { position: pos });
    };
    let symbol = grammar.symbol(token.symbol);
    if symbol.kind == SymbolKind::GroupStart {
        let Some(group) = symbol.group else {
            panic!(
                "group-start symbol `{}` has no owning group: corrupt grammar tables",
                symbol.name
            );
        };
        return lex_group(input, grammar, token, group);
    }
    let end = pos + token.len();
    trace!("token `{}` [{}..{})", symbol.name, pos, end);
    Ok((token, end))
}

/// One longest-match run of the DFA from its initial state. Returns the
/// token for the last accepting state visited, or `None` when no accepting
/// state was reached before the DFA got stuck.
fn dfa_match(input: &InputText, start: usize, grammar: &Grammar) -> Option<Token> {
    let mut state = grammar.dfa_initial();
    let mut pos = start;
    let mut candidate: Option<(SymbolId, usize)> = None;
    loop {
        let current = grammar.dfa_state(state);
        // A zero-length match would stall the scan, so the candidate is
        // only recorded once at least one character has been consumed.
        if pos > start {
            if let Some(symbol) = current.accept {
                candidate = Some((symbol, pos));
            }
        }
        let Some(c) = input.char_at(pos) else {
            break;
        };
        // First edge in file order whose charset matches wins; this is how
        // the builder's priorities survive into the runtime.
        let next = current
            .edges
            .iter()
            .find(|edge| grammar.charset(edge.charset).contains(c))
            .map(|edge| edge.target);
        match next {
            Some(target) => {
                state = target;
                pos += 1;
            }
            None => break,
        }
    }
    candidate.map(|(symbol, end)| Token::new(symbol, input.slice(start, end), start))
}

// ============================================================================
// GROUP ENGINE
// ============================================================================

struct GroupFrame {
    group: GroupId,
    start: usize,
    nested: Vec<Token>,
}

/// Scans out a whole lexical group starting at an already-matched
/// group-start token, handling nesting, advance modes, and open/closed
/// ending modes.
fn lex_group(
    input: &InputText,
    grammar: &Grammar,
    opening: Token,
    group: GroupId,
) -> Result<(Token, usize), ScanError> {
    let mut stack = vec![GroupFrame {
        group,
        start: opening.start,
        nested: Vec::new(),
    }];
    let mut pos = opening.start + opening.len();

    while !stack.is_empty() && pos < input.len() {
        let top = grammar.group(stack.last().expect("non-empty stack").group);
        let end_name = grammar.symbol_name(top.end);
        match dfa_match(input, pos, grammar) {
            Some(token) => {
                let symbol = grammar.symbol(token.symbol);
                let inner = (symbol.kind == SymbolKind::GroupStart)
                    .then_some(symbol.group)
                    .flatten()
                    .filter(|g| top.can_contain(*g));
                if let Some(inner) = inner {
                    pos += token.len();
                    stack.push(GroupFrame {
                        group: inner,
                        start: token.start,
                        nested: Vec::new(),
                    });
                } else if symbol.name.eq_ignore_ascii_case(end_name) {
                    // A newline-named end symbol stays in the input: the
                    // group ends just before it and the next scan starts
                    // on the newline itself.
                    let end = if end_name.eq_ignore_ascii_case("newline") {
                        token.start
                    } else {
                        token.start + token.len()
                    };
                    pos = end;
                    let frame = stack.pop().expect("non-empty stack");
                    let closed = close_frame(grammar, frame, input, end);
                    match stack.last_mut() {
                        Some(parent) => parent.nested.push(closed),
                        None => return Ok((closed, end)),
                    }
                } else {
                    match top.advance {
                        AdvanceMode::Character => pos += 1,
                        AdvanceMode::Token => {
                            pos += token.len();
                            stack
                                .last_mut()
                                .expect("non-empty stack")
                                .nested
                                .push(token);
                        }
                    }
                }
            }
            // Group interiors tolerate arbitrary content; a single-character
            // step guarantees progress even in token-advance mode.
            None => pos += 1,
        }
    }

    // The input ran out with groups still open. Open-ending groups close at
    // the end of input; the first closed-ending group is an error.
    while let Some(frame) = stack.pop() {
        if grammar.group(frame.group).ending == EndingMode::Open {
            let closed = close_frame(grammar, frame, input, input.len());
            match stack.last_mut() {
                Some(parent) => parent.nested.push(closed),
                None => return Ok((closed, input.len())),
            }
        } else {
            let mut frames = vec![open_group(grammar, &frame)];
            frames.extend(stack.iter().rev().map(|f| open_group(grammar, f)));
            return Err(ScanError::UnterminatedGroups { frames });
        }
    }
    unreachable!("group stack drained without emitting a token")
}

fn close_frame(grammar: &Grammar, frame: GroupFrame, input: &InputText, end: usize) -> Token {
    let group = grammar.group(frame.group);
    trace!("group `{}` [{}..{})", group.name, frame.start, end);
    Token {
        symbol: group.container,
        text: input.slice(frame.start, end),
        start: frame.start,
        nested: frame.nested,
    }
}

fn open_group(grammar: &Grammar, frame: &GroupFrame) -> OpenGroup {
    OpenGroup {
        name: grammar.group(frame.group).name.clone(),
        position: frame.start,
    }
}
