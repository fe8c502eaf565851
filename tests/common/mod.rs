#![allow(dead_code)]

//! Shared fixtures for the integration suites: a byte-level table-file
//! writer and a handful of complete grammars built with it.
//!
//! The fixture grammar is the equality language
//!
//! ```text
//! <Equality>   ::= <Expression> '==' <Expression>
//! <Expression> ::= <Value> Operator <Value> | <Value>
//! <Value>      ::= Identifier | Constant
//! ```
//!
//! with whitespace noise, a nestable `/* ... */` block-comment group, and a
//! `// ...` line comment ended by a newline. It exists in both table
//! versions: version 5 with range charsets and explicit group records, and
//! version 1 with enumerated charsets and the comment symbols the loader
//! promotes to groups itself.

// ============================================================================
// TABLE-FILE WRITER
// ============================================================================

/// One wire field to append to a record.
pub enum Wire<'a> {
    B(bool),
    I(u16),
    S(&'a str),
    Byte(u8),
    E,
}

/// Assembles a table file byte by byte.
pub struct TableWriter {
    bytes: Vec<u8>,
}

impl TableWriter {
    pub fn with_header(header: &str) -> Self {
        let mut writer = Self { bytes: Vec::new() };
        writer.utf16(header);
        writer
    }

    pub fn v5() -> Self {
        Self::with_header("GOLD Parser Tables/v5.0")
    }

    pub fn v1() -> Self {
        Self::with_header("GOLD Parser Tables/v1.0")
    }

    /// Current length, i.e. the offset the next record will start at.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Appends raw bytes, for deliberately malformed files.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn record(&mut self, fields: &[Wire]) {
        self.bytes.push(b'M');
        self.bytes
            .extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for field in fields {
            match field {
                Wire::B(value) => {
                    self.bytes.push(b'B');
                    self.bytes.push(u8::from(*value));
                }
                Wire::I(value) => {
                    self.bytes.push(b'I');
                    self.bytes.extend_from_slice(&value.to_le_bytes());
                }
                Wire::S(text) => {
                    self.bytes.push(b'S');
                    self.utf16(text);
                }
                Wire::Byte(value) => {
                    self.bytes.push(b'b');
                    self.bytes.push(*value);
                }
                Wire::E => self.bytes.push(b'E'),
            }
        }
    }

    fn utf16(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            self.bytes.extend_from_slice(&unit.to_le_bytes());
        }
        self.bytes.extend_from_slice(&[0, 0]);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ============================================================================
// RECORD HELPERS
// ============================================================================

pub fn symbol_record(w: &mut TableWriter, index: u16, name: &str, kind: u16) {
    w.record(&[Wire::Byte(b'S'), Wire::I(index), Wire::S(name), Wire::I(kind)]);
}

pub fn charset_record(w: &mut TableWriter, index: u16, chars: &str) {
    w.record(&[Wire::Byte(b'C'), Wire::I(index), Wire::S(chars)]);
}

pub fn ranges_record(w: &mut TableWriter, index: u16, pairs: &[(u16, u16)]) {
    let mut fields = vec![
        Wire::Byte(b'c'),
        Wire::I(index),
        Wire::I(1200),
        Wire::I(pairs.len() as u16),
        Wire::E,
    ];
    for &(start, end) in pairs {
        fields.push(Wire::I(start));
        fields.push(Wire::I(end));
    }
    w.record(&fields);
}

pub fn dfa_record(w: &mut TableWriter, index: u16, accept: Option<u16>, edges: &[(u16, u16)]) {
    let mut fields = vec![
        Wire::Byte(b'D'),
        Wire::I(index),
        Wire::B(accept.is_some()),
        Wire::I(accept.unwrap_or(0)),
        Wire::E,
    ];
    for &(charset, target) in edges {
        fields.push(Wire::I(charset));
        fields.push(Wire::I(target));
        fields.push(Wire::E);
    }
    w.record(&fields);
}

pub fn lalr_record(w: &mut TableWriter, index: u16, actions: &[(u16, u16, u16)]) {
    let mut fields = vec![Wire::Byte(b'L'), Wire::I(index), Wire::E];
    for &(symbol, action, value) in actions {
        fields.push(Wire::I(symbol));
        fields.push(Wire::I(action));
        fields.push(Wire::I(value));
        fields.push(Wire::E);
    }
    w.record(&fields);
}

pub fn rule_record(w: &mut TableWriter, index: u16, produces: u16, consumes: &[u16]) {
    let mut fields = vec![Wire::Byte(b'R'), Wire::I(index), Wire::I(produces), Wire::E];
    for &symbol in consumes {
        fields.push(Wire::I(symbol));
    }
    w.record(&fields);
}

#[allow(clippy::too_many_arguments)]
pub fn group_record(
    w: &mut TableWriter,
    index: u16,
    name: &str,
    container: u16,
    start: u16,
    end: u16,
    advance: u16,
    ending: u16,
    nested: &[u16],
) {
    let mut fields = vec![
        Wire::Byte(b'g'),
        Wire::I(index),
        Wire::S(name),
        Wire::I(container),
        Wire::I(start),
        Wire::I(end),
        Wire::I(advance),
        Wire::I(ending),
        Wire::E,
        Wire::I(nested.len() as u16),
    ];
    for &group in nested {
        fields.push(Wire::I(group));
    }
    w.record(&fields);
}

// ============================================================================
// THE EQUALITY GRAMMAR
// ============================================================================
//
// Symbols 0..=8 are shared by both versions:
//   0 Equality NT     3 Identifier T    6 "==" T
//   1 Expression NT   4 Constant T      7 Whitespace noise
//   2 Value NT        5 Operator T      8 EOF
//
// Charsets: 0 a-z, 1 digits, 2 +/-, 3 '=', 4 space, 5 '/', 6 '*', 7 newline.

const ACTION_SHIFT: u16 = 1;
const ACTION_REDUCE: u16 = 2;
const ACTION_GOTO: u16 = 3;
const ACTION_ACCEPT: u16 = 4;

fn shared_symbols(w: &mut TableWriter) {
    symbol_record(w, 0, "Equality", 0);
    symbol_record(w, 1, "Expression", 0);
    symbol_record(w, 2, "Value", 0);
    symbol_record(w, 3, "Identifier", 1);
    symbol_record(w, 4, "Constant", 1);
    symbol_record(w, 5, "Operator", 1);
    symbol_record(w, 6, "==", 1);
    symbol_record(w, 7, "Whitespace", 2);
    symbol_record(w, 8, "EOF", 3);
}

/// The DFA recognizes identifiers, constants, `+`/`-`, `==`, runs of
/// spaces, newlines, and the comment delimiters `/*`, `*/`, and `//`.
/// The symbols emitted for `//` and for a newline differ between the two
/// table versions, so they are parameters.
fn shared_dfa(w: &mut TableWriter, line_start_symbol: u16, newline_symbol: u16) {
    dfa_record(
        w,
        0,
        None,
        &[
            (0, 1), // letters -> identifier
            (1, 2), // digits -> constant
            (2, 3), // + - -> operator
            (3, 4), // = -> maybe ==
            (4, 6), // space -> whitespace
            (5, 7), // / -> comment delimiters
            (6, 11), // * -> maybe */
            (7, 10), // newline
        ],
    );
    dfa_record(w, 1, Some(3), &[(0, 1)]);
    dfa_record(w, 2, Some(4), &[(1, 2)]);
    dfa_record(w, 3, Some(5), &[]);
    dfa_record(w, 4, None, &[(3, 5)]);
    dfa_record(w, 5, Some(6), &[]);
    dfa_record(w, 6, Some(7), &[(4, 6)]);
    dfa_record(w, 7, None, &[(6, 8), (5, 9)]);
    dfa_record(w, 8, Some(9), &[]);
    dfa_record(w, 9, Some(line_start_symbol), &[]);
    dfa_record(w, 10, Some(newline_symbol), &[]);
    dfa_record(w, 11, None, &[(5, 12)]);
    dfa_record(w, 12, Some(10), &[]);
}

fn shared_rules(w: &mut TableWriter) {
    rule_record(w, 0, 0, &[1, 6, 1]); // Equality   -> Expression == Expression
    rule_record(w, 1, 1, &[2, 5, 2]); // Expression -> Value Operator Value
    rule_record(w, 2, 1, &[2]); //       Expression -> Value
    rule_record(w, 3, 2, &[3]); //       Value      -> Identifier
    rule_record(w, 4, 2, &[4]); //       Value      -> Constant
}

fn shared_lalr(w: &mut TableWriter) {
    lalr_record(
        w,
        0,
        &[
            (3, ACTION_SHIFT, 1),
            (4, ACTION_SHIFT, 2),
            (2, ACTION_GOTO, 3),
            (1, ACTION_GOTO, 4),
            (0, ACTION_GOTO, 9),
        ],
    );
    lalr_record(
        w,
        1,
        &[
            (5, ACTION_REDUCE, 3),
            (6, ACTION_REDUCE, 3),
            (8, ACTION_REDUCE, 3),
        ],
    );
    lalr_record(
        w,
        2,
        &[
            (5, ACTION_REDUCE, 4),
            (6, ACTION_REDUCE, 4),
            (8, ACTION_REDUCE, 4),
        ],
    );
    lalr_record(
        w,
        3,
        &[
            (5, ACTION_SHIFT, 5),
            (6, ACTION_REDUCE, 2),
            (8, ACTION_REDUCE, 2),
        ],
    );
    lalr_record(w, 4, &[(6, ACTION_SHIFT, 6)]);
    lalr_record(
        w,
        5,
        &[(3, ACTION_SHIFT, 1), (4, ACTION_SHIFT, 2), (2, ACTION_GOTO, 7)],
    );
    lalr_record(
        w,
        6,
        &[
            (3, ACTION_SHIFT, 1),
            (4, ACTION_SHIFT, 2),
            (2, ACTION_GOTO, 3),
            (1, ACTION_GOTO, 8),
        ],
    );
    lalr_record(
        w,
        7,
        &[(6, ACTION_REDUCE, 1), (8, ACTION_REDUCE, 1)],
    );
    lalr_record(w, 8, &[(8, ACTION_REDUCE, 0)]);
    lalr_record(w, 9, &[(8, ACTION_ACCEPT, 0)]);
}

/// Version-5 table file. Extra symbols beyond the shared block:
///   9 CommentStart, 10 CommentEnd, 11 Comment (noise container),
///   12 LineCommentStart, 13 NewLine (noise).
/// Group 0 is the nestable block comment, group 1 the line comment.
pub fn equality_grammar_v5() -> Vec<u8> {
    let mut w = TableWriter::v5();
    w.record(&[Wire::Byte(b'p'), Wire::I(0), Wire::S("Name"), Wire::S("Equality")]);
    w.record(&[
        Wire::Byte(b't'),
        Wire::I(14),
        Wire::I(8),
        Wire::I(5),
        Wire::I(13),
        Wire::I(10),
        Wire::I(2),
    ]);
    w.record(&[Wire::Byte(b'I'), Wire::I(0), Wire::I(0)]);

    ranges_record(&mut w, 0, &[(b'a' as u16, b'z' as u16)]);
    ranges_record(&mut w, 1, &[(b'0' as u16, b'9' as u16)]);
    ranges_record(&mut w, 2, &[(b'+' as u16, b'+' as u16), (b'-' as u16, b'-' as u16)]);
    ranges_record(&mut w, 3, &[(b'=' as u16, b'=' as u16)]);
    ranges_record(&mut w, 4, &[(b' ' as u16, b' ' as u16)]);
    ranges_record(&mut w, 5, &[(b'/' as u16, b'/' as u16)]);
    ranges_record(&mut w, 6, &[(b'*' as u16, b'*' as u16)]);
    ranges_record(&mut w, 7, &[(b'\n' as u16, b'\n' as u16)]);

    shared_symbols(&mut w);
    symbol_record(&mut w, 9, "CommentStart", 4);
    symbol_record(&mut w, 10, "CommentEnd", 5);
    symbol_record(&mut w, 11, "Comment", 2);
    symbol_record(&mut w, 12, "LineCommentStart", 4);
    symbol_record(&mut w, 13, "NewLine", 2);

    group_record(&mut w, 0, "Comment Block", 11, 9, 10, 0, 1, &[0]);
    group_record(&mut w, 1, "Comment Line", 11, 12, 13, 0, 0, &[]);

    shared_dfa(&mut w, 12, 13);
    shared_lalr(&mut w);
    shared_rules(&mut w);
    w.into_bytes()
}

/// Version-1 table file for the same language. No group records: symbol 11
/// is a CommentLine symbol and 9/10 are bare group start/end symbols, which
/// the loader promotes to synthetic comment groups.
pub fn equality_grammar_v1() -> Vec<u8> {
    let mut w = TableWriter::v1();
    w.record(&[
        Wire::Byte(b'P'),
        Wire::S("Equality"),
        Wire::S("1.0"),
        Wire::S("QA"),
        Wire::S("equality test language"),
        Wire::B(false),
        Wire::I(0),
    ]);
    w.record(&[
        Wire::Byte(b'T'),
        Wire::I(13),
        Wire::I(8),
        Wire::I(5),
        Wire::I(13),
        Wire::I(10),
        Wire::I(0),
    ]);
    w.record(&[Wire::Byte(b'I'), Wire::I(0), Wire::I(0)]);

    charset_record(&mut w, 0, "abcdefghijklmnopqrstuvwxyz");
    charset_record(&mut w, 1, "0123456789");
    charset_record(&mut w, 2, "+-");
    charset_record(&mut w, 3, "=");
    charset_record(&mut w, 4, " ");
    charset_record(&mut w, 5, "/");
    charset_record(&mut w, 6, "*");
    charset_record(&mut w, 7, "\n");

    shared_symbols(&mut w);
    symbol_record(&mut w, 9, "CommentStart", 4);
    symbol_record(&mut w, 10, "CommentEnd", 5);
    symbol_record(&mut w, 11, "CommentLine", 6);
    symbol_record(&mut w, 12, "NewLine", 2);

    shared_dfa(&mut w, 11, 12);
    shared_lalr(&mut w);
    shared_rules(&mut w);
    w.into_bytes()
}

/// A two-edge DFA whose charsets both contain `x`; declaration order must
/// decide which symbol wins.
pub fn tiebreak_grammar() -> Vec<u8> {
    let mut w = TableWriter::v5();
    w.record(&[Wire::Byte(b'I'), Wire::I(0), Wire::I(0)]);
    ranges_record(&mut w, 0, &[(b'x' as u16, b'x' as u16)]);
    ranges_record(&mut w, 1, &[(b'a' as u16, b'x' as u16)]);
    symbol_record(&mut w, 0, "First", 1);
    symbol_record(&mut w, 1, "Second", 1);
    symbol_record(&mut w, 2, "EOF", 3);
    dfa_record(&mut w, 0, None, &[(0, 1), (1, 2)]);
    dfa_record(&mut w, 1, Some(0), &[]);
    dfa_record(&mut w, 2, Some(1), &[]);
    lalr_record(&mut w, 0, &[]);
    w.into_bytes()
}
