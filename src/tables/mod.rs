//! In-memory model of a compiled grammar: symbols, charsets, the lexer DFA,
//! the LALR(1) tables, rules, and lexical groups, bundled into an immutable
//! [`Grammar`].
//!
//! A grammar is created once by [`load_grammar`] and then only read. Every
//! cross-reference between tables is a plain index, bounds-checked exactly
//! once at load time, so the lexer and parser index freely without
//! re-validating.

pub mod loader;
pub mod reader;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

pub use loader::load_grammar;

// ============================================================================
// INDEX ALIASES
// ============================================================================

pub type SymbolId = usize;
pub type CharsetId = usize;
pub type DfaStateId = usize;
pub type LalrStateId = usize;
pub type RuleId = usize;
pub type GroupId = usize;

// ============================================================================
// SYMBOLS
// ============================================================================

/// What role a symbol plays in the grammar.
///
/// `CommentLine` only occurs in version 1 tables; the loader rewrites it to
/// `GroupStart` when it can pair the symbol with a newline terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    NonTerminal,
    Terminal,
    Skippable,
    EndOfFile,
    GroupStart,
    GroupEnd,
    CommentLine,
    Error,
}

impl SymbolKind {
    pub(crate) fn from_code(code: u16) -> Option<SymbolKind> {
        Some(match code {
            0 => SymbolKind::NonTerminal,
            1 => SymbolKind::Terminal,
            2 => SymbolKind::Skippable,
            3 => SymbolKind::EndOfFile,
            4 => SymbolKind::GroupStart,
            5 => SymbolKind::GroupEnd,
            6 => SymbolKind::CommentLine,
            7 => SymbolKind::Error,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SymbolKind::NonTerminal => "non-terminal",
            SymbolKind::Terminal => "terminal",
            SymbolKind::Skippable => "skippable",
            SymbolKind::EndOfFile => "end of file",
            SymbolKind::GroupStart => "group start",
            SymbolKind::GroupEnd => "group end",
            SymbolKind::CommentLine => "comment line",
            SymbolKind::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// A named grammar element. Symbols are looked up by name; a group start or
/// end symbol also carries a back-reference to its owning group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub group: Option<GroupId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            group: None,
        }
    }
}

// ============================================================================
// CHARSETS
// ============================================================================

/// A predicate on a single input character, labeling a DFA edge.
///
/// Version 1 tables enumerate every member character; version 5 tables store
/// ordered code-unit ranges tagged with a codepage. Range bounds are
/// inclusive on both ends, which is how the upstream builder writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    Enumerated(Vec<char>),
    Ranges {
        codepage: u16,
        ranges: Vec<(u16, u16)>,
    },
}

impl Charset {
    pub fn contains(&self, c: char) -> bool {
        match self {
            Charset::Enumerated(chars) => chars.contains(&c),
            Charset::Ranges { ranges, .. } => {
                let value = c as u32;
                ranges
                    .iter()
                    .any(|&(start, end)| u32::from(start) <= value && value <= u32::from(end))
            }
        }
    }
}

// ============================================================================
// DFA
// ============================================================================

/// An outgoing DFA edge. Edges keep the order they had in the table file;
/// the lexer takes the first edge whose charset accepts the current
/// character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfaEdge {
    pub charset: CharsetId,
    pub target: DfaStateId,
}

/// One DFA state: an optional accepting symbol and the ordered edge list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfaState {
    pub accept: Option<SymbolId>,
    pub edges: Vec<DfaEdge>,
}

// ============================================================================
// LALR
// ============================================================================

/// A parse action, keyed by look-ahead symbol in [`LalrState::actions`].
/// Terminal and non-terminal namespaces are disjoint, so shift/reduce/accept
/// entries (terminal keys) and gotos (non-terminal keys) share one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LalrAction {
    Shift(LalrStateId),
    Reduce(RuleId),
    Goto(LalrStateId),
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LalrState {
    pub actions: HashMap<SymbolId, LalrAction>,
}

impl LalrState {
    pub fn action(&self, symbol: SymbolId) -> Option<LalrAction> {
        self.actions.get(&symbol).copied()
    }
}

// ============================================================================
// RULES AND GROUPS
// ============================================================================

/// A production rule: the non-terminal it produces and the ordered symbols
/// it consumes (possibly none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub produces: SymbolId,
    pub consumes: Vec<SymbolId>,
}

/// How a lexical group moves through its interior: one token at a time, or
/// one raw character at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceMode {
    Token,
    Character,
}

/// Whether a group still open at end of input is acceptable (`Open`, e.g. a
/// line comment) or an error (`Closed`, e.g. a block comment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndingMode {
    Open,
    Closed,
}

/// A lexical group: a block comment, a line comment, a string literal. The
/// interior is lexed but emitted as a single token carrying the `container`
/// symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub container: SymbolId,
    pub start: SymbolId,
    pub end: SymbolId,
    pub advance: AdvanceMode,
    pub ending: EndingMode,
    /// Groups allowed to nest inside this one, by group id.
    pub nested: Vec<GroupId>,
}

impl Group {
    pub fn can_contain(&self, group: GroupId) -> bool {
        self.nested.contains(&group)
    }
}

// ============================================================================
// GRAMMAR AGGREGATE
// ============================================================================

/// Which table-file version a grammar was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableVersion {
    V1,
    V5,
}

/// A fully linked, immutable grammar. Safe to share by reference across any
/// number of concurrent parses.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    pub(crate) parameters: BTreeMap<String, String>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) charsets: Vec<Charset>,
    pub(crate) dfa_states: Vec<DfaState>,
    pub(crate) lalr_states: Vec<LalrState>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) groups: Vec<Group>,
    pub(crate) dfa_initial: DfaStateId,
    pub(crate) lalr_initial: LalrStateId,
    pub(crate) eof_symbol: SymbolId,
    pub(crate) version: TableVersion,
}

impl Grammar {
    pub fn version(&self) -> TableVersion {
        self.version
    }

    /// Looks up a parameter written by a `P` (v1) or property (v5) record,
    /// e.g. `"Name"`, `"Author"`, `"Case Sensitive"`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// The grammar's display name, when the table file recorded one.
    pub fn name(&self) -> Option<&str> {
        self.parameter("Name")
    }

    pub fn about(&self) -> Option<&str> {
        self.parameter("About")
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol_name(&self, id: SymbolId) -> &str {
        &self.symbols[id].name
    }

    /// Case-insensitive symbol lookup by name, the way the table format's
    /// own cross-references behave.
    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn charset(&self, id: CharsetId) -> &Charset {
        &self.charsets[id]
    }

    pub fn dfa_state(&self, id: DfaStateId) -> &DfaState {
        &self.dfa_states[id]
    }

    pub fn dfa_initial(&self) -> DfaStateId {
        self.dfa_initial
    }

    pub fn lalr_state(&self, id: LalrStateId) -> &LalrState {
        &self.lalr_states[id]
    }

    pub fn lalr_initial(&self) -> LalrStateId {
        self.lalr_initial
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The symbol the lexer emits when the input is exhausted.
    pub fn eof_symbol(&self) -> SymbolId {
        self.eof_symbol
    }

    /// Clones the symbol-name column, in symbol order. The parse tree keeps
    /// this so it can render itself after the grammar is gone.
    pub fn symbol_names(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.name.clone()).collect()
    }
}
