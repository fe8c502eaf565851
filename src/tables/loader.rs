//! Decoding a compiled table file into a linked [`Grammar`].
//!
//! Loading runs in two phases. Phase one walks the records and stores them
//! in index form exactly as written, because records may reference entries
//! that have not been seen yet. Phase two densifies the index-form arrays,
//! bounds-checks every cross-reference, and resolves the version-1 comment
//! symbols into synthetic lexical groups. After phase two nothing is ever
//! re-validated: the lexer and parser index the grammar directly.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::diagnostics::LoadError;
use crate::tables::reader::{Field, RecordReader};
use crate::tables::{
    AdvanceMode, Charset, DfaEdge, DfaState, EndingMode, Grammar, Group, LalrAction, LalrState,
    Rule, Symbol, SymbolId, SymbolKind, TableVersion,
};

const HEADER_PREFIX: &str = "GOLD Parser Tables/v";

// ============================================================================
// PUBLIC API
// ============================================================================

/// Decodes a compiled grammar-table file. Pure function of the input bytes.
pub fn load_grammar(bytes: &[u8]) -> Result<Grammar, LoadError> {
    let mut reader = RecordReader::new(bytes);
    let header = reader.read_header()?;
    let version = parse_header(&header)?;
    debug!("table header `{header}` ({version:?})");

    let mut raw = RawTables::new(version);
    while !reader.at_end() {
        let (offset, fields) = reader.next_record()?;
        decode_record(fields, offset, &mut raw)?;
    }
    let grammar = link(raw, bytes.len())?;
    debug!(
        "loaded grammar: {} symbols, {} charsets, {} DFA states, {} LALR states, {} rules, {} groups",
        grammar.symbols.len(),
        grammar.charsets.len(),
        grammar.dfa_states.len(),
        grammar.lalr_states.len(),
        grammar.rules.len(),
        grammar.groups.len(),
    );
    Ok(grammar)
}

fn parse_header(header: &str) -> Result<TableVersion, LoadError> {
    let Some(rest) = header.strip_prefix(HEADER_PREFIX) else {
        return Err(LoadError::BadHeader { offset: 0 });
    };
    match rest {
        "1.0" => Ok(TableVersion::V1),
        "5.0" => Ok(TableVersion::V5),
        _ => Err(LoadError::UnsupportedVersion {
            header: header.to_string(),
            offset: 0,
        }),
    }
}

// ============================================================================
// PHASE ONE: RECORDS IN INDEX FORM
// ============================================================================

/// Typed access to a record's field list, attributing failures to the byte
/// offset the record started at.
struct RecordFields {
    iter: std::vec::IntoIter<Field>,
    offset: usize,
}

impl RecordFields {
    fn new(fields: Vec<Field>, offset: usize) -> Self {
        Self {
            iter: fields.into_iter(),
            offset,
        }
    }

    fn remaining(&self) -> usize {
        self.iter.len()
    }

    fn next(&mut self) -> Result<Field, LoadError> {
        self.iter.next().ok_or(LoadError::TruncatedRecord {
            offset: self.offset,
        })
    }

    fn expect(&mut self, expected: char, field: Field) -> LoadError {
        LoadError::UnexpectedFieldType {
            expected,
            found: field.tag(),
            offset: self.offset,
        }
    }

    fn int(&mut self) -> Result<u16, LoadError> {
        match self.next()? {
            Field::Int(value) => Ok(value),
            other => Err(self.expect('I', other)),
        }
    }

    fn string(&mut self) -> Result<String, LoadError> {
        match self.next()? {
            Field::Str(value) => Ok(value),
            other => Err(self.expect('S', other)),
        }
    }

    fn boolean(&mut self) -> Result<bool, LoadError> {
        match self.next()? {
            Field::Bool(value) => Ok(value),
            other => Err(self.expect('B', other)),
        }
    }

    fn byte(&mut self) -> Result<u8, LoadError> {
        match self.next()? {
            Field::Byte(value) => Ok(value),
            other => Err(self.expect('b', other)),
        }
    }

    /// Consumes a reserved field of any type.
    fn skip(&mut self) -> Result<(), LoadError> {
        self.next().map(|_| ())
    }
}

struct RawSymbol {
    name: String,
    kind: SymbolKind,
}

enum RawCharset {
    Chars(String),
    Ranges {
        codepage: u16,
        pairs: Vec<(u16, u16)>,
    },
}

struct RawDfaState {
    accept: Option<u16>,
    edges: Vec<(u16, u16)>,
    offset: usize,
}

struct RawLalrState {
    actions: Vec<(u16, u16, u16)>,
    offset: usize,
}

struct RawRule {
    produces: u16,
    consumes: Vec<u16>,
    offset: usize,
}

struct RawGroup {
    name: String,
    container: u16,
    start: u16,
    end: u16,
    advance: u16,
    ending: u16,
    nested: Vec<u16>,
    offset: usize,
}

struct RawTables {
    version: TableVersion,
    parameters: BTreeMap<String, String>,
    symbols: Vec<Option<RawSymbol>>,
    charsets: Vec<Option<RawCharset>>,
    dfa_states: Vec<Option<RawDfaState>>,
    lalr_states: Vec<Option<RawLalrState>>,
    rules: Vec<Option<RawRule>>,
    groups: Vec<Option<RawGroup>>,
    initial: Option<(u16, u16, usize)>,
}

impl RawTables {
    fn new(version: TableVersion) -> Self {
        Self {
            version,
            parameters: BTreeMap::new(),
            symbols: Vec::new(),
            charsets: Vec::new(),
            dfa_states: Vec::new(),
            lalr_states: Vec::new(),
            rules: Vec::new(),
            groups: Vec::new(),
            initial: None,
        }
    }
}

fn place<T>(slots: &mut Vec<Option<T>>, index: usize, value: T) {
    if index >= slots.len() {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(value);
}

fn decode_record(fields: Vec<Field>, offset: usize, raw: &mut RawTables) -> Result<(), LoadError> {
    let mut fields = RecordFields::new(fields, offset);
    let record_type = fields.byte()?;
    match record_type {
        b'P' => decode_parameters(&mut fields, raw),
        b'p' => decode_property(&mut fields, raw),
        b'T' | b't' => decode_counts(&mut fields, raw),
        b'I' => {
            let dfa = fields.int()?;
            let lalr = fields.int()?;
            raw.initial = Some((dfa, lalr, offset));
            Ok(())
        }
        b'C' => {
            let index = fields.int()? as usize;
            let chars = fields.string()?;
            place(&mut raw.charsets, index, RawCharset::Chars(chars));
            Ok(())
        }
        b'c' => decode_ranges(&mut fields, raw),
        b'S' => decode_symbol(&mut fields, raw),
        b'D' => decode_dfa_state(&mut fields, raw, offset),
        b'L' => decode_lalr_state(&mut fields, raw, offset),
        b'R' => decode_rule(&mut fields, raw, offset),
        b'g' => decode_group(&mut fields, raw, offset),
        b'n' => Ok(()), // reserved for future use; payload ignored
        other => Err(LoadError::UnknownRecord {
            tag: other as char,
            offset,
        }),
    }
}

/// Version-1 parameter record: six fixed fields under canonical keys.
fn decode_parameters(fields: &mut RecordFields, raw: &mut RawTables) -> Result<(), LoadError> {
    let name = fields.string()?;
    let version = fields.string()?;
    let author = fields.string()?;
    let about = fields.string()?;
    let case_sensitive = fields.boolean()?;
    let start_symbol = fields.int()?;
    raw.parameters.insert("Name".into(), name);
    raw.parameters.insert("Version".into(), version);
    raw.parameters.insert("Author".into(), author);
    raw.parameters.insert("About".into(), about);
    raw.parameters.insert(
        "Case Sensitive".into(),
        if case_sensitive { "True" } else { "False" }.into(),
    );
    raw.parameters
        .insert("Start Symbol".into(), start_symbol.to_string());
    Ok(())
}

/// Version-5 property record: reserved field, then a name/value pair.
fn decode_property(fields: &mut RecordFields, raw: &mut RawTables) -> Result<(), LoadError> {
    fields.skip()?;
    let name = fields.string()?;
    let value = fields.string()?;
    raw.parameters.insert(name, value);
    Ok(())
}

/// Count records only pre-size the tables; the records themselves are the
/// source of truth for population.
fn decode_counts(fields: &mut RecordFields, raw: &mut RawTables) -> Result<(), LoadError> {
    let mut counts = Vec::new();
    while fields.remaining() > 0 {
        counts.push(fields.int()? as usize);
    }
    let mut counts = counts.into_iter();
    if let Some(n) = counts.next() {
        raw.symbols.reserve(n);
    }
    if let Some(n) = counts.next() {
        raw.charsets.reserve(n);
    }
    if let Some(n) = counts.next() {
        raw.rules.reserve(n);
    }
    if let Some(n) = counts.next() {
        raw.dfa_states.reserve(n);
    }
    if let Some(n) = counts.next() {
        raw.lalr_states.reserve(n);
    }
    if let Some(n) = counts.next() {
        raw.groups.reserve(n);
    }
    Ok(())
}

fn decode_ranges(fields: &mut RecordFields, raw: &mut RawTables) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    let codepage = fields.int()?;
    let count = fields.int()? as usize;
    fields.skip()?;
    if fields.remaining() != count * 2 {
        return Err(LoadError::TruncatedRecord {
            offset: fields.offset,
        });
    }
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let start = fields.int()?;
        let end = fields.int()?;
        pairs.push((start, end));
    }
    place(
        &mut raw.charsets,
        index,
        RawCharset::Ranges { codepage, pairs },
    );
    Ok(())
}

fn decode_symbol(fields: &mut RecordFields, raw: &mut RawTables) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    let name = fields.string()?;
    let code = fields.int()?;
    let kind = SymbolKind::from_code(code).ok_or(LoadError::InvalidEnum {
        what: "symbol kind",
        value: code,
        offset: fields.offset,
    })?;
    place(&mut raw.symbols, index, RawSymbol { name, kind });
    Ok(())
}

fn decode_dfa_state(
    fields: &mut RecordFields,
    raw: &mut RawTables,
    offset: usize,
) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    let is_final = fields.boolean()?;
    let accept_index = fields.int()?;
    fields.skip()?;
    let accept = is_final.then_some(accept_index);
    if fields.remaining() % 3 != 0 {
        return Err(LoadError::TruncatedRecord { offset });
    }
    let mut edges = Vec::with_capacity(fields.remaining() / 3);
    while fields.remaining() > 0 {
        let charset = fields.int()?;
        let target = fields.int()?;
        fields.skip()?;
        edges.push((charset, target));
    }
    place(
        &mut raw.dfa_states,
        index,
        RawDfaState {
            accept,
            edges,
            offset,
        },
    );
    Ok(())
}

fn decode_lalr_state(
    fields: &mut RecordFields,
    raw: &mut RawTables,
    offset: usize,
) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    fields.skip()?;
    if fields.remaining() % 4 != 0 {
        return Err(LoadError::TruncatedRecord { offset });
    }
    let mut actions = Vec::with_capacity(fields.remaining() / 4);
    while fields.remaining() > 0 {
        let symbol = fields.int()?;
        let action = fields.int()?;
        let value = fields.int()?;
        fields.skip()?;
        actions.push((symbol, action, value));
    }
    place(
        &mut raw.lalr_states,
        index,
        RawLalrState { actions, offset },
    );
    Ok(())
}

fn decode_rule(
    fields: &mut RecordFields,
    raw: &mut RawTables,
    offset: usize,
) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    let produces = fields.int()?;
    fields.skip()?;
    let mut consumes = Vec::with_capacity(fields.remaining());
    while fields.remaining() > 0 {
        consumes.push(fields.int()?);
    }
    place(
        &mut raw.rules,
        index,
        RawRule {
            produces,
            consumes,
            offset,
        },
    );
    Ok(())
}

fn decode_group(
    fields: &mut RecordFields,
    raw: &mut RawTables,
    offset: usize,
) -> Result<(), LoadError> {
    let index = fields.int()? as usize;
    let name = fields.string()?;
    let container = fields.int()?;
    let start = fields.int()?;
    let end = fields.int()?;
    let advance = fields.int()?;
    let ending = fields.int()?;
    fields.skip()?;
    let count = fields.int()? as usize;
    if fields.remaining() != count {
        return Err(LoadError::TruncatedRecord { offset });
    }
    let mut nested = Vec::with_capacity(count);
    for _ in 0..count {
        nested.push(fields.int()?);
    }
    place(
        &mut raw.groups,
        index,
        RawGroup {
            name,
            container,
            start,
            end,
            advance,
            ending,
            nested,
            offset,
        },
    );
    Ok(())
}

// ============================================================================
// PHASE TWO: LINKING
// ============================================================================

/// Replaces a gap left by a missing record. Surfaced as an out-of-range
/// reference discovered once the whole file has been read.
fn densify<T>(slots: Vec<Option<T>>, what: &'static str, file_len: usize) -> Result<Vec<T>, LoadError> {
    let mut out = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        out.push(slot.ok_or(LoadError::IndexOutOfRange {
            what,
            index,
            offset: file_len,
        })?);
    }
    Ok(out)
}

fn check(index: u16, len: usize, what: &'static str, offset: usize) -> Result<usize, LoadError> {
    let index = index as usize;
    if index < len {
        Ok(index)
    } else {
        Err(LoadError::IndexOutOfRange {
            what,
            index,
            offset,
        })
    }
}

fn link(raw: RawTables, file_len: usize) -> Result<Grammar, LoadError> {
    let version = raw.version;
    let raw_symbols = densify(raw.symbols, "symbol", file_len)?;
    let raw_charsets = densify(raw.charsets, "charset", file_len)?;
    let raw_dfa = densify(raw.dfa_states, "DFA state", file_len)?;
    let raw_lalr = densify(raw.lalr_states, "LALR state", file_len)?;
    let raw_rules = densify(raw.rules, "rule", file_len)?;
    let raw_groups = densify(raw.groups, "group", file_len)?;

    let mut symbols: Vec<Symbol> = raw_symbols
        .into_iter()
        .map(|s| Symbol::new(s.name, s.kind))
        .collect();

    let charsets: Vec<Charset> = raw_charsets
        .into_iter()
        .map(|c| match c {
            RawCharset::Chars(text) => Charset::Enumerated(text.chars().collect()),
            RawCharset::Ranges { codepage, pairs } => Charset::Ranges {
                codepage,
                ranges: pairs,
            },
        })
        .collect();

    let symbol_count = symbols.len();
    let charset_count = charsets.len();
    let dfa_count = raw_dfa.len();
    let lalr_count = raw_lalr.len();
    let rule_count = raw_rules.len();
    let group_count = raw_groups.len();

    let mut dfa_states = Vec::with_capacity(dfa_count);
    for state in raw_dfa {
        let accept = state
            .accept
            .map(|idx| check(idx, symbol_count, "symbol", state.offset))
            .transpose()?;
        let mut edges = Vec::with_capacity(state.edges.len());
        for (charset, target) in state.edges {
            edges.push(DfaEdge {
                charset: check(charset, charset_count, "charset", state.offset)?,
                target: check(target, dfa_count, "DFA state", state.offset)?,
            });
        }
        dfa_states.push(DfaState { accept, edges });
    }

    let mut lalr_states = Vec::with_capacity(lalr_count);
    for state in raw_lalr {
        let mut linked = LalrState::default();
        for (symbol, action, value) in state.actions {
            let symbol = check(symbol, symbol_count, "symbol", state.offset)?;
            let action = match action {
                1 => LalrAction::Shift(check(value, lalr_count, "LALR state", state.offset)?),
                2 => LalrAction::Reduce(check(value, rule_count, "rule", state.offset)?),
                3 => LalrAction::Goto(check(value, lalr_count, "LALR state", state.offset)?),
                4 => LalrAction::Accept,
                other => {
                    return Err(LoadError::InvalidEnum {
                        what: "parse action",
                        value: other,
                        offset: state.offset,
                    })
                }
            };
            linked.actions.insert(symbol, action);
        }
        lalr_states.push(linked);
    }

    let mut rules = Vec::with_capacity(rule_count);
    for rule in raw_rules {
        let produces = check(rule.produces, symbol_count, "symbol", rule.offset)?;
        let mut consumes = Vec::with_capacity(rule.consumes.len());
        for symbol in rule.consumes {
            consumes.push(check(symbol, symbol_count, "symbol", rule.offset)?);
        }
        rules.push(Rule { produces, consumes });
    }

    let mut groups = Vec::with_capacity(group_count);
    for group in raw_groups {
        let advance = match group.advance {
            0 => AdvanceMode::Token,
            1 => AdvanceMode::Character,
            other => {
                return Err(LoadError::InvalidEnum {
                    what: "advance mode",
                    value: other,
                    offset: group.offset,
                })
            }
        };
        let ending = match group.ending {
            0 => EndingMode::Open,
            1 => EndingMode::Closed,
            other => {
                return Err(LoadError::InvalidEnum {
                    what: "ending mode",
                    value: other,
                    offset: group.offset,
                })
            }
        };
        let mut nested = Vec::with_capacity(group.nested.len());
        for id in group.nested {
            nested.push(check(id, group_count, "group", group.offset)?);
        }
        groups.push(Group {
            name: group.name,
            container: check(group.container, symbol_count, "symbol", group.offset)?,
            start: check(group.start, symbol_count, "symbol", group.offset)?,
            end: check(group.end, symbol_count, "symbol", group.offset)?,
            advance,
            ending,
            nested,
        });
    }

    // Group start/end symbols point back at their owning group so the lexer
    // can go from a group-start token to the group in one step.
    for (id, group) in groups.iter().enumerate() {
        if symbols[group.start].kind == SymbolKind::GroupStart {
            symbols[group.start].group = Some(id);
        }
        if symbols[group.end].kind == SymbolKind::GroupEnd {
            symbols[group.end].group = Some(id);
        }
    }

    if version == TableVersion::V1 {
        promote_v1_comments(&mut symbols, &mut groups);
    }

    let eof_symbol = match symbols.iter().position(|s| s.kind == SymbolKind::EndOfFile) {
        Some(id) => id,
        None => {
            symbols.push(Symbol::new("EOF", SymbolKind::EndOfFile));
            symbols.len() - 1
        }
    };

    let (dfa_initial, lalr_initial, initial_offset) = raw.initial.unwrap_or((0, 0, 0));
    let dfa_initial = check(dfa_initial, dfa_states.len(), "DFA state", initial_offset)?;
    let lalr_initial = check(lalr_initial, lalr_states.len(), "LALR state", initial_offset)?;

    Ok(Grammar {
        parameters: raw.parameters,
        symbols,
        charsets,
        dfa_states,
        lalr_states,
        rules,
        groups,
        dfa_initial,
        lalr_initial,
        eof_symbol,
        version,
    })
}

// ============================================================================
// VERSION-1 COMMENT PROMOTION
// ============================================================================

/// Version-1 tables predate group records: block comments are a bare
/// GroupStart/GroupEnd symbol pair and line comments a CommentLine symbol.
/// Both are promoted to synthetic groups emitting a shared skippable
/// `Comment` symbol, so the driver filters them like any other noise.
fn promote_v1_comments(symbols: &mut Vec<Symbol>, groups: &mut Vec<Group>) {
    let mut container: Option<SymbolId> = None;

    let block_start = symbols.iter().position(|s| s.kind == SymbolKind::GroupStart);
    let block_end = symbols.iter().position(|s| s.kind == SymbolKind::GroupEnd);
    if let (Some(start), Some(end)) = (block_start, block_end) {
        let container = comment_container(symbols, &mut container);
        let id = groups.len();
        groups.push(Group {
            name: "Block Comment".into(),
            container,
            start,
            end,
            advance: AdvanceMode::Character,
            ending: EndingMode::Closed,
            nested: Vec::new(),
        });
        symbols[start].group = Some(id);
        symbols[end].group = Some(id);
        debug!("promoted version-1 block comment symbols to group {id}");
    }

    if let Some(line) = symbols.iter().position(|s| s.kind == SymbolKind::CommentLine) {
        match symbols
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case("newline"))
        {
            Some(end) => {
                let container = comment_container(symbols, &mut container);
                let id = groups.len();
                symbols[line].kind = SymbolKind::GroupStart;
                groups.push(Group {
                    name: "Line Comment".into(),
                    container,
                    start: line,
                    end,
                    advance: AdvanceMode::Character,
                    ending: EndingMode::Open,
                    nested: Vec::new(),
                });
                symbols[line].group = Some(id);
                debug!("promoted version-1 line comment symbol to group {id}");
            }
            None => {
                warn!(
                    "version-1 table has a comment-line symbol `{}` but no symbol named \
                     `NewLine`; line comments will not lex",
                    symbols[line].name
                );
            }
        }
    }
}

fn comment_container(symbols: &mut Vec<Symbol>, cached: &mut Option<SymbolId>) -> SymbolId {
    *cached.get_or_insert_with(|| {
        symbols.push(Symbol::new("Comment", SymbolKind::Skippable));
        symbols.len() - 1
    })
}
