//! The LALR(1) stack automaton.
//!
//! The parser holds a stack of (state, parse-tree node) pairs and executes
//! one action per step against the current look-ahead token: shift, reduce,
//! accept, or reject. It never touches the input itself; the driver in
//! [`crate::engine`] feeds it tokens and decides what a rejection means.
//!
//! Conditions that can only arise from corrupt tables (a reduce deeper
//! than the stack, a missing goto, a goto keyed by a terminal) panic
//! rather than produce a result: they are loader or builder bugs, not
//! input errors.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::tables::{Grammar, LalrAction, LalrStateId};
use crate::tree::{ParseNode, Token};

/// Symbol name reported for the bottom-of-stack sentinel.
pub const SENTINEL_NAME: &str = "INITIAL_STATE";

// ============================================================================
// STACK AND SNAPSHOTS
// ============================================================================

/// One parser stack entry. `node` is `None` only for the bottom sentinel,
/// which never escapes to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StackItem {
    pub state: LalrStateId,
    pub node: Option<ParseNode>,
}

/// A lightweight summary of one stack entry, carried by syntax-error
/// results so a failure can show what had been recognized so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub state: LalrStateId,
    pub symbol: String,
}

// ============================================================================
// OBSERVERS
// ============================================================================

/// Callbacks invoked as the parse progresses. All methods default to no-ops;
/// implementors override what they care about. The stack argument is a
/// read-only view taken immediately after the reported action.
pub trait ParseObserver {
    fn on_token(&mut self, _token: &Token) {}
    fn on_shift(&mut self, _pre_state: LalrStateId, _shifted: &Token, _stack: &[StackItem]) {}
    fn on_reduce(&mut self, _pre_state: LalrStateId, _look_ahead: &Token, _stack: &[StackItem]) {}
}

/// Observer that ignores every event, for plain parses.
pub struct SilentObserver;

impl ParseObserver for SilentObserver {}

// ============================================================================
// THE AUTOMATON
// ============================================================================

/// Outcome of a single parser step.
#[derive(Debug)]
pub enum Step {
    /// The look-ahead was pushed; the driver must fetch a new one.
    Shifted,
    /// A rule was reduced; the look-ahead is still pending.
    Reduced,
    /// The parse finished; here is the root of the tree.
    Accepted(ParseNode),
    /// No action exists for the look-ahead in the current state.
    Rejected,
}

pub struct LalrParser<'g> {
    grammar: &'g Grammar,
    stack: Vec<StackItem>,
}

impl<'g> LalrParser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            stack: vec![StackItem {
                state: grammar.lalr_initial(),
                node: None,
            }],
        }
    }

    pub fn stack(&self) -> &[StackItem] {
        &self.stack
    }

    /// Summarizes the stack for error reporting, bottom first.
    pub fn snapshot(&self) -> Vec<StackFrame> {
        self.stack
            .iter()
            .map(|item| StackFrame {
                state: item.state,
                symbol: match &item.node {
                    None => SENTINEL_NAME.to_string(),
                    Some(node) => self.grammar.symbol_name(node.symbol()).to_string(),
                },
            })
            .collect()
    }

    /// Executes one action for `look_ahead`. A shift consumes the
    /// look-ahead (the driver fetches a new one); a reduce leaves it
    /// pending.
    pub fn step(&mut self, look_ahead: &Token, observer: &mut dyn ParseObserver) -> Step {
        let pre_state = self.stack.last().expect("stack holds the sentinel").state;
        let Some(action) = self.grammar.lalr_state(pre_state).action(look_ahead.symbol) else {
            return Step::Rejected;
        };
        match action {
            LalrAction::Accept => {
                let item = self.stack.pop().expect("stack holds the sentinel");
                let Some(node) = item.node else {
                    panic!("accept with only the sentinel on the stack: corrupt grammar tables");
                };
                if self.stack.len() != 1 {
                    panic!(
                        "accept with {} items above the sentinel: corrupt grammar tables",
                        self.stack.len() - 1
                    );
                }
                Step::Accepted(node)
            }
            LalrAction::Shift(target) => {
                trace!(
                    "shift `{}` {} -> {}",
                    self.grammar.symbol_name(look_ahead.symbol),
                    pre_state,
                    target
                );
                self.stack.push(StackItem {
                    state: target,
                    node: Some(ParseNode::Leaf(look_ahead.clone())),
                });
                observer.on_shift(pre_state, look_ahead, &self.stack);
                Step::Shifted
            }
            LalrAction::Reduce(rule_id) => {
                let rule = self.grammar.rule(rule_id);
                let count = rule.consumes.len();
                if self.stack.len() <= count {
                    panic!(
                        "reduce of `{}` needs {count} items but the stack has {}: \
                         corrupt grammar tables",
                        self.grammar.symbol_name(rule.produces),
                        self.stack.len() - 1
                    );
                }
                // split_off keeps the removed items in push order, which is
                // exactly the left-to-right order the rule consumed them in.
                let children: Vec<ParseNode> = self
                    .stack
                    .split_off(self.stack.len() - count)
                    .into_iter()
                    .map(|item| item.node.expect("sentinel never sits above the bottom"))
                    .collect();
                let node = ParseNode::Branch {
                    symbol: rule.produces,
                    children,
                };
                let under = self.stack.last().expect("stack holds the sentinel").state;
                let target = match self.grammar.lalr_state(under).action(rule.produces) {
                    Some(LalrAction::Goto(target)) => target,
                    other => panic!(
                        "no goto for `{}` in LALR state {under} (found {other:?}): \
                         corrupt grammar tables",
                        self.grammar.symbol_name(rule.produces)
                    ),
                };
                trace!(
                    "reduce `{}` ({count} items) {} -> {}",
                    self.grammar.symbol_name(rule.produces),
                    pre_state,
                    target
                );
                self.stack.push(StackItem {
                    state: target,
                    node: Some(node),
                });
                observer.on_reduce(pre_state, look_ahead, &self.stack);
                Step::Reduced
            }
            LalrAction::Goto(_) => panic!(
                "goto action keyed by look-ahead `{}`: corrupt grammar tables",
                self.grammar.symbol_name(look_ahead.symbol)
            ),
        }
    }
}
