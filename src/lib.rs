//! A small regular-expression engine built on Thompson's construction.
//!
//! Based on Russ Cox's article <https://swtch.com/~rsc/regexp/regexp1.html>:
//! the pattern is compiled into a nondeterministic finite automaton, and the
//! automaton is simulated by advancing a whole set of states in lockstep with
//! the input.  Matching therefore runs in O(|pattern| × |input|) time with no
//! backtracking, even for patterns like `a?a?a?aaa` that send backtracking
//! engines exponential.
//!
//! # Architecture
//!
//! The pipeline is:
//!
//! ```text
//! pattern ──explicit_concat──> infix ──shunting_yard──> postfix ──next_fragment──> NFA states
//! ```
//!
//! [`explicit_concat`] makes the dialect's implicit concatenation visible by
//! inserting `.` markers between adjacent atoms.  [`shunting_yard`] reorders
//! the infix character stream into a postfix [`Token`] stream by operator
//! precedence.  [`RegexBuilder`] consumes the postfix stream, wiring
//! partially-built fragments together on a stack until a single automaton
//! remains, then patches every dangling edge to the accepting state.
//!
//! # The dialect
//!
//! Atoms are single characters; `|` alternates, `*`/`+`/`?` quantify, `(` `)`
//! group, and `.` concatenates — it is the explicit spelling of the implicit
//! concatenation between adjacent atoms, *not* a wildcard.  There is no
//! escape mechanism, so the operator characters cannot be matched literally.
//! Atoms outside ASCII are matched as their UTF-8 byte sequence.
//!
//! # Ownership
//!
//! The automaton graph has cycles (`*`, `+`) and shared sinks (every branch
//! reaches the single accepting state), so states cannot be owned through
//! the edges.  Instead the compiled [`Regex`] holds a flat arena of states
//! and every edge is a plain index into it; dropping the `Regex` frees the
//! whole graph in one step.

use std::fmt;
use std::io::Write;
use std::ops::{Index, IndexMut};

use indexmap::IndexSet;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// An error returned when a pattern does not compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// An operator found too few operands on the fragment stack.  The
    /// payload is the operator character (`.` for the concatenation
    /// marker, whether written or inserted by normalization).
    MissingOperand(char),
    /// A `)` without a matching `(`, or a `(` that was never closed.
    UnbalancedParens,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOperand(op) => {
                write!(f, "malformed pattern: operator `{}` is missing an operand", op)
            }
            Self::UnbalancedParens => {
                write!(f, "malformed pattern: unbalanced parentheses")
            }
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Lexical normalization
// ---------------------------------------------------------------------------

/// The operator alphabet of the dialect.  Every other character is an atom.
fn is_operator(ch: char) -> bool {
    matches!(ch, '*' | '+' | '?' | '.' | '|' | '(' | ')')
}

/// Insert the explicit concatenation marker `.` wherever two pieces of the
/// pattern are adjacent without an operator between them.
///
/// A marker goes between `prev` and `cur` exactly when `prev` can end an
/// expression (an atom, `)`, or a postfix quantifier) and `cur` can start
/// one (an atom or `(`).  Everything else — including degenerate shapes
/// like a leading quantifier — passes through unvalidated and is left for
/// [`shunting_yard`] and the builder to reject.
///
/// Normalization is idempotent: the inserted `.` neither ends nor starts
/// an expression, so a second pass finds nothing to do.
pub fn explicit_concat(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut prev: Option<char> = None;
    for ch in pattern.chars() {
        if let Some(prev) = prev {
            let ends_expr = !is_operator(prev) || matches!(prev, ')' | '*' | '+' | '?');
            let starts_expr = !is_operator(ch) || ch == '(';
            if ends_expr && starts_expr {
                out.push('.');
            }
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// Shunting yard (infix -> postfix)
// ---------------------------------------------------------------------------

/// A postfix token consumed by [`RegexBuilder::next_fragment`] to emit NFA
/// states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// A single atom character.
    Literal(char),
    /// Binary concatenation (`.`).
    Catenate,
    /// Binary alternation (`|`).
    Alternate,
    /// Postfix `?`.
    RepeatZeroOne,
    /// Postfix `*`.
    RepeatZeroPlus,
    /// Postfix `+`.
    RepeatOnePlus,
}

/// Binding strength; higher binds tighter.
fn precedence(op: char) -> u8 {
    match op {
        '*' | '+' | '?' => 3,
        '.' => 2,
        '|' => 1,
        _ => 0,
    }
}

fn operator_token(op: char) -> Token {
    match op {
        '.' => Token::Catenate,
        '|' => Token::Alternate,
        '?' => Token::RepeatZeroOne,
        '*' => Token::RepeatZeroPlus,
        '+' => Token::RepeatOnePlus,
        _ => unreachable!("not an operator: {:?}", op),
    }
}

/// Convert a normalized infix pattern into a postfix token stream.
///
/// Classic left-associative shunting yard: atoms emit directly, operators
/// pop while the stack top binds at least as tightly, `(` pushes, and `)`
/// pops back to the matching `(`, which is discarded.  An empty pattern
/// yields an empty stream.
///
/// Fails with [`Error::UnbalancedParens`] when a `)` finds no `(` on the
/// stack, or a `(` is still on the stack after the input is exhausted.
pub fn shunting_yard(infix: &str) -> Result<Vec<Token>, Error> {
    let mut output = Vec::new();
    let mut operators: Vec<char> = Vec::new();

    for ch in infix.chars() {
        match ch {
            '(' => operators.push(ch),
            ')' => loop {
                match operators.pop() {
                    Some('(') => break,
                    Some(op) => output.push(operator_token(op)),
                    None => return Err(Error::UnbalancedParens),
                }
            },
            op if is_operator(op) => {
                while let Some(&top) = operators.last() {
                    if top == '(' || precedence(top) < precedence(op) {
                        break;
                    }
                    operators.pop();
                    output.push(operator_token(top));
                }
                operators.push(op);
            }
            atom => output.push(Token::Literal(atom)),
        }
    }

    while let Some(op) = operators.pop() {
        if op == '(' {
            return Err(Error::UnbalancedParens);
        }
        output.push(operator_token(op));
    }

    Ok(output)
}

// ---------------------------------------------------------------------------
// NFA states
// ---------------------------------------------------------------------------

/// A single NFA state.
///
/// `Split` states are followed silently during [`Matcher::addstate`];
/// `Byte` states are stepped over in [`Matcher::step`]; `Match` is the one
/// accepting state, appended last by [`RegexBuilder::build`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Epsilon fork: follow both `out` and `out1` without consuming input.
    Split { out: StateIdx, out1: StateIdx },

    /// Match a literal byte, then follow `out`.
    Byte { byte: u8, out: StateIdx },

    /// Accepting state.
    Match,
}

impl State {
    /// The state's dangling slot: the out-edge that is still unset while
    /// the state sits in a fragment's dangling chain.  `Byte` dangles on
    /// its only edge, `Split` on its second (the quantifier gadgets fill
    /// the first at creation).
    fn next(&self) -> StateIdx {
        match self {
            State::Byte { out, .. } => *out,
            State::Split { out1, .. } => *out1,
            State::Match => unreachable!("match state has no out slot"),
        }
    }

    /// Overwrite the dangling slot.
    fn append(&mut self, next: StateIdx) {
        match self {
            State::Byte { out, .. } => *out = next,
            State::Split { out1, .. } => *out1 = next,
            State::Match => unreachable!("match state has no out slot"),
        }
    }
}

/// Index into the NFA state arena ([`Regex::states`]).
///
/// [`StateIdx::NONE`] marks an unpatched out-edge during construction; no
/// reachable edge stores it once [`RegexBuilder::build`] returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct StateIdx(u32);

impl StateIdx {
    /// Sentinel for a dangling out-edge.
    const NONE: Self = Self(u32::MAX);

    /// The raw index as `usize`.  Panics on `NONE` in debug builds.
    #[inline]
    fn idx(self) -> usize {
        debug_assert!(self != Self::NONE, "StateIdx::NONE used as index");
        self.0 as usize
    }

    /// The raw index without the `NONE` check, for bounds tests where
    /// `NONE` is an expected terminator.
    #[inline]
    fn raw(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `states[state_idx]` — typed access to the state arena.
impl Index<StateIdx> for [State] {
    type Output = State;

    #[inline]
    fn index(&self, idx: StateIdx) -> &State {
        &self[idx.idx()]
    }
}

impl IndexMut<StateIdx> for [State] {
    #[inline]
    fn index_mut(&mut self, idx: StateIdx) -> &mut State {
        &mut self[idx.idx()]
    }
}

/// Bounds-checked mutable access by [`StateIdx`].
trait StateSliceExt {
    /// Returns `None` for [`StateIdx::NONE`] or any out-of-range index.
    fn get_mut_state(&mut self, idx: StateIdx) -> Option<&mut State>;
}

impl StateSliceExt for [State] {
    #[inline]
    fn get_mut_state(&mut self, idx: StateIdx) -> Option<&mut State> {
        self.get_mut(idx.raw())
    }
}

// ---------------------------------------------------------------------------
// NFA fragment (used during construction)
// ---------------------------------------------------------------------------

/// A partially-built NFA: a `start` state plus the head of the dangling
/// chain.
///
/// The dangling "set" is threaded through the unset out-slots themselves:
/// each slot in the chain stores the index of the next dangling state, and
/// the last stores [`StateIdx::NONE`].  [`RegexBuilder::patch`] walks the
/// chain overwriting every slot with the real target, so the bookkeeping
/// costs no allocation and vanishes with the fragment.
#[derive(Debug)]
struct Fragment {
    start: StateIdx,
    out: StateIdx,
}

impl Fragment {
    fn new(start: StateIdx, out: StateIdx) -> Self {
        Self { start, out }
    }
}

// ---------------------------------------------------------------------------
// NFA builder (postfix -> NFA)
// ---------------------------------------------------------------------------

/// Compiles patterns into ready-to-match [`Regex`]es.
///
/// One builder can be reused across compiles; the state arena and fragment
/// stack are reset at the start of every [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RegexBuilder {
    states: Vec<State>,
    frags: Vec<Fragment>,
}

impl RegexBuilder {
    /// Append a new state to the arena and return its index.
    fn state(&mut self, state: State) -> StateIdx {
        let idx = StateIdx(self.states.len() as u32);
        self.states.push(state);
        idx
    }

    /// Walk the dangling chain starting at `list` and point every slot in
    /// it at `idx`.
    fn patch(&mut self, mut list: StateIdx, idx: StateIdx) {
        while let Some(state) = self.states.get_mut_state(list) {
            list = match state {
                State::Byte { out, .. } => std::mem::replace(out, idx),
                State::Split { out1, .. } => std::mem::replace(out1, idx),
                State::Match => unreachable!("match state in a dangling chain"),
            };
        }
    }

    /// Splice the chain starting at `list2` onto the end of the chain
    /// starting at `list1` and return the combined head.
    fn append(&mut self, list1: StateIdx, list2: StateIdx) -> StateIdx {
        let len = self.states.len();
        let mut s = &mut self.states.as_mut_slice()[list1];
        let mut next = s.next();
        while next.raw() < len {
            s = &mut self.states.as_mut_slice()[next];
            next = s.next();
        }
        s.append(list2);
        list1
    }

    /// Pop one operand for `op`, or fail the compile.
    fn pop_operand(&mut self, op: char) -> Result<Fragment, Error> {
        self.frags.pop().ok_or(Error::MissingOperand(op))
    }

    /// A fragment matching the single atom `ch`: a chain of `Byte` states,
    /// one per UTF-8 code unit, dangling on the last one.
    fn literal(&mut self, ch: char) -> Fragment {
        let mut buf = [0u8; 4];
        let bytes = ch.encode_utf8(&mut buf).as_bytes();
        let start = self.state(State::Byte {
            byte: bytes[0],
            out: StateIdx::NONE,
        });
        let mut last = start;
        for &byte in &bytes[1..] {
            let idx = self.state(State::Byte {
                byte,
                out: StateIdx::NONE,
            });
            self.patch(last, idx);
            last = idx;
        }
        Fragment::new(start, last)
    }

    /// Consume one postfix token and return the corresponding fragment.
    fn next_fragment(&mut self, token: Token) -> Result<Fragment, Error> {
        let frag = match token {
            Token::Literal(ch) => self.literal(ch),
            Token::Catenate => {
                let e2 = self.pop_operand('.')?;
                let e1 = self.pop_operand('.')?;
                self.patch(e1.out, e2.start);
                Fragment::new(e1.start, e2.out)
            }
            Token::Alternate => {
                let e2 = self.pop_operand('|')?;
                let e1 = self.pop_operand('|')?;
                let s = self.state(State::Split {
                    out: e1.start,
                    out1: e2.start,
                });
                Fragment::new(s, self.append(e1.out, e2.out))
            }
            Token::RepeatZeroOne => {
                let e = self.pop_operand('?')?;
                let s = self.state(State::Split {
                    out: e.start,
                    out1: StateIdx::NONE,
                });
                Fragment::new(s, self.append(e.out, s))
            }
            Token::RepeatZeroPlus => {
                let e = self.pop_operand('*')?;
                let s = self.state(State::Split {
                    out: e.start,
                    out1: StateIdx::NONE,
                });
                self.patch(e.out, s);
                Fragment::new(s, s)
            }
            Token::RepeatOnePlus => {
                let e = self.pop_operand('+')?;
                let s = self.state(State::Split {
                    out: e.start,
                    out1: StateIdx::NONE,
                });
                self.patch(e.out, s);
                Fragment::new(e.start, s)
            }
        };
        Ok(frag)
    }

    /// Compile `pattern` into a ready-to-match [`Regex`].
    ///
    /// Drives the whole pipeline: normalization, postfix conversion, one
    /// fragment per token, and the final patch of every dangling edge to a
    /// freshly appended `Match` state.  An empty pattern compiles to a
    /// lone `Match` state, which accepts exactly the empty input.
    pub fn build(&mut self, pattern: &str) -> Result<Regex, Error> {
        self.states.clear();
        self.frags.clear();

        for token in shunting_yard(&explicit_concat(pattern))? {
            let frag = self.next_fragment(token)?;
            self.frags.push(frag);
        }

        let start = match self.frags.pop() {
            Some(e) => {
                // A postfix stream that survived next_fragment reduces to a
                // single fragment; the normalizer supplies the concatenation
                // operators to get there.
                assert!(self.frags.is_empty());
                let s = self.state(State::Match);
                self.patch(e.out, s);
                e.start
            }
            None => self.state(State::Match),
        };

        Ok(Regex {
            states: StateList(std::mem::take(&mut self.states).into_boxed_slice()),
            start,
            pattern: pattern.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Compiled regex
// ---------------------------------------------------------------------------

struct StateList(Box<[State]>);

impl fmt::Debug for StateList {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_map().entries(self.0.iter().enumerate()).finish()
    }
}

impl std::ops::Deref for StateList {
    type Target = [State];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A compiled NFA ready for matching.
///
/// Owns the state arena and the original pattern text.  Matching takes
/// `&self` and keeps all scratch per call, so a `Regex` can be shared
/// across threads matching distinct inputs.
#[derive(Debug)]
pub struct Regex {
    states: StateList,
    start: StateIdx,
    pattern: String,
}

impl Regex {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        RegexBuilder::default().build(pattern)
    }

    /// The pattern this regex was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the whole of `input` is accepted by this regex.
    ///
    /// Never fails; an input that strays from every live thread simply
    /// reports `false`.
    pub fn is_match(&self, input: &[u8]) -> bool {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(self);
        matcher.chunk(input);
        matcher.finish()
    }

    /// Write a line-per-state dump of the reachable graph: identifier,
    /// label, and out-edge identifiers.  A visited set guards against the
    /// graph's cycles; discovery order is stable across runs.
    pub fn render(&self, mut buffer: impl Write) {
        writeln!(buffer, "pattern {:?}", self.pattern).unwrap();
        writeln!(buffer, "start {}", self.start).unwrap();
        let mut visited = IndexSet::new();
        let mut stack = vec![self.start];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            match self.states[idx] {
                State::Byte { byte, out } => {
                    writeln!(buffer, "{} byte '{}' -> {}", idx, byte.escape_ascii(), out)
                        .unwrap();
                    stack.push(out);
                }
                State::Split { out, out1 } => {
                    writeln!(buffer, "{} split -> {} {}", idx, out, out1).unwrap();
                    stack.push(out1);
                    stack.push(out);
                }
                State::Match => {
                    writeln!(buffer, "{} match", idx).unwrap();
                }
            }
        }
    }

    /// Emit a Graphviz DOT representation of the NFA.
    pub fn to_dot(&self, mut buffer: impl Write) {
        writeln!(buffer, "digraph graphname {{").unwrap();
        writeln!(buffer, "\trankdir=LR;").unwrap();
        writeln!(buffer, "\t{} [shape=box];", self.start).unwrap();
        let mut visited = IndexSet::new();
        let mut stack = vec![self.start];
        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            match self.states[idx] {
                State::Byte { byte, out } => {
                    writeln!(
                        buffer,
                        "\t{} -> {} [label=\"{}\"];",
                        idx,
                        out,
                        byte.escape_ascii()
                    )
                    .unwrap();
                    stack.push(out);
                }
                State::Split { out, out1 } => {
                    writeln!(buffer, "\t{} -> {} [label=\"&epsilon;\"];", idx, out).unwrap();
                    writeln!(buffer, "\t{} -> {} [label=\"&epsilon;\"];", idx, out1).unwrap();
                    stack.push(out1);
                    stack.push(out);
                }
                State::Match => {
                    writeln!(buffer, "\t{} [peripheries=2];", idx).unwrap();
                }
            }
        }
        writeln!(buffer, "}}").unwrap();
    }
}

// ---------------------------------------------------------------------------
// Matcher (NFA simulation)
// ---------------------------------------------------------------------------

/// Reusable scratch memory for [`Matcher`].  Create once, call
/// [`matcher`](Self::matcher) for each input to match; the backing vectors
/// keep their capacity across calls.
#[derive(Debug, Default)]
pub struct MatcherMemory {
    /// Per-state: the `listid` of the generation the state last joined.
    /// Gives O(1) deduplication in `addstate`.
    lastlist: Vec<usize>,
    /// Current and next state lists (swapped each step).
    clist: Vec<StateIdx>,
    nlist: Vec<StateIdx>,
}

impl MatcherMemory {
    /// Start a match of `regex` against a fresh input, seeding the current
    /// configuration with the epsilon closure of the start state.
    pub fn matcher<'a>(&'a mut self, regex: &'a Regex) -> Matcher<'a> {
        self.lastlist.clear();
        self.lastlist.resize(regex.states.len(), usize::MAX);
        self.clist.clear();
        self.nlist.clear();

        let mut m = Matcher {
            states: &regex.states,
            lastlist: &mut self.lastlist,
            listid: 0,
            clist: &mut self.clist,
            nlist: &mut self.nlist,
        };
        m.startlist(regex.start);
        m
    }
}

/// Runs a Thompson NFA simulation over one input.
///
/// The whole input must be accepted: there is no re-seeding of the start
/// state mid-input, so `abc` does not match inside `xabcx`.
#[derive(Debug)]
pub struct Matcher<'a> {
    states: &'a [State],
    /// Per-state deduplication stamp (compared against `listid`).
    lastlist: &'a mut [usize],
    /// Monotonically increasing generation id.
    listid: usize,
    /// Current active configuration.
    clist: &'a mut Vec<StateIdx>,
    /// Next configuration (built during a step).
    nlist: &'a mut Vec<StateIdx>,
}

impl<'a> Matcher<'a> {
    /// Compute the initial configuration from the start state.
    fn startlist(&mut self, start: StateIdx) {
        self.addstate(start);
        std::mem::swap(self.clist, self.nlist);
        self.listid += 1;
    }

    /// Add `idx` and everything reachable from it over epsilon edges to
    /// `nlist`.
    ///
    /// The `lastlist`/`listid` stamp lets each state join a generation at
    /// most once, so the recursion terminates on cyclic graphs and the
    /// configuration never holds duplicates.  Epsilon closure happens
    /// here, at insertion time — including after the final input byte, so
    /// acceptance needs no further expansion.
    fn addstate(&mut self, idx: StateIdx) {
        let i = idx.idx();
        if self.lastlist[i] == self.listid {
            return;
        }
        self.lastlist[i] = self.listid;
        if let State::Split { out, out1 } = self.states[idx] {
            self.addstate(out);
            self.addstate(out1);
        }
        self.nlist.push(idx);
    }

    /// Advance the simulation by one input byte: every `Byte` state in the
    /// current configuration that matches `b` contributes the epsilon
    /// closure of its target to the next configuration.
    pub fn step(&mut self, b: u8) {
        self.nlist.clear();
        let clist = std::mem::take(self.clist);
        for &idx in &clist {
            if let State::Byte { byte, out } = self.states[idx] {
                if byte == b {
                    self.addstate(out);
                }
            }
        }
        *self.clist = std::mem::replace(self.nlist, clist);
        self.listid += 1;
    }

    /// Feed an entire byte slice, one byte at a time.  Returns early once
    /// the configuration is empty: with no live states, no further input
    /// can revive the match.
    pub fn chunk(&mut self, input: &[u8]) {
        for &b in input {
            if self.clist.is_empty() {
                return;
            }
            self.step(b);
        }
    }

    /// Consume the matcher and report whether the accepting state is in
    /// the final configuration.
    pub fn finish(self) -> bool {
        self.clist
            .iter()
            .any(|&idx| matches!(self.states[idx], State::Match))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
