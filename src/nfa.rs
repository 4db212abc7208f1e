//! NFA states, the Thompson builder and the DOT exporter.
//!
//! States live in a single arena and refer to each other by [`StateIdx`],
//! so the loops produced by `*`, `+` and `{m,}` need no shared ownership.
//! Every grammar node lowers to a [`Fragment`] with exactly one entry and
//! one exit state; fragments are glued together with epsilon edges.
//!
//! ```text
//! a*   ──>  s ──ε──> [a] ──ε──> e
//!           │         ^  │      ^
//!           │         └ε─┘      │
//!           └──────────ε────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::ops::{Index, IndexMut};

use indexmap::{IndexMap, IndexSet};

use crate::ast::Node;
use crate::{ErrorKind, PatternError};

// ---------------------------------------------------------------------------
// Indices
// ---------------------------------------------------------------------------

/// Index into the NFA state arena ([`Nfa::states`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateIdx(u32);

impl StateIdx {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `states[state_idx]`: typed access to the state arena.
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

/// Index into the interned character-class table ([`Nfa::classes`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassIdx(u32);

impl ClassIdx {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// `classes[class_idx]`: typed access to the class table.
impl Index<ClassIdx> for [CharClass] {
    type Output = CharClass;

    #[inline]
    fn index(&self, idx: ClassIdx) -> &CharClass {
        &self[idx.idx()]
    }
}

// ---------------------------------------------------------------------------
// Character classes
// ---------------------------------------------------------------------------

/// A membership test over an explicit set of characters.
///
/// A character passes iff `set.contains(c) == positive`, so
/// `{ positive: false, set: {} }` accepts everything (`.`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CharClass {
    pub positive: bool,
    pub set: BTreeSet<char>,
}

impl CharClass {
    #[inline]
    pub fn matches(&self, c: char) -> bool {
        self.set.contains(&c) == self.positive
    }

    /// Dot-graph label: the members for small sets, a count otherwise.
    fn label(&self) -> String {
        if !self.positive && self.set.is_empty() {
            return ".".to_string();
        }
        let neg = if self.positive { "" } else { "^" };
        if self.set.len() > 16 {
            return format!("[{}{} chars]", neg, self.set.len());
        }
        let members: String = self.set.iter().flat_map(|c| c.escape_default()).collect();
        format!("[{}{}]", neg, members)
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// A positional constraint carried by a state.
///
/// The state's epsilon edges are only followed while the constraint holds
/// at the current position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// `^`
    Start,
    /// `$`
    End,
}

impl Anchor {
    /// Evaluate this anchor.
    ///
    /// * `at`: the current byte offset.
    /// * `origin`: the offset `^` is pinned to (the attempt start, or 0 in
    ///   strict mode).
    /// * `end`: the length of the text.
    #[inline]
    pub fn eval(self, at: usize, origin: usize, end: usize) -> bool {
        match self {
            Anchor::Start => at == origin,
            Anchor::End => at == end,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Anchor::Start => "^",
            Anchor::End => "$",
        }
    }
}

/// Marks the entry or exit state of a capturing group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupBoundary {
    Open(usize),
    Close(usize),
}

/// A class test and the state reached when it passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassEdge {
    pub class: ClassIdx,
    pub out: StateIdx,
}

/// A single NFA state.
///
/// Consuming edges are the direct `transitions` and the optional `class`
/// edge; both are stepped over in [`Matcher::step`](crate::Matcher).
/// Everything else is followed during the epsilon closure.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Character-keyed edges, in insertion order.
    pub(crate) transitions: IndexMap<char, Vec<StateIdx>>,
    pub(crate) epsilon: Vec<StateIdx>,
    pub(crate) class: Option<ClassEdge>,
    pub(crate) anchor: Option<Anchor>,
    pub(crate) group: Option<GroupBoundary>,
    pub(crate) backref: Option<usize>,
}

impl State {
    pub fn transitions(&self) -> &IndexMap<char, Vec<StateIdx>> {
        &self.transitions
    }

    pub fn epsilon(&self) -> &[StateIdx] {
        &self.epsilon
    }

    pub fn class(&self) -> Option<ClassEdge> {
        self.class
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn group(&self) -> Option<GroupBoundary> {
        self.group
    }

    /// Group number of a `\N` state.  Recorded only; never checked.
    pub fn backref_target(&self) -> Option<usize> {
        self.backref
    }
}

// ---------------------------------------------------------------------------
// Compiled automaton
// ---------------------------------------------------------------------------

/// A compiled NFA.  Read-only once built.
#[derive(Debug)]
pub struct Nfa {
    states: Box<[State]>,
    /// Deduplicated class tests referenced by [`ClassEdge::class`].
    classes: Box<[CharClass]>,
    start: StateIdx,
    accept: StateIdx,
    captures: usize,
    anchored_start: bool,
    anchored_end: bool,
}

impl Nfa {
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn classes(&self) -> &[CharClass] {
        &self.classes
    }

    pub fn start(&self) -> StateIdx {
        self.start
    }

    pub fn accept(&self) -> StateIdx {
        self.accept
    }

    /// Number of capturing groups in the pattern.
    pub fn captures_len(&self) -> usize {
        self.captures
    }

    /// Whether the pattern began with `^`.
    pub fn anchored_start(&self) -> bool {
        self.anchored_start
    }

    /// Whether the pattern ended with an unescaped `$`.
    pub fn anchored_end(&self) -> bool {
        self.anchored_end
    }

    /// Emit a Graphviz DOT representation of every state reachable from
    /// the start state.
    pub fn to_dot(&self, mut buffer: impl Write) -> io::Result<()> {
        let mut visited = vec![false; self.states.len()];
        writeln!(buffer, "digraph nfa {{")?;
        writeln!(buffer, "\trankdir=LR;")?;
        writeln!(buffer, "\t{} [shape=box];", self.start)?;
        writeln!(buffer, "\t{} [peripheries=2];", self.accept)?;
        let mut stack = vec![self.start];
        while let Some(s) = stack.pop() {
            if visited[s.idx()] {
                continue;
            }
            visited[s.idx()] = true;
            self.write_dot_state(s, &mut buffer, &mut stack)?;
        }
        writeln!(buffer, "}}")
    }

    fn write_dot_state(
        &self,
        idx: StateIdx,
        buffer: &mut impl Write,
        stack: &mut Vec<StateIdx>,
    ) -> io::Result<()> {
        let state = &self.states[idx];
        if let Some(anchor) = state.anchor {
            writeln!(buffer, "\t{} [shape=diamond, xlabel=\"{}\"];", idx, anchor.label())?;
        }
        match state.group {
            Some(GroupBoundary::Open(g)) => writeln!(buffer, "\t{} [xlabel=\"({}\"];", idx, g)?,
            Some(GroupBoundary::Close(g)) => writeln!(buffer, "\t{} [xlabel=\"{})\"];", idx, g)?,
            None => {}
        }
        for (c, targets) in &state.transitions {
            for &out in targets {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"{}\"];", idx, out, c.escape_default())?;
            }
        }
        // Positive classes already list their members as direct edges.
        if let Some(ClassEdge { class, out }) = state.class
            && !self.classes[class].positive
        {
            stack.push(out);
            let label = self.classes[class].label();
            writeln!(buffer, "\t{} -> {} [label=\"{}\"];", idx, out, label.escape_default())?;
        }
        for &out in &state.epsilon {
            stack.push(out);
            match state.backref {
                Some(n) => writeln!(buffer, "\t{} -> {} [label=\"\\\\{}\"];", idx, out, n)?,
                None => writeln!(buffer, "\t{} -> {} [label=\"ε\", style=dashed];", idx, out)?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder (syntax tree -> NFA)
// ---------------------------------------------------------------------------

/// A partially-built NFA piece with a single entry and a single exit.
#[derive(Clone, Copy, Debug)]
struct Fragment {
    start: StateIdx,
    end: StateIdx,
}

impl Fragment {
    fn new(start: StateIdx, end: StateIdx) -> Self {
        Self { start, end }
    }
}

/// Default cap on the number of states one pattern may compile to.
///
/// Bounded repetition is built by copying, so `(a{1000}){1000}` would
/// otherwise grow the arena without limit.
pub const DEFAULT_STATE_LIMIT: usize = 1 << 18;

/// Lowers a syntax tree into an [`Nfa`].
///
/// The arena length doubles as the state-id counter, so ids are dense and
/// local to one build.
#[derive(Debug)]
pub struct NfaBuilder {
    states: Vec<State>,
    classes: IndexSet<CharClass>,
    state_limit: usize,
}

impl Default for NfaBuilder {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            classes: IndexSet::new(),
            state_limit: DEFAULT_STATE_LIMIT,
        }
    }
}

impl NfaBuilder {
    /// Fail with [`ErrorKind::TooLarge`] once a build needs more than
    /// `limit` states.
    pub fn state_limit(&mut self, limit: usize) -> &mut Self {
        self.state_limit = limit;
        self
    }

    /// Compile `node` into an [`Nfa`], splicing in `^` before the body and
    /// `$` after it when requested.
    pub fn build(
        &mut self,
        node: &Node,
        anchored_start: bool,
        anchored_end: bool,
        captures: usize,
    ) -> Result<Nfa, PatternError> {
        self.states.clear();
        self.classes.clear();

        let built = self.assemble(node, anchored_start, anchored_end);
        let (start, accept) = match built {
            Ok(ends) => ends,
            Err(err) => {
                log::debug!("NFA build abandoned after {} states: {}", self.states.len(), err);
                self.states = Vec::new();
                self.classes.clear();
                return Err(err);
            }
        };

        log::debug!(
            "built NFA: {} states, {} classes, {} groups, anchors ^={} $={}",
            self.states.len(),
            self.classes.len(),
            captures,
            anchored_start,
            anchored_end,
        );

        Ok(Nfa {
            states: std::mem::take(&mut self.states).into_boxed_slice(),
            classes: std::mem::take(&mut self.classes).into_iter().collect(),
            start,
            accept,
            captures,
            anchored_start,
            anchored_end,
        })
    }

    fn assemble(
        &mut self,
        node: &Node,
        anchored_start: bool,
        anchored_end: bool,
    ) -> Result<(StateIdx, StateIdx), PatternError> {
        let start = self.state()?;
        let mut cur = start;
        if anchored_start {
            let anchor = self.anchor(Anchor::Start)?;
            cur = self.chain(cur, anchor);
        }
        let body = self.fragment(node)?;
        cur = self.chain(cur, body);
        if anchored_end {
            let anchor = self.anchor(Anchor::End)?;
            cur = self.chain(cur, anchor);
        }
        let accept = self.state()?;
        self.epsilon(cur, accept);
        Ok((start, accept))
    }

    // -- Low-level construction helpers --------------------------------------

    /// Push a fresh state and return its index.
    fn state(&mut self) -> Result<StateIdx, PatternError> {
        let limit = self.state_limit;
        let too_large = || PatternError::new(ErrorKind::TooLarge(limit), 0);
        if self.states.len() >= self.state_limit {
            return Err(too_large());
        }
        let idx = u32::try_from(self.states.len()).map_err(|_| too_large())?;
        self.states.push(State::default());
        Ok(StateIdx(idx))
    }

    fn epsilon(&mut self, from: StateIdx, to: StateIdx) {
        self.states[from.idx()].epsilon.push(to);
    }

    /// Epsilon from `cur` into `frag`; returns the new tail.
    fn chain(&mut self, cur: StateIdx, frag: Fragment) -> StateIdx {
        self.epsilon(cur, frag.start);
        frag.end
    }

    /// Return the index of `class`, inserting it if it is not already
    /// present, so repeated classes (`\d\d`, `.{3}`) share one entry.
    fn intern_class(&mut self, class: CharClass) -> ClassIdx {
        let (idx, _) = self.classes.insert_full(class);
        // At most one class per state, so this is within the state limit.
        ClassIdx(idx as u32)
    }

    // -- One rule per node kind ----------------------------------------------

    fn fragment(&mut self, node: &Node) -> Result<Fragment, PatternError> {
        match node {
            Node::Literal(c) | Node::EscapedLiteral(c) => self.literal(*c),
            Node::CharacterClass { positive, set } => self.class(*positive, set),
            Node::Quantifier { child, min, max } => self.repeat(child, *min, *max),
            Node::Alternation(branches) => self.alternation(branches),
            Node::Sequence(children) => self.sequence(children, None),
            Node::Group { children, index } => self.sequence(children, *index),
            Node::Backreference(n) => self.backreference(*n),
            Node::AnchorStart => self.anchor(Anchor::Start),
            Node::AnchorEnd => self.anchor(Anchor::End),
        }
    }

    fn literal(&mut self, c: char) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let end = self.state()?;
        self.states[start.idx()]
            .transitions
            .entry(c)
            .or_default()
            .push(end);
        Ok(Fragment::new(start, end))
    }

    /// Positive classes get one direct edge per member plus the class edge;
    /// negative classes only have the class edge.
    fn class(&mut self, positive: bool, set: &BTreeSet<char>) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let end = self.state()?;
        let class = self.intern_class(CharClass {
            positive,
            set: set.clone(),
        });
        let state = &mut self.states[start.idx()];
        if positive {
            for &c in set {
                state.transitions.entry(c).or_default().push(end);
            }
        }
        state.class = Some(ClassEdge { class, out: end });
        Ok(Fragment::new(start, end))
    }

    fn repeat(&mut self, child: &Node, min: usize, max: Option<usize>) -> Result<Fragment, PatternError> {
        match (min, max) {
            (0, None) => self.star(child),
            (1, None) => {
                let first = self.fragment(child)?;
                let rest = self.star(child)?;
                self.epsilon(first.end, rest.start);
                Ok(Fragment::new(first.start, rest.end))
            }
            _ => self.counted(child, min, max),
        }
    }

    fn star(&mut self, child: &Node) -> Result<Fragment, PatternError> {
        let body = self.fragment(child)?;
        let start = self.state()?;
        let end = self.state()?;
        self.epsilon(start, body.start);
        self.epsilon(start, end);
        self.epsilon(body.end, body.start);
        self.epsilon(body.end, end);
        Ok(Fragment::new(start, end))
    }

    /// `min` mandatory copies, then either one optional loop (`{m,}`) or
    /// `max - min` optional copies that may each bail out to the end.
    fn counted(&mut self, child: &Node, min: usize, max: Option<usize>) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let mut cur = start;
        for _ in 0..min {
            let copy = self.fragment(child)?;
            cur = self.chain(cur, copy);
        }
        let end = self.state()?;
        match max {
            None => {
                let entry = self.state()?;
                let exit = self.state()?;
                let body = self.fragment(child)?;
                self.epsilon(cur, entry);
                self.epsilon(entry, body.start);
                self.epsilon(entry, exit);
                self.epsilon(body.end, entry);
                self.epsilon(body.end, exit);
                cur = exit;
            }
            Some(max) => {
                for _ in min..max {
                    let copy = self.fragment(child)?;
                    self.epsilon(cur, end);
                    cur = self.chain(cur, copy);
                }
            }
        }
        self.epsilon(cur, end);
        Ok(Fragment::new(start, end))
    }

    /// One shared entry and exit around every branch, in pattern order.
    fn alternation(&mut self, branches: &[Node]) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let mut ends = Vec::with_capacity(branches.len());
        for branch in branches {
            let frag = self.fragment(branch)?;
            self.epsilon(start, frag.start);
            ends.push(frag.end);
        }
        let end = self.state()?;
        for branch_end in ends {
            self.epsilon(branch_end, end);
        }
        Ok(Fragment::new(start, end))
    }

    /// Chain `children` end-to-start inside one wrapping pair; a capturing
    /// group tags the pair with its index.
    fn sequence(&mut self, children: &[Node], group: Option<usize>) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let mut cur = start;
        for child in children {
            let frag = self.fragment(child)?;
            cur = self.chain(cur, frag);
        }
        let end = self.state()?;
        self.epsilon(cur, end);
        if let Some(g) = group {
            self.states[start.idx()].group = Some(GroupBoundary::Open(g));
            self.states[end.idx()].group = Some(GroupBoundary::Close(g));
        }
        Ok(Fragment::new(start, end))
    }

    fn backreference(&mut self, n: usize) -> Result<Fragment, PatternError> {
        let start = self.state()?;
        let end = self.state()?;
        self.epsilon(start, end);
        self.states[start.idx()].backref = Some(n);
        Ok(Fragment::new(start, end))
    }

    fn anchor(&mut self, anchor: Anchor) -> Result<Fragment, PatternError> {
        let idx = self.state()?;
        self.states[idx.idx()].anchor = Some(anchor);
        Ok(Fragment::new(idx, idx))
    }
}
