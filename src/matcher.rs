//! State-set simulation of an [`Nfa`] over a `&str`.
//!
//! One *attempt* pins the start state at a byte offset `i` and walks the
//! text forward, keeping the set of active states.  The accept state being
//! active after consuming up to offset `j` makes `j` a candidate end; later
//! candidates overwrite earlier ones, so an attempt reports the longest
//! match starting at `i`.  Scans try `i = pos, pos + 1, …` in order and stop
//! at the first attempt that reports anything.

use crate::nfa::{Nfa, StateIdx};

/// Reusable working sets for [`Matcher`].  Create once per call and run as
/// many attempts as needed through [`matcher`](Self::matcher).
#[derive(Debug, Default)]
pub struct MatcherMemory {
    /// Per-state: the `listid` when the state was last added.  Used for
    /// O(1) deduplication in `addstate`.
    lastlist: Vec<usize>,
    /// Current and next state lists (swapped each step).
    clist: Vec<StateIdx>,
    nlist: Vec<StateIdx>,
    /// Explicit DFS stack for the epsilon closure.
    stack: Vec<StateIdx>,
}

impl MatcherMemory {
    /// Reset the working sets for `nfa` and bind them to `text`.
    ///
    /// With `strict_start`, `^` only holds at offset 0 instead of at the
    /// start of every attempt.
    pub fn matcher<'a>(&'a mut self, nfa: &'a Nfa, text: &'a str, strict_start: bool) -> Matcher<'a> {
        self.lastlist.clear();
        self.lastlist.resize(nfa.states().len(), usize::MAX);
        self.clist.clear();
        self.nlist.clear();
        self.stack.clear();

        Matcher {
            nfa,
            text,
            lastlist: &mut self.lastlist,
            listid: 0,
            clist: &mut self.clist,
            nlist: &mut self.nlist,
            stack: &mut self.stack,
            origin: 0,
            strict_start,
        }
    }
}

/// Runs attempts of one [`Nfa`] against one text.
#[derive(Debug)]
pub struct Matcher<'a> {
    nfa: &'a Nfa,
    text: &'a str,
    /// Per-state deduplication stamp (compared against `listid`).
    lastlist: &'a mut [usize],
    /// Monotonically increasing closure ID.
    listid: usize,
    /// Current active state list.
    clist: &'a mut Vec<StateIdx>,
    /// Next active state list (built during a step).
    nlist: &'a mut Vec<StateIdx>,
    stack: &'a mut Vec<StateIdx>,
    /// Start offset of the running attempt.
    origin: usize,
    strict_start: bool,
}

impl<'a> Matcher<'a> {
    /// Add `idx` and everything epsilon-reachable from it to `nlist`.
    ///
    /// `at` is the byte offset the closure is taken at; anchor states only
    /// let their epsilon edges through while their constraint holds there.
    fn addstate(&mut self, idx: StateIdx, at: usize) {
        let nfa = self.nfa;
        let origin = if self.strict_start { 0 } else { self.origin };
        let end = self.text.len();

        self.stack.push(idx);
        while let Some(s) = self.stack.pop() {
            let i = s.idx();
            if self.lastlist[i] == self.listid {
                continue;
            }
            self.lastlist[i] = self.listid;
            self.nlist.push(s);

            let state = &nfa.states()[s];
            if let Some(anchor) = state.anchor()
                && !anchor.eval(at, origin, end)
            {
                continue;
            }
            // Reversed so the first epsilon edge is explored first.
            self.stack.extend(state.epsilon().iter().rev());
        }
    }

    /// Whether the closure built by the last `addstate` round contains the
    /// accept state.
    #[inline]
    fn accepting(&self) -> bool {
        self.lastlist[self.nfa.accept().idx()] == self.listid
    }

    /// Consume `c`; `at` is the offset just past it.
    fn step(&mut self, c: char, at: usize) {
        let nfa = self.nfa;
        self.nlist.clear();
        self.listid += 1;
        let clist = std::mem::take(self.clist);

        for &idx in &clist {
            let state = &nfa.states()[idx];
            if let Some(targets) = state.transitions().get(&c) {
                for &out in targets {
                    self.addstate(out, at);
                }
            }
            if let Some(edge) = state.class()
                && nfa.classes()[edge.class].matches(c)
            {
                self.addstate(edge.out, at);
            }
        }

        *self.clist = std::mem::replace(self.nlist, clist);
    }

    /// Run one attempt from byte offset `start` (which must lie on a char
    /// boundary) and return the end of the longest match, if any.
    pub fn longest_from(&mut self, start: usize) -> Option<usize> {
        self.origin = start;
        self.nlist.clear();
        self.listid += 1;
        self.addstate(self.nfa.start(), start);
        let mut best = self.accepting().then_some(start);
        std::mem::swap(self.clist, self.nlist);

        let text = self.text;
        for (offset, c) in text[start..].char_indices() {
            let at = start + offset + c.len_utf8();
            self.step(c, at);
            if self.clist.is_empty() {
                break;
            }
            if self.accepting() {
                best = Some(at);
            }
            log::trace!("attempt {}: {:?} -> {} active states", start, c, self.clist.len());
        }

        log::trace!("attempt {}: best end {:?}", start, best);
        best
    }

    /// Scan attempts from `pos` onward and return the first `(start, end)`
    /// found.  Offsets that are not char boundaries are skipped.
    pub fn find_from(&mut self, pos: usize) -> Option<(usize, usize)> {
        let text = self.text;
        (pos..=text.len())
            .filter(|&i| text.is_char_boundary(i))
            .find_map(|start| self.longest_from(start).map(|end| (start, end)))
    }
}
