//! Regular expressions compiled to a Thompson NFA and matched by state-set
//! simulation.
//!
//! Based on Russ Cox's article <https://swtch.com/~rsc/regexp/regexp1.html>
//! (Thompson NFA construction and simulation), extended with character
//! classes, bounded repetitions (`{m}`, `{m,}`, `{m,n}`) and the zero-width
//! assertions `^` and `$`.
//!
//! # Architecture
//!
//! The pipeline is:
//!
//! ```text
//! pattern ──strip ^/$──> body ──ast::Parser──> Node ──NfaBuilder──> Nfa ──Matcher──> spans
//! ```
//!
//! * [`ast`] turns the pattern body into a [`Node`] tree and numbers the
//!   capturing groups by their opening paren.
//! * [`nfa`] lowers the tree into a flat arena of [`State`]s addressed by
//!   [`StateIdx`].  Each node becomes a *fragment* with one start and one
//!   end state, glued to its neighbours by epsilon edges.
//! * [`matcher`] runs the automaton over a `&str`, one start offset (an
//!   *attempt*) at a time, keeping the set of active states and recording
//!   the longest accepted end.
//! * [`Engine`] strings these together and implements `is_match`,
//!   `search`, `find_all`, `substitute` and `split` on top of attempts.
//!
//! ## Bounded repetition
//!
//! `body{m,n}` is lowered by copying: `m` mandatory copies of `body`
//! followed by `n - m` optional copies, each of which may bail out to the
//! end of the repetition.  `body{m,}` ends with a starred copy instead.
//! The upper bound is therefore enforced by the automaton's shape, and the
//! simulation needs no counters.
//!
//! ## Anchors
//!
//! A leading `^` and a trailing unescaped `$` are recorded on the [`Nfa`]
//! and compiled as anchor states around the body; anchors elsewhere in the
//! pattern become anchor states in place.  An anchor state only lets its
//! epsilon edges through during the epsilon closure when its condition
//! holds at the current offset:
//!
//! * `$` holds at the end of the text.
//! * `^` holds at the start offset of the running attempt, or only at
//!   offset 0 with [`EngineBuilder::strict_start_anchor`].
//!
//! ## Groups and backreferences
//!
//! Groups are tagged with their boundary and backreferences `\N` compile to
//! a pass-through epsilon edge carrying the group number.  Neither affects
//! which strings match: the engine recognises the regular subset only, and
//! every capture slot of a [`Match`] is `None`.
//!
//! # Example
//!
//! ```
//! use thompson_re::Engine;
//!
//! let engine = Engine::new(r"\d+").unwrap();
//! assert_eq!(engine.find_all("a1b22c333"), vec!["1", "22", "333"]);
//! assert_eq!(engine.substitute("#", "a1b22", 0), "a#b#");
//! assert_eq!(engine.split("1a22b", 0), vec!["", "a", "b"]);
//! ```

use std::fmt;

pub mod ast;
mod engine;
pub mod matcher;
pub mod nfa;

pub use ast::{NEST_LIMIT, Node, Parser, parse};
pub use engine::{Engine, EngineBuilder, Match, Matches};
pub use matcher::{Matcher, MatcherMemory};
pub use nfa::{
    Anchor, CharClass, ClassEdge, ClassIdx, DEFAULT_STATE_LIMIT, GroupBoundary, Nfa, NfaBuilder, State,
    StateIdx,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// What went wrong while compiling a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `[` without a closing `]`.
    UnterminatedClass,
    /// `(` without a closing `)`.
    UnterminatedGroup,
    /// `{` without a closing `}`.
    UnterminatedRepetition,
    /// Bounds that are not numbers, or `{m,n}` with `m > n`.
    InvalidRepetition,
    /// A class range whose end precedes its start, e.g. `[z-a]`.
    InvalidRange,
    /// `\N` with `N` zero or greater than the number of groups opened so
    /// far.
    InvalidBackreference,
    /// A quantifier with nothing to repeat, or directly after another
    /// quantifier.
    DanglingQuantifier,
    /// `\c` for a `c` that is neither a metacharacter nor a known escape.
    UnknownEscape(char),
    /// `\D`, `\W` or `\S` inside `[...]`.
    UnsupportedClassEscape(char),
    /// The pattern ends in a lone `\`.
    TrailingBackslash,
    /// `(?` followed by anything but `:`.
    UnsupportedGroup,
    /// Input left over after a complete pattern, such as an unmatched `)`.
    TrailingInput,
    /// Groups nested deeper than the given limit.
    NestLimitExceeded(usize),
    /// The compiled automaton would need more than the given number of
    /// states.  Reported at offset 0.
    TooLarge(usize),
    /// Rejected by the `regex-syntax` pre-check, with its description.
    Rejected(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedClass => f.write_str("unterminated character class"),
            Self::UnterminatedGroup => f.write_str("unterminated group"),
            Self::UnterminatedRepetition => f.write_str("unterminated repetition"),
            Self::InvalidRepetition => f.write_str("invalid repetition bounds"),
            Self::InvalidRange => f.write_str("invalid character class range"),
            Self::InvalidBackreference => f.write_str("invalid backreference"),
            Self::DanglingQuantifier => f.write_str("quantifier has nothing to repeat"),
            Self::UnknownEscape(c) => write!(f, "unknown escape sequence: \\{}", c),
            Self::UnsupportedClassEscape(c) => {
                write!(f, "escape \\{} is not supported inside a class", c)
            }
            Self::TrailingBackslash => f.write_str("trailing backslash"),
            Self::UnsupportedGroup => f.write_str("unsupported group syntax"),
            Self::TrailingInput => f.write_str("unexpected trailing input"),
            Self::NestLimitExceeded(limit) => {
                write!(f, "groups nested deeper than {}", limit)
            }
            Self::TooLarge(limit) => {
                write!(f, "compiled automaton exceeds the limit of {} states", limit)
            }
            Self::Rejected(reason) => write!(f, "rejected by syntax check: {}", reason),
        }
    }
}

/// An invalid pattern: the kind of problem and the character offset in the
/// pattern where it was detected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternError {
    kind: ErrorKind,
    offset: usize,
}

impl PatternError {
    pub(crate) fn new(kind: ErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// Move the offset `by` characters to the right, for errors found in a
    /// suffix of the original pattern.
    pub(crate) fn shifted(self, by: usize) -> Self {
        Self {
            offset: self.offset + by,
            ..self
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Offset in characters (not bytes) from the start of the pattern.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pattern at offset {}: {}", self.offset, self.kind)
    }
}

impl std::error::Error for PatternError {}
