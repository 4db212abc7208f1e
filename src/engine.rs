//! The public [`Engine`]: construction, configuration and the match / search
//! / find-all / substitute / split operations.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use regex_syntax::ast;

use crate::ast::Parser;
use crate::matcher::MatcherMemory;
use crate::nfa::{DEFAULT_STATE_LIMIT, Nfa, NfaBuilder};
use crate::{ErrorKind, PatternError};

/// Configures and builds an [`Engine`].
///
/// ```
/// use thompson_re::EngineBuilder;
///
/// let engine = EngineBuilder::new()
///     .strict_start_anchor(true)
///     .build("^ab")
///     .unwrap();
/// assert!(engine.search("xab").is_none());
/// ```
#[derive(Clone, Debug)]
pub struct EngineBuilder {
    syntax_check: bool,
    strict_start_anchor: bool,
    state_limit: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            syntax_check: true,
            strict_start_anchor: false,
            state_limit: DEFAULT_STATE_LIMIT,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the pattern through the `regex-syntax` parser before compiling
    /// it, rejecting anything that parser rejects (backreferences aside).
    /// Enabled by default.
    pub fn syntax_check(&mut self, yes: bool) -> &mut Self {
        self.syntax_check = yes;
        self
    }

    /// Make `^` hold only at offset 0 of the text.
    ///
    /// By default `^` holds at the start offset of every attempt, so an
    /// unanchored scan (`search`, `find_all`, …) can match `^a` in the
    /// middle of `"ba"`.
    pub fn strict_start_anchor(&mut self, yes: bool) -> &mut Self {
        self.strict_start_anchor = yes;
        self
    }

    /// Maximum number of NFA states a pattern may compile to; larger
    /// patterns fail with [`ErrorKind::TooLarge`].
    pub fn state_limit(&mut self, limit: usize) -> &mut Self {
        self.state_limit = limit;
        self
    }

    /// Compile `pattern`.
    ///
    /// A single leading `^` and a single trailing unescaped `$` are removed
    /// and recorded on the automaton; the rest goes through the parser.
    pub fn build(&self, pattern: &str) -> Result<Engine, PatternError> {
        if self.syntax_check {
            precheck(pattern)?;
        }

        let (body, anchored_start, anchored_end) = strip_anchors(pattern);
        let mut parser = Parser::new(body);
        let node = parser
            .parse()
            .map_err(|err| err.shifted(usize::from(anchored_start)))?;
        let nfa = NfaBuilder::default()
            .state_limit(self.state_limit)
            .build(&node, anchored_start, anchored_end, parser.groups())?;

        Ok(Engine {
            pattern: pattern.to_string(),
            nfa,
            strict_start_anchor: self.strict_start_anchor,
        })
    }
}

/// Independent well-formedness check backed by `regex-syntax`.
///
/// Backreferences are part of this engine's grammar, so the one verdict we
/// ignore is `UnsupportedBackreference`.
fn precheck(pattern: &str) -> Result<(), PatternError> {
    let err = match ast::parse::ParserBuilder::new().build().parse(pattern) {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };
    if matches!(err.kind(), ast::ErrorKind::UnsupportedBackreference) {
        return Ok(());
    }
    log::debug!("syntax check rejected {:?}: {}", pattern, err);
    let byte_offset = err.span().start.offset.min(pattern.len());
    let offset = pattern
        .get(..byte_offset)
        .map_or(0, |prefix| prefix.chars().count());
    Err(PatternError::new(
        ErrorKind::Rejected(err.kind().to_string()),
        offset,
    ))
}

/// Split off a leading `^` and a trailing `$` that is not itself escaped.
fn strip_anchors(pattern: &str) -> (&str, bool, bool) {
    let (body, anchored_start) = match pattern.strip_prefix('^') {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    match body.strip_suffix('$') {
        Some(rest) if rest.chars().rev().take_while(|&c| c == '\\').count() % 2 == 0 => {
            (rest, anchored_start, true)
        }
        _ => (body, anchored_start, false),
    }
}

/// A single match: the matched text, its byte range in the haystack and one
/// capture slot per capturing group.
///
/// Capture slots are part of the result shape but are never filled in by
/// the simulation; every slot is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<'t> {
    text: &'t str,
    start: usize,
    end: usize,
    groups: Vec<Option<(usize, usize)>>,
}

impl<'t> Match<'t> {
    pub fn as_str(&self) -> &'t str {
        self.text
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Capture slots, one per capturing group, each a byte span.
    pub fn groups(&self) -> &[Option<(usize, usize)>] {
        &self.groups
    }
}

/// A compiled pattern.
///
/// The automaton is built once and shared read-only by every call; each
/// call allocates its own working sets, so an `Engine` can be used from
/// several threads at once.
#[derive(Debug)]
pub struct Engine {
    pattern: String,
    nfa: Nfa,
    strict_start_anchor: bool,
}

impl Engine {
    /// Compile `pattern` with the default configuration.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        EngineBuilder::new().build(pattern)
    }

    /// The pattern this engine was built from.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn captures_len(&self) -> usize {
        self.nfa.captures_len()
    }

    fn new_match<'t>(&self, text: &'t str, (start, end): (usize, usize)) -> Match<'t> {
        Match {
            text: &text[start..end],
            start,
            end,
            groups: vec![None; self.nfa.captures_len()],
        }
    }

    /// Whether the whole of `text` matches.
    pub fn is_match(&self, text: &str) -> bool {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(&self.nfa, text, self.strict_start_anchor);
        matcher.longest_from(0) == Some(text.len())
    }

    /// The longest match starting at the first offset where any match
    /// starts.
    pub fn search<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.find_first_match(text, 0)
    }

    /// Like [`search`](Self::search), but only tries start offsets `>= pos`.
    pub fn find_first_match<'t>(&self, text: &'t str, pos: usize) -> Option<Match<'t>> {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(&self.nfa, text, self.strict_start_anchor);
        matcher.find_from(pos).map(|span| self.new_match(text, span))
    }

    /// Iterate over the matches behind [`find_all`](Self::find_all), resuming
    /// at the end of each one.  An empty match is yielded as such and the
    /// scan resumes one character further on; like `find_all`, the scan
    /// stops at the end of the text.
    pub fn find_iter<'e, 't>(&'e self, text: &'t str) -> Matches<'e, 't> {
        Matches {
            engine: self,
            text,
            cursor: 0,
            memory: MatcherMemory::default(),
        }
    }

    /// Every found substring, left to right.
    ///
    /// An empty match stands in for the single character at its position,
    /// so the output still walks across text the pattern cannot consume.
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(&self.nfa, text, self.strict_start_anchor);
        let mut found = Vec::new();
        let mut cursor = 0;
        while cursor < text.len() {
            let Some((start, end)) = matcher.find_from(cursor) else {
                break;
            };
            if start == end {
                let Some(next) = next_boundary(text, start) else {
                    break;
                };
                found.push(&text[start..next]);
                cursor = next;
            } else {
                found.push(&text[start..end]);
                cursor = end;
            }
        }
        found
    }

    /// Replace non-empty matches with `replacement`, at most `count` times
    /// (`0` means no limit).  Empty matches leave the text untouched.
    pub fn substitute(&self, replacement: &str, text: &str, count: usize) -> String {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(&self.nfa, text, self.strict_start_anchor);
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut replaced = 0;
        while cursor < text.len() && (count == 0 || replaced < count) {
            let Some((start, end)) = matcher.find_from(cursor) else {
                break;
            };
            out.push_str(&text[cursor..start]);
            cursor = start;
            if start == end {
                let Some(next) = next_boundary(text, start) else {
                    break;
                };
                out.push_str(&text[start..next]);
                cursor = next;
            } else {
                out.push_str(replacement);
                replaced += 1;
                cursor = end;
            }
        }
        out.push_str(&text[cursor..]);
        log::debug!("substitute: {} replacement(s) in {} bytes", replaced, text.len());
        out
    }

    /// Split `text` around non-empty matches, at most `maxsplit` times
    /// (`0` means no limit).  The remainder is always the last piece.
    pub fn split<'t>(&self, text: &'t str, maxsplit: usize) -> Vec<&'t str> {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(&self.nfa, text, self.strict_start_anchor);
        let mut pieces = Vec::new();
        let mut last = 0;
        let mut cursor = 0;
        while cursor < text.len() && (maxsplit == 0 || pieces.len() < maxsplit) {
            let Some((start, end)) = matcher.find_from(cursor) else {
                break;
            };
            if start == end {
                let Some(next) = next_boundary(text, start) else {
                    break;
                };
                cursor = next;
                continue;
            }
            pieces.push(&text[last..start]);
            last = end;
            cursor = end;
        }
        pieces.push(&text[last..]);
        pieces
    }
}

/// Offset just past the character starting at `at`, if there is one.
fn next_boundary(text: &str, at: usize) -> Option<usize> {
    text[at..].chars().next().map(|c| at + c.len_utf8())
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl FromStr for Engine {
    type Err = PatternError;

    fn from_str(pattern: &str) -> Result<Self, PatternError> {
        Engine::new(pattern)
    }
}

/// Iterator returned by [`Engine::find_iter`].
#[derive(Debug)]
pub struct Matches<'e, 't> {
    engine: &'e Engine,
    text: &'t str,
    cursor: usize,
    memory: MatcherMemory,
}

impl<'e, 't> Iterator for Matches<'e, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        let engine = self.engine;
        let text = self.text;
        if self.cursor >= text.len() {
            return None;
        }
        let mut matcher = self
            .memory
            .matcher(&engine.nfa, text, engine.strict_start_anchor);
        let found = matcher.find_from(self.cursor);
        // Same stopping rule as `find_all`: nothing found, or an empty
        // match at the very end of the text.
        let (start, end) = match found {
            Some((start, end)) if start < text.len() || start < end => (start, end),
            _ => {
                self.cursor = text.len();
                return None;
            }
        };
        self.cursor = if start == end {
            next_boundary(text, start).unwrap_or(text.len())
        } else {
            end
        };
        Some(engine.new_match(text, (start, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use proptest::prelude::*;

    fn engine(pattern: &str) -> Engine {
        Engine::new(pattern).expect("pattern should compile")
    }

    fn unchecked(pattern: &str) -> Engine {
        EngineBuilder::new()
            .syntax_check(false)
            .build(pattern)
            .expect("pattern should compile")
    }

    fn unchecked_err(pattern: &str) -> PatternError {
        EngineBuilder::new()
            .syntax_check(false)
            .build(pattern)
            .expect_err("pattern should be rejected")
    }

    /// Assert that our full-match result agrees with the `regex` crate on
    /// `input`.
    ///
    /// The oracle pattern is `^(?s:PATTERN)$`: full match on our side is
    /// language membership, which both engines must agree on for the
    /// shared syntax.  Inputs are expected to be ASCII, where the `regex`
    /// crate's Unicode-aware `\w`, `\d` and `\s` coincide with ours.
    fn assert_matches_regex_crate(pattern: &str, engine: &Engine, input: &str) {
        let full = format!("^(?s:{})$", pattern);
        let re = regex::Regex::new(&full).expect("regex crate should parse pattern");
        let expected = re.is_match(input);
        let actual = engine.is_match(input);
        assert_eq!(
            actual, expected,
            "mismatch for pattern `{}` on input {:?}: ours={}, regex crate={}",
            pattern, input, actual, expected
        );
    }

    /// Every string over `alphabet` of length `0..=max_len`.
    fn all_strings(alphabet: &str, max_len: usize) -> Vec<String> {
        let mut out = vec![String::new()];
        for len in 1..=max_len {
            out.extend(
                std::iter::repeat(alphabet.chars())
                    .take(len)
                    .multi_cartesian_product()
                    .map(|chars| chars.into_iter().collect::<String>()),
            );
        }
        out
    }

    #[test]
    fn test_literal() {
        assert!(engine("a").is_match("a"));
        assert!(!engine("a").is_match("b"));
        assert!(!engine("a").is_match("aa"));
        assert!(!engine("a").is_match(""));
    }

    #[test]
    fn test_character_class() {
        assert!(engine("[a-z]").is_match("c"));
        assert!(!engine("[a-z]").is_match("2"));
        assert!(engine("[^0-9]").is_match("a"));
        assert!(!engine("[^0-9]").is_match("5"));
    }

    #[test]
    fn test_quantifiers() {
        assert!(engine("a*").is_match(""));
        assert!(engine("a*").is_match("aaaaa"));
        assert!(!engine("a+").is_match(""));
        assert!(engine("a+").is_match("aaa"));
        assert!(engine("ab?c").is_match("ac"));
        assert!(engine("ab?c").is_match("abc"));
        assert!(!engine("ab?c").is_match("abbc"));
    }

    #[test]
    fn test_bounded_repetition_honours_upper_bound() {
        let e = engine("a{2,3}");
        assert!(!e.is_match("a"));
        assert!(e.is_match("aa"));
        assert!(e.is_match("aaa"));
        assert!(!e.is_match("aaaa"));

        let e = engine("(ab){2}");
        assert!(e.is_match("abab"));
        assert!(!e.is_match("ababab"));

        let e = engine("x{0}y");
        assert!(e.is_match("y"));
        assert!(!e.is_match("xy"));
    }

    #[test]
    fn test_unbounded_repetition() {
        let e = engine("a{2,}");
        assert!(!e.is_match("a"));
        assert!(e.is_match("aa"));
        assert!(e.is_match("aaaaaaa"));
    }

    #[test]
    fn test_anchors() {
        assert!(engine("^start.*end$").is_match("start middle end"));
        assert!(!engine("^a+$").is_match("aaab"));
        assert!(engine("^a+$").is_match("aaa"));
    }

    #[test]
    fn test_escaped_dollar_is_not_an_anchor() {
        let e = engine(r"cost\$");
        assert!(!e.nfa().anchored_end());
        assert!(e.is_match("cost$"));
        assert_eq!(e.search("the cost$ is").map(|m| m.range()), Some(4..9));

        let e = engine(r"a\\$");
        assert!(e.nfa().anchored_end());
        assert!(e.is_match(r"a\"));
    }

    #[test]
    fn test_search() {
        let e = engine("world");
        let m = e.search("hello world!").expect("should find world");
        assert_eq!(m.as_str(), "world");
        assert_eq!(m.start(), 6);
        assert_eq!(m.end(), 11);
        assert!(m.groups().is_empty());
        assert!(e.search("hello there").is_none());
    }

    #[test]
    fn test_search_time_of_day() {
        let e = engine(r"(?:[01]\d|2[0-3]):[0-5]\d");
        let m = e.search("The meeting is at 14:45.").expect("should find a time");
        assert_eq!(m.as_str(), "14:45");
        assert!(m.groups().is_empty());
    }

    #[test]
    fn test_full_match_time_of_day() {
        let e = engine(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d$");
        assert!(e.is_match("23:59:59"));
        assert!(e.is_match("00:00:00"));
        assert!(!e.is_match("24:00:00"));
        assert!(!e.is_match("12:60:00"));
    }

    #[test]
    fn test_search_json_pair() {
        let e = engine(r#""\w+":\s*("[^"]*"|\d+)"#);
        assert!(!e.is_match(""));
        let m = e.search(r#"{"key": "value"}"#).expect("should find pair");
        assert_eq!(m.as_str(), r#""key": "value""#);
        let m = e.search(r#"{"n":42}"#).expect("should find pair");
        assert_eq!(m.as_str(), r#""n":42"#);
    }

    #[test]
    fn test_capture_slots_have_fixed_shape() {
        let e = engine("(a)(b(c))");
        assert_eq!(e.captures_len(), 3);
        let m = e.search("xabc").expect("should match");
        assert_eq!(m.groups(), &[None, None, None]);
    }

    #[test]
    fn test_search_prefers_earliest_start_then_longest() {
        let e = engine("a+|b");
        let m = e.search("xbaaa").unwrap();
        assert_eq!(m.range(), 1..2);
        let m = e.search("xaaab").unwrap();
        assert_eq!(m.range(), 1..4);
    }

    #[test]
    fn test_search_empty_match() {
        let m = engine("a*").search("").expect("empty match");
        assert_eq!(m.range(), 0..0);
        assert!(m.is_empty());
        let m = engine("a*").search("bbb").expect("empty match");
        assert_eq!(m.range(), 0..0);
    }

    #[test]
    fn test_find_first_match() {
        let e = engine("ab");
        assert_eq!(e.find_first_match("abxab", 0).map(|m| m.start()), Some(0));
        assert_eq!(e.find_first_match("abxab", 1).map(|m| m.start()), Some(3));
        assert!(e.find_first_match("abxab", 4).is_none());
        assert!(e.find_first_match("abxab", 99).is_none());
    }

    /// `^` is pinned to each attempt's start unless strict mode is on.
    #[test]
    fn test_start_anchor_per_attempt() {
        let e = engine("^a");
        assert_eq!(e.search("ba").map(|m| m.range()), Some(1..2));
        assert_eq!(e.find_all("bab"), vec!["a"]);
        assert_eq!(e.substitute("-", "bab", 0), "b-b");

        let strict = EngineBuilder::new()
            .strict_start_anchor(true)
            .build("^a")
            .unwrap();
        assert!(strict.search("ba").is_none());
        assert_eq!(strict.search("ab").map(|m| m.range()), Some(0..1));
        assert!(strict.is_match("a"));
    }

    #[test]
    fn test_find_all() {
        assert_eq!(engine(r"\d+").find_all("a1b22c333"), vec!["1", "22", "333"]);
        assert_eq!(engine("x").find_all("abc"), Vec::<&str>::new());
        assert!(engine("x").find_all("").is_empty());
    }

    /// A zero-length match emits the character under the cursor.
    #[test]
    fn test_find_all_zero_length() {
        assert_eq!(engine("a*").find_all("bab"), vec!["b", "a", "b"]);
        assert_eq!(engine("x*").find_all("é!"), vec!["é", "!"]);
    }

    #[test]
    fn test_find_iter() {
        let e = engine(r"\d+");
        let spans: Vec<_> = e.find_iter("a1b22c").map(|m| m.range()).collect();
        assert_eq!(spans, vec![1..2, 3..5]);

        let e = engine("a*");
        let spans: Vec<_> = e.find_iter("ba").map(|m| m.range()).collect();
        assert_eq!(spans, vec![0..0, 1..2]);
        assert_eq!(e.find_all("ba"), vec!["b", "a"]);
        assert_eq!(e.find_iter("").count(), 0);
        assert!(e.find_all("").is_empty());
    }

    /// `find_iter` visits the same positions as `find_all`: each yielded
    /// match starts where `find_all` emitted a piece.
    #[test]
    fn test_find_iter_follows_find_all() {
        for (pattern, text) in [("a*", "baab"), ("$", "abc"), ("x*", "é!"), (r"\d+", "a1b22")] {
            let e = engine(pattern);
            let base = text.as_ptr() as usize;
            let from_all: Vec<_> = e
                .find_all(text)
                .iter()
                .map(|piece| piece.as_ptr() as usize - base)
                .collect();
            let from_iter: Vec<_> = e.find_iter(text).map(|m| m.start()).collect();
            assert_eq!(from_iter, from_all, "pattern {:?} on {:?}", pattern, text);
        }
    }

    #[test]
    fn test_substitute() {
        assert_eq!(engine("hello").substitute("hi", "hello there", 0), "hi there");
        assert_eq!(
            engine(r"\d+").substitute("num", "There are 2 apples and 3 oranges", 0),
            "There are num apples and num oranges"
        );
        assert_eq!(engine("cat").substitute("dog", "cat cat cat", 2), "dog dog cat");
        assert_eq!(engine("x").substitute("y", "abc", 0), "abc");
        assert_eq!(engine("x").substitute("y", "", 0), "");
    }

    #[test]
    fn test_substitute_zero_length_copies_text() {
        assert_eq!(engine("a*").substitute("-", "baab", 0), "b-b");
        assert_eq!(engine("z*").substitute("-", "héllo", 0), "héllo");
    }

    #[test]
    fn test_split() {
        assert_eq!(engine(r",\s*").split("a, b, c", 0), vec!["a", "b", "c"]);
        assert_eq!(
            engine(r"\s+").split("hello   world  program", 0),
            vec!["hello", "world", "program"]
        );
        assert_eq!(engine(",").split("abc", 0), vec!["abc"]);
        assert_eq!(engine(",").split("", 0), vec![""]);
        assert_eq!(engine(",").split(",a,", 0), vec!["", "a", ""]);
    }

    #[test]
    fn test_split_maxsplit() {
        assert_eq!(engine(",").split("a,b,c,d", 2), vec!["a", "b", "c,d"]);
        assert_eq!(engine(",").split("a,b", 5), vec!["a", "b"]);
    }

    /// Patterns that only ever match empty must not loop.
    #[test]
    fn test_split_zero_width_terminates() {
        assert_eq!(engine("x*").split("abc", 0), vec!["abc"]);
        assert_eq!(engine("a|").split("banana", 0), vec!["b", "n", "n", ""]);
        assert_eq!(engine("").split("abc", 0), vec!["abc"]);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(Engine::new("[invalid").is_err());
        assert!(Engine::new(r"\q").is_err());
        assert!(Engine::new("(ab").is_err());
        assert!(Engine::new("a{2").is_err());
        assert!(Engine::new("ab)").is_err());
        assert!(Engine::new("*").is_err());
    }

    #[test]
    fn test_syntax_check_reports_rejections() {
        let err = Engine::new(r"ab\q").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
        assert_eq!(err.offset(), 2);

        let err = unchecked_err(r"ab\q");
        assert_eq!(err.kind(), &ErrorKind::UnknownEscape('q'));
        assert_eq!(err.offset(), 3);
    }

    /// `[` is an ordinary class member here, while `regex-syntax` reads it
    /// as the start of a nested class.
    #[test]
    fn test_disabled_syntax_check_uses_own_grammar() {
        assert!(matches!(
            Engine::new("[[]").unwrap_err().kind(),
            ErrorKind::Rejected(_)
        ));
        let e = unchecked("[[]");
        assert!(e.is_match("["));
        assert!(!e.is_match("]"));
    }

    #[test]
    fn test_long_alternation_compiles_and_matches() {
        let pattern = format!("{}b", "a|".repeat(50_000));
        let e = engine(&pattern);
        assert!(e.is_match("a"));
        assert!(e.is_match("b"));
        assert!(!e.is_match("ab"));
        assert_eq!(e.find_all("xbx"), vec!["b"]);

        let e = unchecked(&pattern);
        assert!(e.is_match("b"));
    }

    #[test]
    fn test_oversized_repetition_is_an_error() {
        let err = Engine::new("((a{1000}){1000}){1000}").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TooLarge(DEFAULT_STATE_LIMIT));

        let err = EngineBuilder::new().state_limit(100).build("a{60}").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TooLarge(100));
        assert!(EngineBuilder::new().state_limit(200).build("a{60}").is_ok());
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let deep = format!("{}a{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(Engine::new(&deep).is_err());
        let err = unchecked_err(&deep);
        assert_eq!(err.kind(), &ErrorKind::NestLimitExceeded(crate::ast::NEST_LIMIT));
    }

    /// `regex-syntax` accepts `(?i)`, our grammar does not.
    #[test]
    fn test_both_checks_must_pass() {
        let err = Engine::new("(?i)a").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedGroup);
    }

    #[test]
    fn test_error_offset_accounts_for_stripped_anchor() {
        let err = unchecked_err(r"^ab\q");
        assert_eq!(err.offset(), 4);
    }

    /// Backreferences parse and compile, but are not checked against the
    /// captured text.
    #[test]
    fn test_backreference_is_pass_through() {
        let e = engine(r"(a)\1b");
        assert!(e.is_match("ab"));
        assert!(!e.is_match("aab"));
        assert!(Engine::new(r"\1").is_err());
    }

    #[test]
    fn test_mid_pattern_anchors() {
        assert!(!engine("a^b").is_match("ab"));
        assert!(engine("(^a|b)c").is_match("ac"));
        assert!(engine("a(b$|c)").is_match("ab"));
        assert!(!engine("a$b").is_match("ab"));
    }

    #[test]
    fn test_pattern_of_only_anchors() {
        let e = engine("^$");
        assert!(e.is_match(""));
        assert!(!e.is_match("a"));
        let e = engine("$");
        assert!(e.is_match(""));
        assert_eq!(e.search("abc").map(|m| m.range()), Some(3..3));
    }

    #[test]
    fn test_control_escapes() {
        let e = engine(r"a\tb\n");
        assert!(e.is_match("a\tb\n"));
        assert_eq!(engine(r"[\t ]+").split("a \t b", 0), vec!["a", "b"]);
    }

    #[test]
    fn test_unicode_code_points() {
        let e = engine("[à-ä]+");
        assert!(e.is_match("àâä"));
        let m = engine("b.").search("aébé").unwrap();
        assert_eq!(m.as_str(), "bé");
        assert_eq!(m.range(), 3..6);
    }

    #[test]
    fn test_display_and_from_str() {
        let e: Engine = "a|b".parse().unwrap();
        assert_eq!(e.to_string(), "a|b");
        assert_eq!(e.as_str(), "a|b");
        assert!("(".parse::<Engine>().is_err());
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();

        let e = engine(r"\w+");
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let e = &e;
                    s.spawn(move || e.find_all(&format!("t{} x y", i)).len())
                })
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), 3);
            }
        });
    }

    /// Exhaustive cross-check against the `regex` crate over short inputs.
    #[test]
    fn test_cross_validate_exhaustive() {
        let patterns = [
            "(a|b)*abb",
            "a{2,3}",
            "(ab){1,2}b?",
            "a*b+a?",
            "(a|ab)(c|bcd)?",
            "[ab]{0,2}c",
            "((a|b)c)+",
            "(a*)*b",
            ".a.",
            "[^a]*a",
            "(|a)b",
            "a{1,}c*",
        ];
        let inputs = all_strings("abc", 5);
        for pattern in patterns {
            let e = engine(pattern);
            for input in &inputs {
                assert_matches_regex_crate(pattern, &e, input);
            }
        }
    }

    #[test]
    fn test_cross_validate_classes() {
        let cases: &[(&str, &[&str])] = &[
            (r"\d+", &["", "0", "123", "12a", "a"]),
            (r"\w+", &["abc_123", "a-b", "", "Z"]),
            (r"\s*x\s*", &["x", "  x\t", "\nx\n", "x y"]),
            (r"\D\W\S", &["a!b", "1!b", "a b", "a!!"]),
            (r"[a-cx-z]+", &["abcxyz", "abd", "zzz"]),
            (r"[]a]+", &["]a]", "a", "b"]),
            (r"[.]", &[".", "a"]),
            (r"\.\*\+\?\(\)\[\]\{\}\|", &[".*+?()[]{}|", "x"]),
        ];
        for (pattern, inputs) in cases {
            let e = engine(pattern);
            for input in *inputs {
                assert_matches_regex_crate(pattern, &e, input);
            }
        }
    }

    const PATTERNS: &[&str] = &[
        "a", "ab", "a+b", "(a|b)a", "[ab]{2,3}", "b*a", ",\\s*", "a(b|,)?", " +",
    ];

    proptest! {
        #[test]
        fn prop_is_match_agrees_with_search_at_zero(
            pattern in prop::sample::select(PATTERNS),
            text in "[ab, ]{0,10}",
        ) {
            let e = engine(pattern);
            let at_zero = matches!(
                e.search(&text),
                Some(m) if m.start() == 0 && m.end() == text.len()
            );
            prop_assert_eq!(e.is_match(&text), at_zero);
        }

        #[test]
        fn prop_compiling_twice_accepts_same_language(
            pattern in prop::sample::select(PATTERNS),
            text in "[ab, ]{0,10}",
        ) {
            let first = engine(pattern);
            let second = engine(pattern);
            prop_assert_eq!(first.is_match(&text), second.is_match(&text));
            prop_assert_eq!(
                first.search(&text).map(|m| m.range()),
                second.search(&text).map(|m| m.range())
            );
        }

        #[test]
        fn prop_find_all_reconstructs_text(
            pattern in prop::sample::select(PATTERNS),
            text in "[ab, é]{0,12}",
        ) {
            let e = engine(pattern);
            let base = text.as_ptr() as usize;
            let mut rebuilt = String::new();
            let mut cursor = 0;
            for piece in e.find_all(&text) {
                let start = piece.as_ptr() as usize - base;
                prop_assert!(start >= cursor);
                rebuilt.push_str(&text[cursor..start]);
                rebuilt.push_str(piece);
                cursor = start + piece.len();
            }
            rebuilt.push_str(&text[cursor..]);
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn prop_substitute_leaves_no_occurrence(
            pattern in prop::sample::select(PATTERNS),
            text in "[ab, ]{0,12}",
        ) {
            let e = engine(pattern);
            let replaced = e.substitute("#", &text, 0);
            prop_assert!(e.search(&replaced).is_none(), "{:?} -> {:?}", text, replaced);
        }

        #[test]
        fn prop_split_pieces_and_matches_rebuild_text(
            pattern in prop::sample::select(PATTERNS),
            text in "[ab, ]{0,12}",
        ) {
            let e = engine(pattern);
            let pieces = e.split(&text, 0);
            prop_assert!(!pieces.is_empty());
            let joined: usize = pieces.iter().map(|p| p.len()).sum();
            prop_assert!(joined <= text.len());
            prop_assert!(text.starts_with(pieces[0]));
            prop_assert!(text.ends_with(pieces[pieces.len() - 1]));
        }

        #[test]
        fn prop_zero_width_split_is_identity(text in "[ab, é]{0,12}") {
            let e = engine("x*");
            prop_assert_eq!(e.split(&text, 0), vec![text.as_str()]);
            prop_assert_eq!(e.substitute("-", &text, 0), text.clone());
        }
    }
}
