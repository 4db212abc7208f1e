//! Pattern syntax tree and the recursive-descent parser that builds it.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! alternation := sequence ('|' sequence)*
//! sequence    := (atom quantifier?)*
//! quantifier  := '*' | '+' | '?' | '{' m (',' n?)? '}'
//! atom        := '(' ('?:')? alternation ')' | '[' class ']' | '^' | '$'
//!              | '.' | '\' escape | literal
//! ```
//!
//! Leading `^` / trailing `$` of a whole pattern are stripped by
//! [`Engine`](crate::Engine) before the parser runs; anchors that appear
//! anywhere else become [`Node::AnchorStart`] / [`Node::AnchorEnd`].

use std::collections::BTreeSet;

use crate::{ErrorKind, PatternError};

/// Characters that become an [`Node::EscapedLiteral`] when preceded by `\`.
const METACHARS: &[char] = &[
    '.', '^', '$', '*', '+', '?', '{', '}', '[', ']', '(', ')', '|', '\\',
];

/// Deepest group nesting the parser accepts; the same default as
/// `regex-syntax`.
pub const NEST_LIMIT: usize = 250;

/// A node in the pattern syntax tree.
///
/// Every node owns its children; the tree itself never shares or cycles.
/// Cycles only appear once the tree is lowered to an [`Nfa`](crate::Nfa).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A single literal character.
    Literal(char),
    /// A set test.  `positive == false` inverts membership, so the empty
    /// negative set (`.`) matches every character.
    CharacterClass {
        positive: bool,
        set: BTreeSet<char>,
    },
    /// `child{min,max}`; `max == None` is unbounded.
    Quantifier {
        child: Box<Node>,
        min: usize,
        max: Option<usize>,
    },
    /// `a|b|…`, two or more branches tried in order.  Kept flat so that a
    /// long run of `|` does not turn into a deep tree.
    Alternation(Vec<Node>),
    /// Implicit concatenation.  May be empty (matches the empty string).
    Sequence(Vec<Node>),
    /// `(...)` or `(?:...)`.  `index` is `None` for non-capturing groups.
    Group {
        children: Vec<Node>,
        index: Option<usize>,
    },
    /// `\N`.
    Backreference(usize),
    AnchorStart,
    AnchorEnd,
    /// A metacharacter or control character written with a backslash.
    EscapedLiteral(char),
}

impl Node {
    /// `.`
    pub fn any() -> Self {
        Node::CharacterClass {
            positive: false,
            set: BTreeSet::new(),
        }
    }
}

/// The predefined sets behind `\d`, `\w` and `\s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Perl {
    Digit,
    Word,
    Space,
}

impl Perl {
    fn from_escape(c: char) -> Option<(Self, bool)> {
        Some(match c {
            'd' => (Perl::Digit, true),
            'w' => (Perl::Word, true),
            's' => (Perl::Space, true),
            'D' => (Perl::Digit, false),
            'W' => (Perl::Word, false),
            'S' => (Perl::Space, false),
            _ => return None,
        })
    }

    pub(crate) fn chars(self) -> BTreeSet<char> {
        match self {
            Perl::Digit => ('0'..='9').collect(),
            Perl::Word => ('a'..='z')
                .chain('A'..='Z')
                .chain('0'..='9')
                .chain(std::iter::once('_'))
                .collect(),
            Perl::Space => [' ', '\t', '\n', '\r', '\x0b', '\x0c'].into_iter().collect(),
        }
    }
}

/// Control-character escapes accepted in addition to metacharacters.
fn control_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        _ => None,
    }
}

/// Parse `pattern` into a syntax tree.
pub fn parse(pattern: &str) -> Result<Node, PatternError> {
    Parser::new(pattern).parse()
}

/// Recursive-descent parser over the characters of one pattern.
///
/// Created per pattern and dropped once the tree is produced.  The
/// capturing-group counter is shared across the whole parse so that groups
/// are numbered by the position of their opening paren.
#[derive(Debug)]
pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    groups: usize,
    /// Groups currently open around the cursor.
    depth: usize,
}

impl Parser {
    pub fn new(pattern: &str) -> Self {
        Self {
            chars: pattern.chars().collect(),
            pos: 0,
            groups: 0,
            depth: 0,
        }
    }

    /// Number of capturing groups opened so far.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Parse the whole input.  Fails with [`ErrorKind::TrailingInput`] if
    /// anything is left over (e.g. an unbalanced `)`).
    pub fn parse(&mut self) -> Result<Node, PatternError> {
        let node = self.parse_alternation()?;
        if self.pos < self.chars.len() {
            return Err(self.error(ErrorKind::TrailingInput));
        }
        Ok(node)
    }

    // -- Cursor helpers -------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, kind: ErrorKind) -> PatternError {
        PatternError::new(kind, self.pos)
    }

    // -- Grammar --------------------------------------------------------------

    fn parse_alternation(&mut self) -> Result<Node, PatternError> {
        let first = self.parse_sequence()?;
        if self.peek() != Some('|') {
            return Ok(first);
        }
        let mut branches = vec![first];
        while self.peek() == Some('|') {
            self.bump();
            branches.push(self.parse_sequence()?);
        }
        Ok(Node::Alternation(branches))
    }

    fn parse_sequence(&mut self) -> Result<Node, PatternError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            items.push(self.parse_quantifier(atom)?);
        }
        if items.len() == 1
            && let Some(item) = items.pop()
        {
            return Ok(item);
        }
        Ok(Node::Sequence(items))
    }

    fn parse_atom(&mut self) -> Result<Node, PatternError> {
        let Some(c) = self.peek() else {
            return Err(self.error(ErrorKind::TrailingInput));
        };
        match c {
            '(' => self.parse_group(),
            '[' => self.parse_class(),
            '\\' => self.parse_escape(),
            '^' => {
                self.bump();
                Ok(Node::AnchorStart)
            }
            '$' => {
                self.bump();
                Ok(Node::AnchorEnd)
            }
            '.' => {
                self.bump();
                Ok(Node::any())
            }
            '*' | '+' | '?' | '{' => Err(self.error(ErrorKind::DanglingQuantifier)),
            _ => {
                self.bump();
                Ok(Node::Literal(c))
            }
        }
    }

    /// Wrap `atom` in at most one postfix quantifier.
    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, PatternError> {
        let (min, max) = match self.peek() {
            Some('*') => {
                self.bump();
                (0, None)
            }
            Some('+') => {
                self.bump();
                (1, None)
            }
            Some('?') => {
                self.bump();
                (0, Some(1))
            }
            Some('{') => self.parse_bounds()?,
            _ => return Ok(atom),
        };
        if matches!(self.peek(), Some('*' | '+' | '?' | '{')) {
            return Err(self.error(ErrorKind::DanglingQuantifier));
        }
        Ok(Node::Quantifier {
            child: Box::new(atom),
            min,
            max,
        })
    }

    /// `{m}`, `{m,}` or `{m,n}`; the cursor is on the `{`.
    fn parse_bounds(&mut self) -> Result<(usize, Option<usize>), PatternError> {
        let open = self.pos;
        self.bump();
        if self.peek().is_none() {
            return Err(PatternError::new(ErrorKind::UnterminatedRepetition, open));
        }
        let min = self
            .parse_number()
            .ok_or_else(|| self.error(ErrorKind::InvalidRepetition))?;
        let max = match self.bump() {
            Some('}') => return Ok((min, Some(min))),
            Some(',') => match self.peek() {
                Some('}') => None,
                None => return Err(PatternError::new(ErrorKind::UnterminatedRepetition, open)),
                Some(_) => Some(
                    self.parse_number()
                        .ok_or_else(|| self.error(ErrorKind::InvalidRepetition))?,
                ),
            },
            Some(_) => return Err(PatternError::new(ErrorKind::InvalidRepetition, open)),
            None => return Err(PatternError::new(ErrorKind::UnterminatedRepetition, open)),
        };
        if self.bump() != Some('}') {
            return Err(PatternError::new(ErrorKind::UnterminatedRepetition, open));
        }
        if max.is_some_and(|max| max < min) {
            return Err(PatternError::new(ErrorKind::InvalidRepetition, open));
        }
        Ok((min, max))
    }

    /// A run of ASCII digits, or `None` if there is none (or it overflows).
    fn parse_number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn parse_group(&mut self) -> Result<Node, PatternError> {
        let open = self.pos;
        if self.depth == NEST_LIMIT {
            return Err(self.error(ErrorKind::NestLimitExceeded(NEST_LIMIT)));
        }
        self.bump();
        let index = if self.peek() == Some('?') {
            if self.peek_at(1) != Some(':') {
                return Err(self.error(ErrorKind::UnsupportedGroup));
            }
            self.pos += 2;
            None
        } else {
            self.groups += 1;
            Some(self.groups)
        };
        self.depth += 1;
        let inner = self.parse_alternation()?;
        self.depth -= 1;
        if self.bump() != Some(')') {
            return Err(PatternError::new(ErrorKind::UnterminatedGroup, open));
        }
        let children = match inner {
            Node::Sequence(items) => items,
            node => vec![node],
        };
        Ok(Node::Group { children, index })
    }

    fn parse_class(&mut self) -> Result<Node, PatternError> {
        let open = self.pos;
        self.bump();
        let positive = if self.peek() == Some('^') {
            self.bump();
            false
        } else {
            true
        };

        let mut set = BTreeSet::new();
        let mut first = true;
        loop {
            let Some(c) = self.bump() else {
                return Err(PatternError::new(ErrorKind::UnterminatedClass, open));
            };
            let member = match c {
                ']' if !first => break,
                '\\' => match self.class_escape()? {
                    ClassMember::Char(c) => c,
                    ClassMember::Set(perl) => {
                        set.extend(perl.chars());
                        first = false;
                        continue;
                    }
                },
                c => c,
            };
            first = false;

            // `a-z`; a `-` right before the closing bracket is literal.
            if self.peek() == Some('-') && self.peek_at(1).is_some_and(|c| c != ']') {
                self.bump();
                let end = match self.bump() {
                    Some('\\') => match self.class_escape()? {
                        ClassMember::Char(c) => c,
                        ClassMember::Set(_) => {
                            return Err(self.error(ErrorKind::InvalidRange));
                        }
                    },
                    Some(c) => c,
                    None => return Err(PatternError::new(ErrorKind::UnterminatedClass, open)),
                };
                if end < member {
                    return Err(self.error(ErrorKind::InvalidRange));
                }
                set.extend(member..=end);
            } else {
                set.insert(member);
            }
        }
        Ok(Node::CharacterClass { positive, set })
    }

    /// Escape inside `[...]`; the backslash has been consumed.
    fn class_escape(&mut self) -> Result<ClassMember, PatternError> {
        let Some(c) = self.bump() else {
            return Err(self.error(ErrorKind::TrailingBackslash));
        };
        match Perl::from_escape(c) {
            Some((perl, true)) => Ok(ClassMember::Set(perl)),
            Some((_, false)) => Err(self.error(ErrorKind::UnsupportedClassEscape(c))),
            None if METACHARS.contains(&c) || c == '-' => Ok(ClassMember::Char(c)),
            None => control_escape(c)
                .map(ClassMember::Char)
                .ok_or_else(|| self.error(ErrorKind::UnknownEscape(c))),
        }
    }

    fn parse_escape(&mut self) -> Result<Node, PatternError> {
        self.bump();
        let Some(c) = self.peek() else {
            return Err(self.error(ErrorKind::TrailingBackslash));
        };
        if c.is_ascii_digit() {
            let at = self.pos;
            let n = self
                .parse_number()
                .ok_or_else(|| PatternError::new(ErrorKind::InvalidBackreference, at))?;
            if n == 0 || n > self.groups {
                return Err(PatternError::new(ErrorKind::InvalidBackreference, at));
            }
            return Ok(Node::Backreference(n));
        }
        self.bump();
        if let Some((perl, positive)) = Perl::from_escape(c) {
            return Ok(Node::CharacterClass {
                positive,
                set: perl.chars(),
            });
        }
        if METACHARS.contains(&c) {
            return Ok(Node::EscapedLiteral(c));
        }
        control_escape(c)
            .map(Node::EscapedLiteral)
            .ok_or_else(|| PatternError::new(ErrorKind::UnknownEscape(c), self.pos - 1))
    }
}

enum ClassMember {
    Char(char),
    Set(Perl),
}
