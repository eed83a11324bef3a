use crate::bitset::ClassSet;

/// Zero-width assertion kinds.
///
/// `^` and `$` parse to the anchor variants; whether they compile to the
/// text or the line form depends on the multiline flag, so the distinction
/// is deferred to the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assertion {
    /// `^`
    StartAnchor,
    /// `$`
    EndAnchor,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
}

/// Quantifier fork preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatKind {
    Greedy,
    Lazy,
    Possessive,
}

/// Lookaround polarity and direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookKind {
    Ahead,
    NegativeAhead,
    Behind,
    NegativeBehind,
}

/// The abstract syntax of a pattern.
///
/// The tree is owned top-down: every child is exclusively owned by its
/// parent and freed with it after code generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ast {
    /// Matches the empty string.
    Empty,
    /// A single literal character.
    Char(char),
    /// `.` — the generator decides whether newline is excluded.
    Dot,
    /// A character class as a Latin-1 bit table, possibly inverted.
    /// Shorthand classes are expanded into this form by the parser.
    Class { set: ClassSet, negated: bool },
    /// A zero-width assertion.
    Assertion(Assertion),
    /// Ordered concatenation. Never constructed with exactly one child.
    Concat(Vec<Ast>),
    /// `a|b`, right-leaning for `a|b|c`.
    Alternate(Box<Ast>, Box<Ast>),
    /// Any quantifier: `*` is `{0,}`, `+` is `{1,}`, `?` is `{0,1}`.
    Repeat { ast: Box<Ast>, min: u32, max: Option<u32>, kind: RepeatKind },
    /// A capturing group with its 1-based index.
    Group { ast: Box<Ast>, index: u8 },
    /// A lookaround assertion.
    Look { ast: Box<Ast>, kind: LookKind },
    /// `\1` … `\9`.
    Backref(u8),
}

impl Ast {
    /// Build the `\d` / `\w` / `\s` tables.
    pub fn digit_set() -> ClassSet {
        let mut set = ClassSet::new();
        set.insert_range(b'0', b'9');
        set
    }

    pub fn word_set() -> ClassSet {
        let mut set = ClassSet::new();
        set.insert_range(b'A', b'Z');
        set.insert_range(b'a', b'z');
        set.insert_range(b'0', b'9');
        set.insert(b'_');
        set
    }

    pub fn space_set() -> ClassSet {
        let mut set = ClassSet::new();
        for &b in b" \t\n\r\x0C\x0B" {
            set.insert(b);
        }
        set
    }
}
