use std::char;
use std::cmp::Ordering;
use std::fmt;

/// An inline representation of `Option<char>`.
///
/// This eliminates the need to branch on matching engine hot paths: the
/// sentinel value (`u32::MAX`, which is not a scalar value) stands for
/// "no character here", i.e. one past either end of the input.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Char(u32);

impl Char {
    /// The absent character, used just before the start and just after the
    /// end of the input.
    pub fn none() -> Char {
        Char(u32::MAX)
    }

    /// True iff this is the absent character.
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// The underlying scalar value, if present.
    pub fn as_char(self) -> Option<char> {
        char::from_u32(self.0)
    }

    /// The scalar value as a `u32`. Meaningless for the absent character.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Number of bytes this character occupies in UTF-8.
    ///
    /// The absent character has width 0.
    pub fn len_utf8(self) -> usize {
        self.as_char().map_or(0, |c| c.len_utf8())
    }

    /// True iff this is a word character: `[A-Za-z0-9_]`.
    pub fn is_word_char(self) -> bool {
        match self.as_char() {
            Some(c) => c == '_' || c.is_ascii_alphanumeric(),
            None => false,
        }
    }

    /// ASCII-only lowercase fold.
    pub fn to_ascii_lowercase(self) -> Char {
        match self.as_char() {
            Some(c) => Char(c.to_ascii_lowercase() as u32),
            None => self,
        }
    }
}

impl From<char> for Char {
    fn from(c: char) -> Char {
        Char(c as u32)
    }
}

impl From<Option<char>> for Char {
    fn from(c: Option<char>) -> Char {
        c.map_or(Char::none(), Char::from)
    }
}

impl PartialEq<char> for Char {
    fn eq(&self, other: &char) -> bool {
        self.0 == *other as u32
    }
}

impl PartialOrd<char> for Char {
    fn partial_cmp(&self, other: &char) -> Option<Ordering> {
        self.0.partial_cmp(&(*other as u32))
    }
}

impl fmt::Debug for Char {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_char() {
            Some(c) => write!(f, "{:?}", c),
            None => write!(f, "<none>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Char;

    #[test]
    fn word_chars() {
        assert!(Char::from('a').is_word_char());
        assert!(Char::from('_').is_word_char());
        assert!(Char::from('7').is_word_char());
        assert!(!Char::from(' ').is_word_char());
        assert!(!Char::none().is_word_char());
    }

    #[test]
    fn none_is_absent() {
        assert!(Char::none().is_none());
        assert_eq!(Char::none().len_utf8(), 0);
        assert!(!Char::from('x').is_none());
    }
}
