// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::ops::Range;

use crate::error::Error;
use crate::nfa::Slot;
use crate::program::{CompileOptions, Program};

/// A compiled regular expression.
///
/// Compile once with [`Regex::new`] (or [`Regex::with_options`]), then run
/// it against any number of inputs. Execution never mutates compile-time
/// state, so sharing a `Regex` across threads only needs the caller's own
/// synchronization around the transient per-call scratch.
#[derive(Clone, Debug)]
pub struct Regex {
    prog: Program,
}

impl Regex {
    /// Compile a pattern with the default options.
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        Regex::with_options(pattern, CompileOptions::default())
    }

    /// Compile a pattern with explicit options.
    pub fn with_options(pattern: &str, opts: CompileOptions) -> Result<Regex, Error> {
        Ok(Regex { prog: Program::new(pattern, opts)? })
    }

    /// True iff `pattern` would compile.
    pub fn is_valid(pattern: &str) -> bool {
        Program::new(pattern, CompileOptions::default()).is_ok()
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.prog.original
    }

    /// The number of capture groups, including the implicit whole-match
    /// group 0.
    pub fn group_count(&self) -> usize {
        self.prog.num_captures()
    }

    /// True iff the pattern matches `text` in its entirety.
    ///
    /// The call is anchored on both sides regardless of `^`/`$` in the
    /// pattern; use [`find`](Regex::find) for partial matching.
    pub fn test(&self, text: &str) -> Result<bool, Error> {
        let mut slots = self.prog.alloc_captures();
        self.prog.exec(&mut slots, text, 0, true, Some(text.len()))
    }

    /// The leftmost match in `text`, if any.
    pub fn find(&self, text: &str) -> Result<Option<Match>, Error> {
        self.find_at(text, 0)
    }

    /// The leftmost match in `text` at or after byte offset `start`.
    /// Anchors keep their meaning relative to the whole text.
    pub fn find_at(&self, text: &str, start: usize) -> Result<Option<Match>, Error> {
        if start > text.len() {
            return Ok(None);
        }
        let mut slots = self.prog.alloc_captures();
        if self.prog.exec(&mut slots, text, start, false, None)? {
            Ok(Some(Match::from_slots(&slots)))
        } else {
            Ok(None)
        }
    }

    /// A single-pass iterator over every non-overlapping match in `text`,
    /// in order of start position.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> Matches<'r, 't> {
        Matches { re: self, text, next_start: 0, done: false }
    }

    /// Every non-overlapping match, collected.
    pub fn find_all(&self, text: &str) -> Result<Vec<Match>, Error> {
        self.find_iter(text).collect()
    }

    /// Replace every non-overlapping match with `replacement`, literally.
    /// No `$k` expansion is performed.
    pub fn replace(&self, text: &str, replacement: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in self.find_iter(text) {
            let m = m?;
            out.push_str(&text[last..m.start()]);
            out.push_str(replacement);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl fmt::Display for Regex {
    /// Shows the original pattern.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single match: the span of group 0 plus one `(start, end)` pair per
/// capture group.
///
/// A `Match` owns only its offsets, never the searched text; pass the text
/// back in to [`Match::group_str`] to borrow the captured slices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    start: usize,
    end: usize,
    groups: Vec<Option<(usize, usize)>>,
}

impl Match {
    fn from_slots(slots: &[Slot]) -> Match {
        let groups: Vec<_> = slots
            .chunks(2)
            .map(|pair| match (pair[0], pair[1]) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            })
            .collect();
        let (start, end) = groups[0].expect("a match always has a whole-match span");
        Match { start, end, groups }
    }

    /// Byte offset where the match starts.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset one past the end of the match.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of groups, including group 0.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The span of capture group `i`, or `None` if the group did not
    /// participate in the match (or does not exist).
    pub fn group(&self, i: usize) -> Option<(usize, usize)> {
        self.groups.get(i).copied().flatten()
    }

    /// The text captured by group `i`, borrowed from the caller's
    /// haystack.
    pub fn group_str<'t>(&self, text: &'t str, i: usize) -> Option<&'t str> {
        self.group(i).map(|(s, e)| &text[s..e])
    }

    /// The whole matched slice.
    pub fn as_str<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// Iterator over non-overlapping matches, lazily advancing through the
/// text. Yields `Err` once and stops if execution trips a resource cap.
#[derive(Debug)]
pub struct Matches<'r, 't> {
    re: &'r Regex,
    text: &'t str,
    next_start: usize,
    done: bool,
}

impl<'r, 't> Iterator for Matches<'r, 't> {
    type Item = Result<Match, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_start > self.text.len() {
            return None;
        }
        match self.re.find_at(self.text, self.next_start) {
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some(m)) => {
                if m.end() > m.start() {
                    self.next_start = m.end();
                } else {
                    // A zero-width match advances at least one character,
                    // breaking out of empty-match loops.
                    self.next_start = next_char_boundary(self.text, m.end());
                }
                Some(Ok(m))
            }
        }
    }
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return pos + 1;
    }
    let mut next = pos + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }
    next
}

/// Return `text` with every regex metacharacter backslash-escaped, so the
/// result matches `text` literally.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_metacharacter(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_metacharacter(c: char) -> bool {
    matches!(
        c,
        '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
    )
}
