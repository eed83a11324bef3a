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

use aho_corasick::{AhoCorasick, MatchKind};
use memchr::memchr;

use crate::inst::{Inst, SplitKind};

const NUM_PREFIX_LIMIT: usize = 30;
const PREFIX_LENGTH_LIMIT: usize = 15;

/// Literal prefixes required by every path through a program.
///
/// When every match must start with one of a small set of literals, the
/// search loop can skip the input forward to the next candidate instead of
/// seeding a VM thread at every position.
pub struct AlternateLiterals {
    literals: Vec<Vec<u8>>,
}

impl AlternateLiterals {
    pub fn into_matcher(self) -> Literals {
        let matcher = match self.literals.len() {
            0 => LiteralMatcher::Empty,
            1 => {
                let lit = self.literals.into_iter().next().unwrap();
                if lit.len() == 1 {
                    LiteralMatcher::Byte(lit[0])
                } else {
                    LiteralMatcher::Single(lit)
                }
            }
            _ => {
                match AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostFirst)
                    .build(&self.literals)
                {
                    Ok(ac) => LiteralMatcher::Automaton(Box::new(ac)),
                    Err(_) => LiteralMatcher::Empty,
                }
            }
        };
        Literals { matcher }
    }
}

/// Extracts the required literal prefixes from an instruction list.
///
/// A prefix is only usable when it is *required*: every path from the
/// program entry must begin by matching one of the collected literals. Any
/// path that opens with a class, an assertion or an optional construct
/// abandons the extraction entirely.
pub struct BuildPrefixes<'a> {
    insts: &'a [Inst],
}

impl<'a> BuildPrefixes<'a> {
    pub fn new(insts: &'a [Inst]) -> BuildPrefixes<'a> {
        BuildPrefixes { insts }
    }

    pub fn literals(self) -> AlternateLiterals {
        let literals = self.alternates(0, 0).unwrap_or_default();
        AlternateLiterals { literals }
    }

    /// Walk forward from `pc` collecting one literal per alternation path.
    /// Returns `None` when the path's prefix is not a required literal.
    fn alternates(&self, mut pc: usize, depth: usize) -> Option<Vec<Vec<u8>>> {
        if depth > 4 {
            return None;
        }
        let mut lit = vec![];
        // Bounded linear walk; branch-free instruction chains cannot be
        // longer than the program.
        for _ in 0..self.insts.len() {
            match self.insts[pc] {
                Inst::SaveStart(_) | Inst::SaveEnd(_) => pc += 1,
                Inst::Char(b) => {
                    lit.push(b);
                    if lit.len() >= PREFIX_LENGTH_LIMIT {
                        return Some(vec![lit]);
                    }
                    pc += 1;
                }
                Inst::Char32(c) => {
                    let mut buf = [0u8; 4];
                    lit.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    if lit.len() >= PREFIX_LENGTH_LIMIT {
                        return Some(vec![lit]);
                    }
                    pc += 1;
                }
                Inst::Goto(target) => pc = target,
                Inst::Split { kind: SplitKind::Plain, goto1, goto2 } => {
                    if !lit.is_empty() {
                        // A literal head is already required; the split's
                        // alternatives only refine what follows it.
                        return Some(vec![lit]);
                    }
                    let mut alts = self.alternates(goto1, depth + 1)?;
                    alts.extend(self.alternates(goto2, depth + 1)?);
                    if alts.len() > NUM_PREFIX_LIMIT {
                        return None;
                    }
                    return Some(alts);
                }
                // Classes, assertions, quantifier splits, lookarounds: the
                // path no longer starts with a required literal.
                _ => {
                    return if lit.is_empty() { None } else { Some(vec![lit]) };
                }
            }
        }
        None
    }
}

/// A compiled prefix scanner.
pub struct Literals {
    matcher: LiteralMatcher,
}

enum LiteralMatcher {
    /// No prefixes extracted; scanning is disabled.
    Empty,
    /// One single-byte literal, found with `memchr`.
    Byte(u8),
    /// One multi-byte literal, found with a `memchr`-seeded compare loop.
    Single(Vec<u8>),
    /// Several alternate literals, found with an Aho-Corasick automaton.
    Automaton(Box<AhoCorasick>),
}

impl Literals {
    pub fn empty() -> Literals {
        Literals { matcher: LiteralMatcher::Empty }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.matcher, LiteralMatcher::Empty)
    }

    /// Find the first occurrence of any prefix literal in `haystack`,
    /// returning its byte span.
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match self.matcher {
            LiteralMatcher::Empty => None,
            LiteralMatcher::Byte(b) => memchr(b, haystack).map(|i| (i, i + 1)),
            LiteralMatcher::Single(ref lit) => find_single(lit, haystack),
            LiteralMatcher::Automaton(ref ac) => {
                ac.find(haystack).map(|m| (m.start(), m.end()))
            }
        }
    }
}

fn find_single(lit: &[u8], haystack: &[u8]) -> Option<(usize, usize)> {
    let mut offset = 0;
    while let Some(i) = memchr(lit[0], &haystack[offset..]) {
        let start = offset + i;
        let end = start + lit.len();
        if end > haystack.len() {
            return None;
        }
        if &haystack[start..end] == lit {
            return Some((start, end));
        }
        offset = start + 1;
    }
    None
}

impl Clone for Literals {
    fn clone(&self) -> Literals {
        let matcher = match self.matcher {
            LiteralMatcher::Empty => LiteralMatcher::Empty,
            LiteralMatcher::Byte(b) => LiteralMatcher::Byte(b),
            LiteralMatcher::Single(ref lit) => LiteralMatcher::Single(lit.clone()),
            LiteralMatcher::Automaton(ref ac) => LiteralMatcher::Automaton(ac.clone()),
        };
        Literals { matcher }
    }
}

impl fmt::Debug for Literals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.matcher {
            LiteralMatcher::Empty => write!(f, "Literals(empty)"),
            LiteralMatcher::Byte(b) => write!(f, "Literals(byte {:?})", b as char),
            LiteralMatcher::Single(ref lit) => {
                write!(f, "Literals({:?})", String::from_utf8_lossy(lit))
            }
            LiteralMatcher::Automaton(ref ac) => {
                write!(f, "Literals(automaton, {} patterns)", ac.patterns_len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::parser::parse;
    use crate::program::CompileOptions;

    fn prefixes(pattern: &str) -> Literals {
        let (ast, _) = parse(pattern).unwrap();
        let opts = CompileOptions::default();
        let insts = Compiler::new(&opts).compile(&ast).unwrap().insts;
        BuildPrefixes::new(&insts).literals().into_matcher()
    }

    #[test]
    fn single_literal() {
        let lits = prefixes("hello");
        assert_eq!(lits.find(b"say hello twice"), Some((4, 9)));
        assert_eq!(lits.find(b"nothing here"), None);
    }

    #[test]
    fn single_byte() {
        let lits = prefixes("x.*");
        assert_eq!(lits.find(b"aax"), Some((2, 3)));
    }

    #[test]
    fn alternate_literals() {
        let lits = prefixes("cat|dog|bird");
        assert_eq!(lits.find(b"a dog barks"), Some((2, 5)));
        assert_eq!(lits.find(b"catbird"), Some((0, 3)));
        assert_eq!(lits.find(b"nothing"), None);
    }

    #[test]
    fn optional_head_disables_extraction() {
        assert!(prefixes("a*b").is_empty());
        assert!(prefixes("[ab]c").is_empty());
        assert!(prefixes("^abc").is_empty());
    }

    #[test]
    fn repeated_search_steps_past_false_starts() {
        let lits = prefixes("aab");
        assert_eq!(lits.find(b"aaaab"), Some((2, 5)));
    }
}
