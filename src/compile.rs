// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::ast::{Assertion, Ast, LookKind as AstLook, RepeatKind};
use crate::bitset::ClassSet;
use crate::error::Error;
use crate::inst::{EmptyLook, Inst, LookKind, SplitKind};
use crate::program::CompileOptions;

/// Above this many optional copies, `{n,m}` stops unrolling and uses the
/// counter-based loop skeleton instead.
const UNROLL_LIMIT: u32 = 8;

/// The generator's output: a patched instruction list plus the number of
/// repetition counters the VM must provision per thread.
#[derive(Debug)]
pub struct Compiled {
    pub insts: Vec<Inst>,
    pub counters: u8,
}

/// Lowers a syntax tree to a flat instruction list.
///
/// Branch targets are instruction indices throughout; child sizes are not
/// known at the time of the enclosing emission, so splits and gotos are
/// emitted empty and patched once the child's end is known.
pub struct Compiler<'o> {
    opts: &'o CompileOptions,
    insts: Vec<Inst>,
    counters: u8,
}

type InstIdx = usize;

impl<'o> Compiler<'o> {
    pub fn new(opts: &'o CompileOptions) -> Compiler<'o> {
        Compiler { opts, insts: vec![], counters: 0 }
    }

    /// Compile the whole pattern: the program is wrapped in the slot-0
    /// capture frame and terminated by the implicit `MATCH`.
    pub fn compile(mut self, ast: &Ast) -> Result<Compiled, Error> {
        self.insts.push(Inst::SaveStart(0));
        self.c(ast)?;
        self.insts.push(Inst::SaveEnd(0));
        self.insts.push(Inst::Match);
        Ok(Compiled { insts: self.insts, counters: self.counters })
    }

    fn c(&mut self, ast: &Ast) -> Result<(), Error> {
        match *ast {
            Ast::Empty => {}
            Ast::Char(c) => self.push_char(c),
            Ast::Dot => {
                if self.opts.dot_all {
                    self.push(Inst::Dot);
                } else {
                    let mut set = ClassSet::new();
                    set.insert(b'\n');
                    self.push(Inst::Class { set, inverted: true });
                }
            }
            Ast::Class { set, negated } => self.push_class(set, negated),
            Ast::Assertion(kind) => {
                let look = match kind {
                    Assertion::StartAnchor if self.opts.multiline => EmptyLook::LineStart,
                    Assertion::StartAnchor => EmptyLook::StringStart,
                    Assertion::EndAnchor if self.opts.multiline => EmptyLook::LineEnd,
                    Assertion::EndAnchor => EmptyLook::StringEnd,
                    Assertion::WordBoundary => EmptyLook::WordBoundary,
                    Assertion::NotWordBoundary => EmptyLook::NotWordBoundary,
                };
                self.push(Inst::EmptyLook(look));
            }
            Ast::Concat(ref children) => {
                for child in children {
                    self.c(child)?;
                }
            }
            Ast::Alternate(ref first, ref rest) => {
                // split L1, L2; L1: <first>; goto END; L2: <rest>; END:
                let split = self.empty_split();
                let j1 = self.insts.len();
                self.c(first)?;
                let goto = self.empty_goto();
                let j2 = self.insts.len();
                self.c(rest)?;
                let j3 = self.insts.len();
                self.set_split(split, SplitKind::Plain, j1, j2);
                self.set_goto(goto, j3);
            }
            Ast::Group { ref ast, index } => {
                self.push(Inst::SaveStart(index));
                self.c(ast)?;
                self.push(Inst::SaveEnd(index));
            }
            Ast::Backref(group) => {
                self.push(Inst::Backref { group, casei: self.opts.case_insensitive });
            }
            Ast::Look { ref ast, kind } => self.c_look(ast, kind)?,
            Ast::Repeat { ref ast, min, max, kind } => self.c_repeat(ast, min, max, kind)?,
        }
        Ok(())
    }

    fn c_look(&mut self, body: &Ast, kind: AstLook) -> Result<(), Error> {
        let (kind, width) = match kind {
            AstLook::Ahead => (LookKind::Ahead, 0),
            AstLook::NegativeAhead => (LookKind::NegativeAhead, 0),
            AstLook::Behind | AstLook::NegativeBehind => {
                let width = fixed_width(body).ok_or_else(|| {
                    Error::syntax(0, "lookbehind body must have a fixed width")
                })?;
                let kind = if kind == AstLook::Behind {
                    LookKind::Behind
                } else {
                    LookKind::NegativeBehind
                };
                (kind, width)
            }
        };
        let head = self.insts.len();
        self.push(Inst::Look { kind, end: 0, width });
        self.c(body)?;
        let end = self.insts.len();
        self.push(Inst::LookEnd { behind: kind.is_behind() });
        match self.insts[head] {
            Inst::Look { kind, width, .. } => self.insts[head] = Inst::Look { kind, end, width },
            _ => unreachable!("lookaround head was displaced"),
        }
        Ok(())
    }

    fn c_repeat(
        &mut self,
        body: &Ast,
        min: u32,
        max: Option<u32>,
        kind: RepeatKind,
    ) -> Result<(), Error> {
        let split_kind = match kind {
            RepeatKind::Greedy => SplitKind::Greedy,
            RepeatKind::Lazy => SplitKind::Lazy,
            RepeatKind::Possessive => SplitKind::Possessive,
        };
        match (min, max) {
            (0, Some(0)) => {}
            (0, Some(1)) => {
                // split BODY, END; BODY: <A>; END:
                let split = self.empty_split();
                let j1 = self.insts.len();
                self.c_repeat_body(body, kind)?;
                let j2 = self.insts.len();
                self.set_preferring_body(split, split_kind, j1, j2);
            }
            (0, None) => {
                // L: split BODY, END; BODY: <A>; goto L; END:
                let split = self.empty_split();
                let j1 = self.insts.len();
                self.c_repeat_body(body, kind)?;
                let goto = self.empty_goto();
                let j2 = self.insts.len();
                self.set_goto(goto, split);
                self.set_preferring_body(split, split_kind, j1, j2);
            }
            (1, None) => {
                // BODY: <A>; split BODY, END
                let j1 = self.insts.len();
                self.c_repeat_body(body, kind)?;
                let split = self.empty_split();
                let j2 = self.insts.len();
                self.set_preferring_body(split, split_kind, j1, j2);
            }
            (min, None) => {
                for _ in 0..min - 1 {
                    self.c(body)?;
                }
                self.c_repeat(body, 1, None, kind)?;
            }
            (min, Some(max)) => {
                debug_assert!(min <= max, "parser rejects reversed bounds");
                for _ in 0..min {
                    self.c(body)?;
                }
                if max == min {
                    return Ok(());
                }
                if max - min <= UNROLL_LIMIT {
                    for _ in min..max {
                        self.c_repeat(body, 0, Some(1), kind)?;
                    }
                } else {
                    self.c_counted(body, max - min, kind, split_kind)?;
                }
            }
        }
        Ok(())
    }

    /// The counter-based skeleton for wide `{n,m}` spans:
    ///
    /// ```text
    /// L:     split BODY, RESET
    /// BODY:  <A>
    ///        loop c, m-n, L
    /// RESET: loop c, 0, _        (zero the counter; no-op when exhausted)
    /// END:
    /// ```
    ///
    /// Both exits, early and exhausted, flow through RESET: that keeps
    /// re-entrant loops correct and gives the possessive form a single
    /// stop point for its atomic region.
    fn c_counted(
        &mut self,
        body: &Ast,
        max: u32,
        kind: RepeatKind,
        split_kind: SplitKind,
    ) -> Result<(), Error> {
        let counter = self.counters;
        self.counters = self
            .counters
            .checked_add(1)
            .ok_or_else(|| Error::syntax(0, "too many bounded repetitions"))?;

        let split = self.empty_split();
        let j1 = self.insts.len();
        self.c_repeat_body(body, kind)?;
        self.push(Inst::Loop { counter, max, back: split });
        let reset = self.insts.len();
        self.push(Inst::Loop { counter, max: 0, back: reset });
        self.set_preferring_body(split, split_kind, j1, reset);
        Ok(())
    }

    /// Emit a quantifier body. Possessive bodies are bracketed by the
    /// zero-width-progress guard so an empty iteration cannot spin inside
    /// the atomic region.
    fn c_repeat_body(&mut self, body: &Ast, kind: RepeatKind) -> Result<(), Error> {
        if kind == RepeatKind::Possessive {
            self.push(Inst::PushPos);
            self.c(body)?;
            self.push(Inst::CheckPos);
        } else {
            self.c(body)?;
        }
        Ok(())
    }

    fn push_char(&mut self, c: char) {
        if self.opts.case_insensitive && c.is_ascii_alphabetic() {
            self.push(Inst::Char(c.to_ascii_lowercase() as u8));
        } else if (c as u32) <= 0xFF {
            self.push(Inst::Char(c as u8));
        } else {
            self.push(Inst::Char32(c));
        }
    }

    fn push_class(&mut self, mut set: ClassSet, inverted: bool) {
        if self.opts.case_insensitive {
            set.fold_ascii_case();
        }
        // A single contiguous span gets the slimmer range encoding.
        if let Some((lo, hi)) = single_range(&set) {
            if lo == hi && !inverted {
                self.push(Inst::Char(lo));
            } else {
                self.push(Inst::Range { lo, hi, inverted });
            }
        } else {
            self.push(Inst::Class { set, inverted });
        }
    }

    fn push(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    /// Append an empty split and return its index for later patching.
    fn empty_split(&mut self) -> InstIdx {
        self.insts.push(Inst::Split { kind: SplitKind::Plain, goto1: 0, goto2: 0 });
        self.insts.len() - 1
    }

    fn set_split(&mut self, i: InstIdx, kind: SplitKind, goto1: InstIdx, goto2: InstIdx) {
        match self.insts[i] {
            Inst::Split { .. } => self.insts[i] = Inst::Split { kind, goto1, goto2 },
            _ => unreachable!("patch target is not a split"),
        }
    }

    /// Patch a quantifier split: the body is the preferred branch for the
    /// greedy and possessive kinds, the exit for the lazy kind.
    fn set_preferring_body(
        &mut self,
        i: InstIdx,
        kind: SplitKind,
        body: InstIdx,
        exit: InstIdx,
    ) {
        match kind {
            SplitKind::Lazy => self.set_split(i, kind, exit, body),
            _ => self.set_split(i, kind, body, exit),
        }
    }

    /// Append an empty goto and return its index for later patching.
    fn empty_goto(&mut self) -> InstIdx {
        self.insts.push(Inst::Goto(0));
        self.insts.len() - 1
    }

    fn set_goto(&mut self, i: InstIdx, target: InstIdx) {
        match self.insts[i] {
            Inst::Goto(_) => self.insts[i] = Inst::Goto(target),
            _ => unreachable!("patch target is not a goto"),
        }
    }
}

/// Width of the text a subtree matches, in characters, if that width is
/// the same on every path. Lookbehind bodies must have one.
fn fixed_width(ast: &Ast) -> Option<u32> {
    match *ast {
        Ast::Empty | Ast::Assertion(_) | Ast::Look { .. } => Some(0),
        Ast::Char(_) | Ast::Dot | Ast::Class { .. } => Some(1),
        Ast::Concat(ref children) => {
            children.iter().try_fold(0u32, |acc, c| Some(acc + fixed_width(c)?))
        }
        Ast::Alternate(ref a, ref b) => {
            let (wa, wb) = (fixed_width(a)?, fixed_width(b)?);
            if wa == wb {
                Some(wa)
            } else {
                None
            }
        }
        Ast::Repeat { ref ast, min, max, .. } => {
            if Some(min) == max {
                Some(min.checked_mul(fixed_width(ast)?)?)
            } else {
                None
            }
        }
        Ast::Group { ref ast, .. } => fixed_width(ast),
        Ast::Backref(_) => None,
    }
}

fn single_range(set: &ClassSet) -> Option<(u8, u8)> {
    let mut iter = set.iter();
    let lo = iter.next()?;
    let mut hi = lo;
    for b in iter {
        if b != hi + 1 {
            return None;
        }
        hi = b;
    }
    Some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn c(pattern: &str) -> Vec<Inst> {
        c_opts(pattern, &CompileOptions::default())
    }

    fn c_opts(pattern: &str, opts: &CompileOptions) -> Vec<Inst> {
        let (ast, _) = parse(pattern).unwrap();
        Compiler::new(opts).compile(&ast).unwrap().insts
    }

    #[test]
    fn literal_sequence() {
        assert_eq!(
            c("ab"),
            vec![
                Inst::SaveStart(0),
                Inst::Char(b'a'),
                Inst::Char(b'b'),
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn alternation_prefers_leftmost() {
        assert_eq!(
            c("a|b"),
            vec![
                Inst::SaveStart(0),
                Inst::Split { kind: SplitKind::Plain, goto1: 2, goto2: 4 },
                Inst::Char(b'a'),
                Inst::Goto(5),
                Inst::Char(b'b'),
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn star_kinds() {
        assert_eq!(
            c("a*"),
            vec![
                Inst::SaveStart(0),
                Inst::Split { kind: SplitKind::Greedy, goto1: 2, goto2: 4 },
                Inst::Char(b'a'),
                Inst::Goto(1),
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
        // The lazy split lists the exit first.
        assert_eq!(
            c("a*?")[1],
            Inst::Split { kind: SplitKind::Lazy, goto1: 4, goto2: 2 }
        );
    }

    #[test]
    fn plus_reenters_body() {
        assert_eq!(
            c("a+"),
            vec![
                Inst::SaveStart(0),
                Inst::Char(b'a'),
                Inst::Split { kind: SplitKind::Greedy, goto1: 1, goto2: 3 },
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn possessive_wraps_body_with_progress_guard() {
        assert_eq!(
            c("a*+"),
            vec![
                Inst::SaveStart(0),
                Inst::Split { kind: SplitKind::Possessive, goto1: 2, goto2: 6 },
                Inst::PushPos,
                Inst::Char(b'a'),
                Inst::CheckPos,
                Inst::Goto(1),
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn bounded_repeat_unrolls() {
        // a{2,4} = a a (a (a)?)? as skippable copies.
        let insts = c("a{2,4}");
        let chars = insts.iter().filter(|i| matches!(i, Inst::Char(b'a'))).count();
        let splits = insts.iter().filter(|i| matches!(i, Inst::Split { .. })).count();
        assert_eq!(chars, 4);
        assert_eq!(splits, 2);
    }

    #[test]
    fn wide_bounded_repeat_uses_loop() {
        let insts = c("a{2,100}");
        assert_eq!(
            insts.iter().filter(|i| matches!(i, Inst::Char(b'a'))).count(),
            3,
            "two unrolled copies plus one loop body"
        );
        assert!(insts.iter().any(|i| matches!(i, Inst::Loop { max: 98, .. })));
        // The early-exit path resets the counter.
        assert!(insts.iter().any(|i| matches!(i, Inst::Loop { max: 0, .. })));
    }

    #[test]
    fn anchors_respect_multiline() {
        assert_eq!(c("^a")[1], Inst::EmptyLook(EmptyLook::StringStart));
        let opts = CompileOptions { multiline: true, ..CompileOptions::default() };
        assert_eq!(c_opts("^a", &opts)[1], Inst::EmptyLook(EmptyLook::LineStart));
        assert_eq!(c_opts("a$", &opts)[2], Inst::EmptyLook(EmptyLook::LineEnd));
    }

    #[test]
    fn dot_excludes_newline_by_default() {
        assert!(matches!(c(".")[1], Inst::Class { inverted: true, .. }));
        let opts = CompileOptions { dot_all: true, ..CompileOptions::default() };
        assert_eq!(c_opts(".", &opts)[1], Inst::Dot);
    }

    #[test]
    fn case_folding_is_generator_time() {
        let opts = CompileOptions { case_insensitive: true, ..CompileOptions::default() };
        assert_eq!(c_opts("A", &opts)[1], Inst::Char(b'a'));
        match c_opts("[a-c]", &opts)[1] {
            Inst::Class { set, inverted: false } => {
                assert!(set.contains(b'B'));
            }
            ref other => panic!("unexpected inst: {:?}", other),
        }
        assert_eq!(
            c_opts(r"(a)\1", &opts)[4],
            Inst::Backref { group: 1, casei: true }
        );
    }

    #[test]
    fn single_range_classes_use_range_encoding() {
        assert_eq!(c("[a-z]")[1], Inst::Range { lo: b'a', hi: b'z', inverted: false });
        assert_eq!(c("[^x]")[1], Inst::Range { lo: b'x', hi: b'x', inverted: true });
        assert!(matches!(c("[a-cx]")[1], Inst::Class { .. }));
    }

    #[test]
    fn lookbehind_width_is_fixed() {
        let insts = c("(?<=ab)c");
        assert_eq!(insts[1], Inst::Look { kind: LookKind::Behind, end: 4, width: 2 });
        assert_eq!(insts[4], Inst::LookEnd { behind: true });

        let (ast, _) = parse("(?<=a+)c").unwrap();
        let opts = CompileOptions::default();
        assert!(Compiler::new(&opts).compile(&ast).is_err());
    }

    #[test]
    fn group_emits_save_pair() {
        assert_eq!(
            c("(a)"),
            vec![
                Inst::SaveStart(0),
                Inst::SaveStart(1),
                Inst::Char(b'a'),
                Inst::SaveEnd(1),
                Inst::SaveEnd(0),
                Inst::Match,
            ]
        );
    }
}
