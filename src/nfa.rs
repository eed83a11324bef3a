// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The matching engine: a Pike-style VM over the encoded program.
//!
//! Two ordered thread lists are kept per input position: `clist` holds the
//! threads executing at the current position, `nlist` the threads that
//! consumed the current character. Non-consuming instructions are resolved
//! eagerly by the closure in `add`; consuming instructions park the thread
//! until the frontier advances. A sparse set keyed by program counter
//! guarantees each `(pc, position)` pair is processed at most once per
//! dispatch cycle, which bounds the work to O(program × input).
//!
//! Zero-width subexpressions that need their own evaluation — lookarounds
//! and possessive (atomic) regions — run a nested engine over the same
//! program bytes with an explicit stop instruction, a shared step budget
//! and a bumped nesting depth.

use std::mem;

use log::debug;

use crate::char::Char;
use crate::error::Error;
use crate::input::{CharInput, InputAt};
use crate::inst::{self, EmptyLook, Opcode};
use crate::program::Program;

/// One half of a capture: a byte offset, or "did not participate".
pub type Slot = Option<usize>;

/// An execution region. The outer call runs the whole program; nested
/// calls run a lookaround body or an atomic region and accept at an
/// explicit stop instruction instead of `MATCH`.
#[derive(Clone, Copy, Debug)]
struct Frame {
    /// Where threads are seeded.
    start_pc: usize,
    /// Accepting instruction for nested regions; `None` accepts at `MATCH`.
    stop_pc: Option<usize>,
    /// Inside an atomic region, the possessive split that opened it forks
    /// like a greedy one instead of recursing forever.
    entry_split: Option<usize>,
    /// Seed threads only at the starting position.
    anchored: bool,
    /// Accept only at this input offset (full-input `test`, lookbehinds).
    require_end: Option<usize>,
}

/// An NFA simulation matching engine.
#[derive(Debug)]
pub struct Nfa<'r, 't> {
    prog: &'r Program,
    input: CharInput<'t>,
}

impl<'r, 't> Nfa<'r, 't> {
    /// Execute the program. On a match, `slots` receives the winning
    /// thread's captures and `exec` returns true.
    ///
    /// `anchored` pins the match start to `start`; `require_end` pins the
    /// match end. Resource caps surface as errors and abandon all threads.
    pub fn exec(
        prog: &'r Program,
        slots: &mut [Slot],
        text: &'t str,
        start: usize,
        anchored: bool,
        require_end: Option<usize>,
    ) -> Result<bool, Error> {
        debug_assert_eq!(slots.len(), 2 * prog.num_captures());
        for slot in slots.iter_mut() {
            *slot = None;
        }
        let nfa = Nfa { prog, input: CharInput::new(text) };
        let seed = Thread::sized(slots.len(), prog.num_counters());
        let frame = Frame {
            start_pc: 0,
            stop_pc: None,
            entry_split: None,
            anchored,
            require_end,
        };
        let mut budget = prog.opts.max_steps;
        let mut q = prog.cache_threads();
        let matched = nfa
            .run(&mut q, slots, &seed, start, frame, &mut budget, 0)
            .map_err(|err| {
                debug!("execution of {:?} aborted: {}", prog.original, err);
                err
            })?;
        Ok(matched.is_some())
    }

    /// The dispatch loop. Returns the end offset of the winning match.
    fn run(
        &self,
        q: &mut NfaThreads,
        slots: &mut [Slot],
        seed: &Thread,
        start: usize,
        frame: Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<Option<usize>, Error> {
        q.resize(self.prog.code().len() + 1, slots.len(), self.prog.num_counters());
        let NfaThreads { ref mut clist, ref mut nlist, ref mut scratch } = *q;
        clist.clear();
        nlist.clear();
        let mut matched = None;
        let mut at = self.input.at(start);
        loop {
            if clist.size == 0 {
                // Current threads all died: with a match in hand there is
                // nothing left to improve, and an anchored region cannot
                // restart past its origin.
                if matched.is_some() {
                    break;
                }
                if frame.anchored && at.pos() > start {
                    break;
                }
                // Jump the cursor to the next literal-prefix candidate.
                if !frame.anchored && !self.prog.prefixes.is_empty() {
                    at = match self.input.prefix_at(&self.prog.prefixes, at) {
                        None => break,
                        Some(at) => at,
                    };
                }
            }
            // Simulate a leading `.*?` by seeding the program entry at the
            // current position, unless a match already claimed priority.
            if matched.is_none() && (!frame.anchored || at.pos() == start) {
                scratch.copy_from(seed);
                self.add(clist, scratch, frame.start_pc, at, &frame, budget, depth)?;
            }
            let at_next = self.input.at(at.next_pos());
            for i in 0..clist.size {
                let accepted = {
                    let thread = &mut clist.dense[i];
                    self.step(nlist, slots, thread, at, at_next, &frame, budget, depth)?
                };
                if accepted {
                    // Leftmost-first: lower-priority current threads are
                    // discarded; threads already in `nlist` outrank this
                    // match and may still replace it.
                    matched = Some(at.pos());
                    break;
                }
            }
            if at.is_end() {
                break;
            }
            at = at_next;
            mem::swap(clist, nlist);
            nlist.clear();
        }
        Ok(matched)
    }

    /// Process one parked thread at the current position. Returns true iff
    /// the thread accepted.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        nlist: &mut ThreadList,
        slots: &mut [Slot],
        t: &mut Thread,
        at: InputAt,
        at_next: InputAt,
        frame: &Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<bool, Error> {
        self.charge(budget)?;
        let code = self.prog.code();
        let pc = t.pc;
        if frame.stop_pc == Some(pc) {
            if frame.require_end.map_or(true, |end| end == at.pos()) {
                slots.copy_from_slice(&t.caps);
                return Ok(true);
            }
            return Ok(false);
        }
        let op = Opcode::from_byte(code[pc]);
        let next = pc + op.size();
        let casei = self.prog.opts.case_insensitive;
        match op {
            Opcode::Match => {
                if frame.require_end.map_or(true, |end| end == at.pos()) {
                    slots.copy_from_slice(&t.caps);
                    return Ok(true);
                }
            }
            Opcode::Char => {
                if char_eq(at.char(), Char::from(code[pc + 1] as char), casei) {
                    self.add(nlist, t, next, at_next, frame, budget, depth)?;
                }
            }
            Opcode::Char32 => {
                let want =
                    char::from_u32(inst::read_u32(code, pc + 1)).map(Char::from).unwrap_or_else(Char::none);
                if char_eq(at.char(), want, casei) {
                    self.add(nlist, t, next, at_next, frame, budget, depth)?;
                }
            }
            Opcode::CharRange | Opcode::CharRangeInv => {
                let c = at.char();
                if !c.is_none() {
                    let inside = c.code() <= 0xFF
                        && code[pc + 1] as u32 <= c.code()
                        && c.code() <= code[pc + 2] as u32;
                    if inside == (op == Opcode::CharRange) {
                        self.add(nlist, t, next, at_next, frame, budget, depth)?;
                    }
                }
            }
            Opcode::CharClass | Opcode::CharClassInv => {
                let c = at.char();
                if !c.is_none() {
                    let inside =
                        c.code() <= 0xFF && table_contains(&code[pc + 1..pc + 33], c.code() as u8);
                    if inside == (op == Opcode::CharClass) {
                        self.add(nlist, t, next, at_next, frame, budget, depth)?;
                    }
                }
            }
            Opcode::Dot => {
                if !at.char().is_none() {
                    self.add(nlist, t, next, at_next, frame, budget, depth)?;
                }
            }
            Opcode::BackRef | Opcode::BackRefI => {
                self.step_backref(nlist, t, at, at_next, frame, budget, depth)?;
            }
            Opcode::SplitPossessive => {
                // A thread parked here with progress recorded is partway
                // through consuming a resolved atomic region; without it,
                // the entry is just the closure's dedup placeholder.
                if t.pending > 0 {
                    debug_assert!(t.pending >= at.len());
                    t.pending -= at.len();
                    if t.pending == 0 {
                        let exit = inst::branch_target(code, pc, pc + 5);
                        self.add(nlist, t, exit, at_next, frame, budget, depth)?;
                    } else {
                        nlist.park(t);
                    }
                }
            }
            // Anything else in the list is a dedup placeholder the closure
            // already resolved.
            _ => {}
        }
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn step_backref(
        &self,
        nlist: &mut ThreadList,
        t: &mut Thread,
        at: InputAt,
        at_next: InputAt,
        frame: &Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<(), Error> {
        let code = self.prog.code();
        let pc = t.pc;
        let casei = Opcode::from_byte(code[pc]) == Opcode::BackRefI;
        let group = code[pc + 1] as usize;
        let (s, e) = match (t.caps[2 * group], t.caps[2 * group + 1]) {
            (Some(s), Some(e)) if s < e => (s, e),
            // Empty or unset captures were fully handled by the closure;
            // this entry only exists for deduplication.
            _ => return Ok(()),
        };
        let want = self.input.at(s + t.pending).char();
        if !char_eq(at.char(), want, casei) {
            return Ok(());
        }
        let consumed = t.pending + want.len_utf8();
        if s + consumed >= e {
            t.pending = 0;
            let next = pc + Opcode::BackRef.size();
            self.add(nlist, t, next, at_next, frame, budget, depth)?;
        } else {
            t.pending = consumed;
            nlist.park(t);
        }
        Ok(())
    }

    /// Follow every non-consuming instruction reachable from `pc` at the
    /// current position, in priority order, parking consuming and
    /// accepting states in `list`. `state` is the working thread; every
    /// mutation is undone on the way back out.
    #[allow(clippy::too_many_arguments)]
    fn add(
        &self,
        list: &mut ThreadList,
        state: &mut Thread,
        pc: usize,
        at: InputAt,
        frame: &Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<(), Error> {
        if list.contains(pc) {
            return Ok(());
        }
        self.charge(budget)?;
        let ti = list.add(pc);
        if frame.stop_pc == Some(pc) {
            list.dense[ti].copy_from_at(state, pc);
            return Ok(());
        }
        let code = self.prog.code();
        let op = Opcode::from_byte(code[pc]);
        let next = pc + op.size();
        match op {
            Opcode::Goto => {
                let target = inst::branch_target(code, pc, pc + 1);
                self.add(list, state, target, at, frame, budget, depth)?;
            }
            Opcode::Split | Opcode::SplitGreedy | Opcode::SplitLazy => {
                let goto1 = inst::branch_target(code, pc, pc + 1);
                let goto2 = inst::branch_target(code, pc, pc + 5);
                self.add(list, state, goto1, at, frame, budget, depth)?;
                self.add(list, state, goto2, at, frame, budget, depth)?;
            }
            Opcode::SplitPossessive => {
                self.add_possessive(list, state, ti, pc, at, frame, budget, depth)?;
            }
            Opcode::SaveStart | Opcode::SaveEnd => {
                let group = code[pc + 1] as usize;
                let slot = if op == Opcode::SaveStart { 2 * group } else { 2 * group + 1 };
                if slot >= state.caps.len() {
                    self.add(list, state, next, at, frame, budget, depth)?;
                } else {
                    let old = state.caps[slot];
                    state.caps[slot] = Some(at.pos());
                    self.add(list, state, next, at, frame, budget, depth)?;
                    state.caps[slot] = old;
                }
            }
            Opcode::LineStart
            | Opcode::LineEnd
            | Opcode::StringStart
            | Opcode::StringEnd
            | Opcode::WordBoundary
            | Opcode::NotWordBoundary => {
                let look = match op {
                    Opcode::LineStart => EmptyLook::LineStart,
                    Opcode::LineEnd => EmptyLook::LineEnd,
                    Opcode::StringStart => EmptyLook::StringStart,
                    Opcode::StringEnd => EmptyLook::StringEnd,
                    Opcode::WordBoundary => EmptyLook::WordBoundary,
                    _ => EmptyLook::NotWordBoundary,
                };
                let prev = self.input.previous_char(at);
                if look.matches(prev, at.char()) {
                    self.add(list, state, next, at, frame, budget, depth)?;
                }
            }
            Opcode::Lookahead
            | Opcode::NegativeLookahead
            | Opcode::Lookbehind
            | Opcode::NegativeLookbehind => {
                self.add_look(list, state, pc, at, frame, budget, depth)?;
            }
            Opcode::LookaheadEnd | Opcode::LookbehindEnd => {
                self.add(list, state, next, at, frame, budget, depth)?;
            }
            Opcode::Loop => {
                let counter = code[pc + 1] as usize;
                let max = inst::read_u32(code, pc + 2);
                let back = inst::branch_target(code, pc, pc + 6);
                let old = state.counters[counter];
                if old + 1 < max {
                    state.counters[counter] = old + 1;
                    self.add(list, state, back, at, frame, budget, depth)?;
                } else {
                    state.counters[counter] = 0;
                    self.add(list, state, next, at, frame, budget, depth)?;
                }
                state.counters[counter] = old;
            }
            Opcode::PushPos => {
                state.stack.push(at.pos());
                self.add(list, state, next, at, frame, budget, depth)?;
                state.stack.pop();
            }
            Opcode::CheckPos => {
                // A zero-width pass through an atomic body kills the
                // thread instead of spinning.
                if let Some(top) = state.stack.pop() {
                    if top != at.pos() {
                        self.add(list, state, next, at, frame, budget, depth)?;
                    }
                    state.stack.push(top);
                }
            }
            Opcode::BackRef | Opcode::BackRefI => {
                // Materialize unconditionally so the dedup entry never
                // carries a stale capture vector into the step phase.
                let group = code[pc + 1] as usize;
                state.pending = 0;
                list.dense[ti].copy_from_at(state, pc);
                if let (Some(s), Some(e)) = (state.caps[2 * group], state.caps[2 * group + 1]) {
                    if s == e {
                        // An empty capture is a zero-width match; non-empty
                        // captures consume via the parked entry above. A
                        // group that did not participate fails the thread
                        // in the step phase.
                        self.add(list, state, next, at, frame, budget, depth)?;
                    }
                }
            }
            Opcode::Match
            | Opcode::Char
            | Opcode::Char32
            | Opcode::CharRange
            | Opcode::CharRangeInv
            | Opcode::CharClass
            | Opcode::CharClassInv
            | Opcode::Dot => {
                list.dense[ti].copy_from_at(state, pc);
            }
        }
        Ok(())
    }

    /// Resolve a possessive split by running its region `[split, exit)` as
    /// a nested greedy sub-match and committing to the winner.
    #[allow(clippy::too_many_arguments)]
    fn add_possessive(
        &self,
        list: &mut ThreadList,
        state: &mut Thread,
        ti: usize,
        pc: usize,
        at: InputAt,
        frame: &Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<(), Error> {
        let code = self.prog.code();
        if frame.entry_split == Some(pc) {
            // Within its own atomic run the split is an ordinary greedy
            // fork.
            let goto1 = inst::branch_target(code, pc, pc + 1);
            let goto2 = inst::branch_target(code, pc, pc + 5);
            self.add(list, state, goto1, at, frame, budget, depth)?;
            self.add(list, state, goto2, at, frame, budget, depth)?;
            return Ok(());
        }
        self.check_depth(depth)?;
        let exit = inst::branch_target(code, pc, pc + 5);
        let sub_frame = Frame {
            start_pc: pc,
            stop_pc: Some(exit),
            entry_split: Some(pc),
            anchored: true,
            require_end: None,
        };
        let mut sub_slots = vec![None; state.caps.len()];
        let end = {
            let mut sub_q = self.prog.cache_threads();
            self.run(&mut sub_q, &mut sub_slots, state, at.pos(), sub_frame, budget, depth + 1)?
        };
        match end {
            // The region cannot complete here; drop the alternatives too.
            None => {}
            Some(end) if end == at.pos() => {
                let saved = state.caps.clone();
                state.caps.copy_from_slice(&sub_slots);
                self.add(list, state, exit, at, frame, budget, depth)?;
                state.caps.copy_from_slice(&saved);
            }
            Some(end) => {
                // Commit: park this thread to swallow the region's text,
                // then continue at the exit.
                let parked = &mut list.dense[ti];
                parked.copy_from_at(state, pc);
                parked.caps.copy_from_slice(&sub_slots);
                parked.pending = end - at.pos();
            }
        }
        Ok(())
    }

    /// Evaluate a lookaround assertion with a nested engine invocation.
    #[allow(clippy::too_many_arguments)]
    fn add_look(
        &self,
        list: &mut ThreadList,
        state: &mut Thread,
        pc: usize,
        at: InputAt,
        frame: &Frame,
        budget: &mut u64,
        depth: u32,
    ) -> Result<(), Error> {
        let code = self.prog.code();
        let op = Opcode::from_byte(code[pc]);
        let end_pc = inst::branch_target(code, pc, pc + 1);
        let body_pc = pc + op.size();
        let cont_pc = end_pc + Opcode::LookaheadEnd.size();
        let (behind, positive) = match op {
            Opcode::Lookahead => (false, true),
            Opcode::NegativeLookahead => (false, false),
            Opcode::Lookbehind => (true, true),
            _ => (true, false),
        };
        self.check_depth(depth)?;
        let (start_pos, require_end) = if behind {
            let width = inst::read_u32(code, pc + 5) as usize;
            match self.walk_back(at, width) {
                Some(pos) => (pos, Some(at.pos())),
                None => {
                    // Not enough text behind the cursor to hold the body.
                    if !positive {
                        self.add(list, state, cont_pc, at, frame, budget, depth)?;
                    }
                    return Ok(());
                }
            }
        } else {
            (at.pos(), None)
        };
        let sub_frame = Frame {
            start_pc: body_pc,
            stop_pc: Some(end_pc),
            entry_split: None,
            anchored: true,
            require_end,
        };
        let mut sub_slots = vec![None; state.caps.len()];
        let found = {
            let mut sub_q = self.prog.cache_threads();
            self.run(&mut sub_q, &mut sub_slots, state, start_pos, sub_frame, budget, depth + 1)?
                .is_some()
        };
        if found != positive {
            return Ok(());
        }
        if positive {
            // Captures made inside a positive lookaround persist.
            let saved = state.caps.clone();
            state.caps.copy_from_slice(&sub_slots);
            self.add(list, state, cont_pc, at, frame, budget, depth)?;
            state.caps.copy_from_slice(&saved);
        } else {
            self.add(list, state, cont_pc, at, frame, budget, depth)?;
        }
        Ok(())
    }

    /// Step back `width` characters from `at`, or report that the input is
    /// too short.
    fn walk_back(&self, at: InputAt, width: usize) -> Option<usize> {
        let mut pos = at.pos();
        for _ in 0..width {
            let prev = self.input.previous_char(self.input.at(pos));
            if prev.is_none() {
                return None;
            }
            pos -= prev.len_utf8();
        }
        Some(pos)
    }

    #[inline(always)]
    fn charge(&self, budget: &mut u64) -> Result<(), Error> {
        match budget.checked_sub(1) {
            Some(rest) => {
                *budget = rest;
                Ok(())
            }
            None => Err(Error::StepLimit(self.prog.opts.max_steps)),
        }
    }

    fn check_depth(&self, depth: u32) -> Result<(), Error> {
        if depth >= self.prog.opts.max_recursion_depth {
            Err(Error::RecursionLimit(self.prog.opts.max_recursion_depth))
        } else {
            Ok(())
        }
    }
}

#[inline(always)]
fn char_eq(have: Char, want: Char, casei: bool) -> bool {
    if have.is_none() || want.is_none() {
        return false;
    }
    if casei {
        have.to_ascii_lowercase() == want.to_ascii_lowercase()
    } else {
        have == want
    }
}

#[inline(always)]
fn table_contains(table: &[u8], b: u8) -> bool {
    table[(b >> 3) as usize] & (1 << (b & 7)) != 0
}

/// Cached allocations for one engine invocation: the two thread frontiers
/// plus the closure's working thread.
#[derive(Debug)]
pub struct NfaThreads {
    clist: ThreadList,
    nlist: ThreadList,
    scratch: Thread,
}

impl NfaThreads {
    pub fn new() -> NfaThreads {
        NfaThreads {
            clist: ThreadList::new(),
            nlist: ThreadList::new(),
            scratch: Thread::sized(0, 0),
        }
    }

    fn resize(&mut self, cap: usize, nslots: usize, ncounters: usize) {
        self.clist.resize(cap, nslots, ncounters);
        self.nlist.resize(cap, nslots, ncounters);
        if self.scratch.caps.len() != nslots || self.scratch.counters.len() != ncounters {
            self.scratch = Thread::sized(nslots, ncounters);
        }
    }
}

impl Default for NfaThreads {
    fn default() -> NfaThreads {
        NfaThreads::new()
    }
}

/// An ordered thread list with O(1) membership, after the classic
/// sparse-set trick: `sparse[pc]` indexes into `dense`, and an entry is
/// live iff that index is below `size` and points back at `pc`.
#[derive(Debug)]
struct ThreadList {
    dense: Vec<Thread>,
    sparse: Vec<u32>,
    size: usize,
}

impl ThreadList {
    fn new() -> ThreadList {
        ThreadList { dense: vec![], sparse: vec![], size: 0 }
    }

    fn resize(&mut self, cap: usize, nslots: usize, ncounters: usize) {
        let dims_ok = self.dense.len() == cap
            && self
                .dense
                .first()
                .map_or(nslots == 0, |t| t.caps.len() == nslots && t.counters.len() == ncounters);
        if !dims_ok {
            let t = Thread::sized(nslots, ncounters);
            self.dense = vec![t; cap];
            self.sparse = vec![0; cap];
            self.size = 0;
        }
    }

    fn clear(&mut self) {
        self.size = 0;
    }

    fn contains(&self, pc: usize) -> bool {
        let s = self.sparse[pc] as usize;
        s < self.size && self.dense[s].pc == pc
    }

    /// Reserve the next dense slot for `pc` and return its index. The slot
    /// contents are stale until a caller materializes state into it.
    fn add(&mut self, pc: usize) -> usize {
        let ti = self.size;
        self.dense[ti].pc = pc;
        self.dense[ti].pending = 0;
        self.sparse[pc] = ti as u32;
        self.size += 1;
        ti
    }

    /// Enqueue a full copy of `t` under its own pc, unless that pc is
    /// already taken this cycle.
    fn park(&mut self, t: &Thread) {
        if !self.contains(t.pc) {
            let ti = self.add(t.pc);
            let pending = t.pending;
            let pc = t.pc;
            // add() zeroed pending; restore the copy wholesale.
            let dense = &mut self.dense[ti];
            dense.copy_from_at(t, pc);
            dense.pending = pending;
        }
    }
}

/// A VM thread: a cursor into the program plus everything the program can
/// write — capture slots, repetition counters, the zero-width-progress
/// stack and partial progress through a multi-character consumer.
#[derive(Clone, Debug)]
struct Thread {
    pc: usize,
    /// Bytes already consumed by a backreference, or bytes left to consume
    /// by a committed atomic region.
    pending: usize,
    caps: Vec<Slot>,
    counters: Vec<u32>,
    stack: Vec<usize>,
}

impl Thread {
    fn sized(nslots: usize, ncounters: usize) -> Thread {
        Thread {
            pc: 0,
            pending: 0,
            caps: vec![None; nslots],
            counters: vec![0; ncounters],
            stack: vec![],
        }
    }

    fn copy_from(&mut self, other: &Thread) {
        let pc = other.pc;
        let pending = other.pending;
        self.copy_from_at(other, pc);
        self.pending = pending;
    }

    fn copy_from_at(&mut self, other: &Thread, pc: usize) {
        self.pc = pc;
        self.caps.copy_from_slice(&other.caps);
        self.counters.copy_from_slice(&other.counters);
        self.stack.clear();
        self.stack.extend_from_slice(&other.stack);
    }
}
