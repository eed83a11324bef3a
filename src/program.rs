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

use log::trace;

use crate::compile::Compiler;
use crate::error::Error;
use crate::inst::{self, EmptyLook, Inst};
use crate::literals::{BuildPrefixes, Literals};
use crate::nfa::{Nfa, NfaThreads, Slot};
use crate::optimize;
use crate::parser;
use crate::pool::{Pool, PoolGuard};

/// How hard the peephole optimizer works on the generated program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptLevel {
    /// Emit the program exactly as lowered.
    None,
    /// Collapse jump chains, drop unreachable code, fold single-character
    /// alternatives.
    #[default]
    Basic,
    /// `Basic`, plus literal-prefix extraction for fast scanning to the
    /// next match candidate.
    Aggressive,
}

/// Compile-time configuration.
#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
    /// ASCII-only case folding, applied at generation time.
    pub case_insensitive: bool,
    /// `^` and `$` also match at line boundaries.
    pub multiline: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// Cap on lookaround/atomic nesting during execution.
    pub max_recursion_depth: u32,
    /// Cap on total VM instructions executed per call.
    pub max_steps: u64,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            opt_level: OptLevel::Basic,
            case_insensitive: false,
            multiline: false,
            dot_all: false,
            max_recursion_depth: 1000,
            max_steps: 1_000_000,
        }
    }
}

/// A compiled regular expression program. Once built, the bytecode is
/// immutable; matching engines only allocate transient thread state, which
/// is cached here and reused across executions.
pub struct Program {
    /// The original pattern text.
    pub original: String,
    /// The encoded instruction stream.
    code: Vec<u8>,
    /// Capture groups, including the implicit group 0.
    ncaps: usize,
    /// Repetition counters the VM must provision per thread.
    counters: u8,
    /// Literal prefixes for skipping ahead in the search loop. Empty below
    /// the aggressive level and under case folding.
    pub prefixes: Literals,
    /// True iff the program starts with a text-start anchor.
    pub anchored_begin: bool,
    pub opts: CompileOptions,
    /// Cached thread lists; nested engine invocations check out extras.
    threads: Pool<NfaThreads>,
}

impl Program {
    /// Run the whole pipeline over a pattern.
    pub fn new(pattern: &str, opts: CompileOptions) -> Result<Program, Error> {
        let (ast, ngroups) = parser::parse(pattern)?;
        let compiled = Compiler::new(&opts).compile(&ast)?;
        let counters = compiled.counters;
        let insts = optimize::optimize(compiled.insts, opts.opt_level);
        // Case folding happens in the instructions but not in the input,
        // so folded programs cannot scan for exact literal bytes.
        let prefixes = if opts.opt_level == OptLevel::Aggressive && !opts.case_insensitive {
            BuildPrefixes::new(&insts).literals().into_matcher()
        } else {
            Literals::empty()
        };
        let anchored_begin =
            matches!(insts.get(1), Some(&Inst::EmptyLook(EmptyLook::StringStart)));
        let code = inst::encode(&insts)?;
        trace!("compiled {:?} to {} bytes:\n{}", pattern, code.len(), inst::dump(&code));
        Ok(Program {
            original: pattern.to_owned(),
            code,
            ncaps: 1 + ngroups as usize,
            counters,
            prefixes,
            anchored_begin,
            opts,
            threads: Pool::new(Box::new(NfaThreads::new)),
        })
    }

    /// Execute the program over `text` from byte offset `start`.
    ///
    /// On a match, fills `slots` with the winning thread's captures and
    /// returns true. `anchored` pins the match start to `start`;
    /// `require_end` additionally pins the match end (used by `test`).
    pub fn exec(
        &self,
        slots: &mut [Slot],
        text: &str,
        start: usize,
        anchored: bool,
        require_end: Option<usize>,
    ) -> Result<bool, Error> {
        Nfa::exec(self, slots, text, start, anchored || self.anchored_begin, require_end)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The number of capture groups, including the zeroth whole-match
    /// group.
    pub fn num_captures(&self) -> usize {
        self.ncaps
    }

    pub fn num_counters(&self) -> usize {
        self.counters as usize
    }

    /// Allocate a fresh capture-slot vector: two slots per group.
    pub fn alloc_captures(&self) -> Vec<Slot> {
        vec![None; 2 * self.ncaps]
    }

    /// Check a thread-list allocation out of the cache.
    pub(crate) fn cache_threads(&self) -> PoolGuard<'_, NfaThreads> {
        self.threads.get()
    }
}

impl Clone for Program {
    fn clone(&self) -> Program {
        Program {
            original: self.original.clone(),
            code: self.code.clone(),
            ncaps: self.ncaps,
            counters: self.counters,
            prefixes: self.prefixes.clone(),
            anchored_begin: self.anchored_begin,
            opts: self.opts,
            threads: Pool::new(Box::new(NfaThreads::new)),
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Program")
            .field("original", &self.original)
            .field("len", &self.code.len())
            .field("ncaps", &self.ncaps)
            .field("counters", &self.counters)
            .field("anchored_begin", &self.anchored_begin)
            .finish()
    }
}
