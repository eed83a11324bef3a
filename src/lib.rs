// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An ECMAScript-flavored regular expression engine.
//!
//! A pattern is compiled once — lexed, parsed, lowered to a compact
//! little-endian bytecode program and peephole-optimized — and then
//! executed against input text by a Pike-style virtual machine that
//! advances all live alternatives in lockstep. Matching never
//! backtracks over the input; work is bounded by a configurable step
//! budget and lookaround nesting depth, so execution is total on every
//! pattern/input pair.
//!
//! Supported syntax: literals, `.`, character classes with ranges and
//! negation, the shorthand classes `\d`/`\w`/`\s` and their complements,
//! alternation, greedy/lazy/possessive quantifiers (`*`, `+`, `?`,
//! `{n,m}` with `?`/`+` modifiers), capturing and non-capturing groups,
//! backreferences `\1`–`\9`, the anchors `^`, `$`, `\b`, `\B`, and
//! lookahead/lookbehind assertions of both polarities. Character classes
//! are Latin-1 tables; case folding is ASCII-only.
//!
//! # Usage
//!
//! Find the leftmost match and its captures:
//!
//! ```
//! use ecma_regex::Regex;
//!
//! let text = "mail me: jane@example.com";
//! let re = Regex::new(r"(\w+)@(\w+)\.com").unwrap();
//! let m = re.find(text).unwrap().unwrap();
//! assert_eq!(m.as_str(text), "jane@example.com");
//! assert_eq!(m.group_str(text, 1), Some("jane"));
//! ```
//!
//! Iterate over every match:
//!
//! ```
//! use ecma_regex::Regex;
//!
//! let re = Regex::new("a+").unwrap();
//! let starts: Vec<usize> =
//!     re.find_iter("a aa aaa").map(|m| m.unwrap().start()).collect();
//! assert_eq!(starts, vec![0, 2, 5]);
//! ```
//!
//! [`Regex::test`] asks whether the *entire* input matches, independent of
//! any `^`/`$` in the pattern:
//!
//! ```
//! use ecma_regex::Regex;
//!
//! let re = Regex::new("exact").unwrap();
//! assert!(re.test("exact").unwrap());
//! assert!(!re.test("exactly").unwrap());
//! ```
//!
//! # Resource bounds
//!
//! Execution counts every VM instruction against
//! [`CompileOptions::max_steps`] and every lookaround/atomic nesting
//! level against [`CompileOptions::max_recursion_depth`]; exceeding
//! either aborts the call with [`Error::StepLimit`] or
//! [`Error::RecursionLimit`]. The defaults are one million steps and a
//! depth of 1000.

pub use crate::error::Error;
pub use crate::program::{CompileOptions, OptLevel};
pub use crate::re::{escape, Match, Matches, Regex};

mod ast;
mod bitset;
mod char;
mod compile;
mod error;
mod input;
mod inst;
mod lexer;
mod literals;
mod nfa;
mod optimize;
mod parser;
mod pool;
mod program;
mod re;
