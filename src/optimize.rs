use crate::bitset::ClassSet;
use crate::inst::{Inst, SplitKind};
use crate::program::OptLevel;

/// Run the peephole passes for the requested level over an instruction
/// list with index-based targets.
///
/// Every pass preserves program semantics, including capture indices:
/// transformations are limited to control-flow shortening and merging of
/// single-character alternatives. Literal-prefix extraction (the rest of
/// the aggressive level) happens after encoding, in `literals`.
pub fn optimize(insts: Vec<Inst>, level: OptLevel) -> Vec<Inst> {
    match level {
        OptLevel::None => insts,
        OptLevel::Basic | OptLevel::Aggressive => {
            let mut insts = insts;
            // Each fold can expose another foldable split one level up a
            // right-leaning alternation, so iterate to a fixpoint; every
            // round removes a split, so this terminates.
            loop {
                collapse_gotos(&mut insts);
                if !fold_char_splits(&mut insts) {
                    break;
                }
            }
            remove_unreachable(insts)
        }
    }
}

/// Shorten every branch that lands on a `GOTO` to that goto's final
/// destination.
fn collapse_gotos(insts: &mut [Inst]) {
    let resolve = |mut target: usize, insts: &[Inst]| -> usize {
        // The hop count bound breaks goto cycles; a cycle means the
        // program can never leave it anyway.
        for _ in 0..insts.len() {
            match insts[target] {
                Inst::Goto(next) => target = next,
                _ => break,
            }
        }
        target
    };
    for i in 0..insts.len() {
        match insts[i] {
            Inst::Goto(t) => insts[i] = Inst::Goto(resolve(t, insts)),
            Inst::Split { kind, goto1, goto2 } => {
                insts[i] = Inst::Split {
                    kind,
                    goto1: resolve(goto1, insts),
                    goto2: resolve(goto2, insts),
                }
            }
            Inst::Loop { counter, max, back } => {
                insts[i] = Inst::Loop { counter, max, back: resolve(back, insts) }
            }
            _ => {}
        }
    }
}

/// Fold `SPLIT; L1: <char> ; GOTO T; L2: <char>` where both arms converge
/// on `T` into a single character-class instruction. Returns true if any
/// split was folded.
///
/// Only plain (alternation) splits qualify; quantifier splits carry fork
/// semantics the merge would destroy.
fn fold_char_splits(insts: &mut Vec<Inst>) -> bool {
    let mut changed = false;
    for i in 0..insts.len() {
        let (goto1, goto2) = match insts[i] {
            Inst::Split { kind: SplitKind::Plain, goto1, goto2 } => (goto1, goto2),
            _ => continue,
        };
        // The generator always lays the first alternative right after the
        // split, which leaves room to splice in a goto behind the merge.
        if goto1 != i + 1 {
            continue;
        }
        let (set1, out1) = match char_arm(insts, goto1) {
            Some(arm) => arm,
            None => continue,
        };
        let (set2, out2) = match char_arm(insts, goto2) {
            Some(arm) => arm,
            None => continue,
        };
        if out1 != out2 {
            continue;
        }
        let mut set = set1;
        set.union(&set2);
        insts[i] = Inst::Class { set, inverted: false };
        insts[i + 1] = Inst::Goto(out1);
        changed = true;
    }
    changed
}

/// A single non-inverted character instruction at `pc`, as a class table
/// plus the instruction both alternatives continue at.
fn char_arm(insts: &[Inst], pc: usize) -> Option<(ClassSet, usize)> {
    let set = match insts[pc] {
        Inst::Char(c) => {
            let mut set = ClassSet::new();
            set.insert(c);
            set
        }
        Inst::Range { lo, hi, inverted: false } => {
            let mut set = ClassSet::new();
            set.insert_range(lo, hi);
            set
        }
        Inst::Class { set, inverted: false } => set,
        _ => return None,
    };
    let out = match insts.get(pc + 1) {
        Some(&Inst::Goto(t)) => t,
        _ => pc + 1,
    };
    Some((set, out))
}

/// Drop everything unreachable from the program entry (dead alternates
/// left by folding, code after `MATCH`) and re-resolve targets.
fn remove_unreachable(insts: Vec<Inst>) -> Vec<Inst> {
    let mut reachable = vec![false; insts.len()];
    let mut stack = vec![0usize];
    while let Some(pc) = stack.pop() {
        if pc >= insts.len() || reachable[pc] {
            continue;
        }
        reachable[pc] = true;
        match insts[pc] {
            Inst::Match => {}
            Inst::Goto(t) => stack.push(t),
            Inst::Split { goto1, goto2, .. } => {
                stack.push(goto1);
                stack.push(goto2);
            }
            Inst::Loop { back, .. } => {
                stack.push(back);
                stack.push(pc + 1);
            }
            Inst::Look { end, .. } => {
                stack.push(pc + 1);
                stack.push(end);
            }
            _ => stack.push(pc + 1),
        }
    }

    let mut remap = vec![usize::MAX; insts.len()];
    let mut kept = 0usize;
    for (i, &r) in reachable.iter().enumerate() {
        if r {
            remap[i] = kept;
            kept += 1;
        }
    }
    insts
        .into_iter()
        .enumerate()
        .filter(|&(i, _)| reachable[i])
        .map(|(_, inst)| match inst {
            Inst::Goto(t) => Inst::Goto(remap[t]),
            Inst::Split { kind, goto1, goto2 } => {
                Inst::Split { kind, goto1: remap[goto1], goto2: remap[goto2] }
            }
            Inst::Loop { counter, max, back } => {
                Inst::Loop { counter, max, back: remap[back] }
            }
            Inst::Look { kind, end, width } => Inst::Look { kind, end: remap[end], width },
            inst => inst,
        })
        .collect()
}
