//! Set and sequence operations over result lists.
//!
//! `Union`, `Intersect` and `Complement` evaluate each argument to its own
//! list; the others work on the concatenation of all arguments. Results keep
//! first-occurrence order.

use std::collections::HashSet;
use std::sync::Arc;

use cortex_core::{NeuronId, Opcode};

use super::{neurons, one, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());

    let outcome = match op {
        Opcode::Union => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for &expr in args {
                let list = p.eval_list(expr)?;
                out.extend(list.iter().copied().filter(|&id| seen.insert(id)));
            }
            neurons(&brain, out)
        }
        Opcode::Intersect => {
            let mut lists = Vec::with_capacity(args.len());
            for &expr in args {
                lists.push(p.eval_list(expr)?);
            }
            let (first, rest) = lists.split_first().ok_or(InstructionError::ArgumentCount {
                op,
                expected: op.arg_count(),
                found: 0,
            })?;
            let rest: Vec<HashSet<NeuronId>> = rest.iter().map(|l| l.iter().copied().collect()).collect();
            let mut seen = HashSet::new();
            let common = first
                .iter()
                .copied()
                .filter(|id| rest.iter().all(|set| set.contains(id)))
                .filter(|&id| seen.insert(id));
            neurons(&brain, common.collect::<Vec<_>>())
        }
        Opcode::Complement => {
            let items = p.eval_list(args[0])?;
            let removed: HashSet<NeuronId> = p.eval_list(args[1])?.iter().copied().collect();
            neurons(&brain, items.iter().copied().filter(|id| !removed.contains(id)).collect::<Vec<_>>())
        }
        Opcode::Distinct => {
            let mut seen = HashSet::new();
            neurons(&brain, args.iter().copied().filter(|&id| seen.insert(id)))
        }
        Opcode::First => one(&brain, op, args.first().copied(), "empty list")?,
        Opcode::Last => one(&brain, op, args.last().copied(), "empty list")?,
        Opcode::Reverse => neurons(&brain, args.iter().rev().copied()),
        other => return Err(unsupported(other, "list")),
    };
    Ok(outcome)
}
