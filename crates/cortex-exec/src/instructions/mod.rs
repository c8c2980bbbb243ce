//! The instruction families.
//!
//! [`execute`] routes an opcode to its family. Argument counts are checked
//! before dispatch. Instructions with `resolves_arguments` receive the
//! concatenated results of their argument expressions; the others (the
//! arithmetic and logic operators, `Union`/`Intersect`/`Complement`,
//! `PopValue`, `ReturnValueIf`) receive the raw expressions and evaluate
//! them through the typed paths themselves.
//!
//! Argument order conventions:
//! - the list owner comes first (cluster, or `from, to, meaning` for info)
//! - an inserted or replacing neuron comes before its index
//!
//! Mutating instructions validate everything they can before the first
//! change, so a failing instruction leaves the graph untouched.

mod arithmetic;
mod children;
mod info;
mod links;
mod lists;
mod neurons;
mod stack;
mod timer;

use cortex_core::{Brain, CoreError, Family, NeuronId, NeuronKind, Opcode, Payload};

use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(crate) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    match op.family() {
        Family::Children => children::execute(p, op, args),
        Family::Links => links::execute(p, op, args),
        Family::Info => info::execute(p, op, args),
        Family::Neurons => neurons::execute(p, op, args),
        Family::Arithmetic => arithmetic::execute(p, op, args),
        Family::Lists => lists::execute(p, op, args),
        Family::Stack => stack::execute(p, op, args),
        Family::Timer => timer::execute(p, op, args),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Maps graph errors for `op`, keeping lookup misses distinguishable.
fn core(op: Opcode) -> impl Fn(CoreError) -> InstructionError {
    move |e| InstructionError::from_core(op, e)
}

fn neurons(brain: &Brain, items: impl IntoIterator<Item = NeuronId>) -> Outcome {
    Outcome::Neurons(brain.factories().ids.checkout_from(items))
}

/// A list result that is expected to hold one element; an empty source is
/// a lookup miss.
fn one(brain: &Brain, op: Opcode, item: Option<NeuronId>, what: &str) -> Result<Outcome, InstructionError> {
    match item {
        Some(id) => Ok(neurons(brain, [id])),
        None => Err(InstructionError::miss(op, what.to_string())),
    }
}

/// Reads an index argument: an int (or double) neuron, not negative.
fn index(p: &Processor, op: Opcode, args: &[NeuronId], position: usize) -> Result<usize, InstructionError> {
    let id = args[position];
    let value = p
        .number_of(id)?
        .ok_or(InstructionError::ArgumentKind {
            op,
            position,
            expected: "int",
            found: id,
        })?
        .as_i64();
    usize::try_from(value).map_err(|_| InstructionError::IndexOutOfRange { op, index: value, len: 0 })
}

/// Requires `id` to be of kind `expected`.
fn expect_kind(
    brain: &Brain,
    op: Opcode,
    id: NeuronId,
    position: usize,
    expected: NeuronKind,
    name: &'static str,
) -> Result<(), InstructionError> {
    if brain.kind_of(id).map_err(core(op))? == expected {
        Ok(())
    } else {
        Err(InstructionError::ArgumentKind {
            op,
            position,
            expected: name,
            found: id,
        })
    }
}

/// Human-readable form of a neuron: its text or number, else its id.
fn render(brain: &Brain, id: NeuronId) -> String {
    match brain.payload(id) {
        Ok(Payload::Text(s)) => s,
        Ok(Payload::Int(v)) => v.to_string(),
        Ok(Payload::Double(v)) => v.to_string(),
        _ => format!("#{id}"),
    }
}

fn unsupported(op: Opcode, family: &str) -> InstructionError {
    InstructionError::miss(op, format!("not a {family} instruction"))
}
