//! Execution trace recording.
//!
//! When [`ProcessorConfig::trace_enabled`](crate::ProcessorConfig) is set,
//! the processor records a [`TraceEntry`] for every dispatched instruction,
//! capturing the statement, its opcode, the arguments it received and what
//! it produced.

use cortex_core::{NeuronId, Opcode};

use crate::value::Outcome;

/// A single entry in the execution trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// The statement whose instruction ran.
    pub statement: NeuronId,
    pub op: Opcode,
    /// Resolved arguments, or the raw argument expressions for instructions
    /// that evaluate their own operands.
    pub arguments: Vec<NeuronId>,
    pub result: TracedValue,
    /// Call-frame depth at dispatch.
    pub depth: usize,
}

/// Owned copy of an [`Outcome`].
#[derive(Debug, Clone, PartialEq)]
pub enum TracedValue {
    None,
    Neurons(Vec<NeuronId>),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl From<&Outcome> for TracedValue {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Empty => TracedValue::None,
            Outcome::Neurons(list) => TracedValue::Neurons(list.to_vec()),
            Outcome::Int(v) => TracedValue::Int(*v),
            Outcome::Double(v) => TracedValue::Double(*v),
            Outcome::Bool(v) => TracedValue::Bool(*v),
        }
    }
}
