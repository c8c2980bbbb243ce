//! Error types for the processor.
//!
//! Two levels exist. [`InstructionError`] is local to one instruction: the
//! processor logs it and the instruction yields an empty result, so a
//! malformed statement never stops the program. [`ExecError`] is fatal to a
//! run: frame or step limits, a root that cannot be executed, or an
//! instruction failure the host asked to escalate.

use cortex_core::{ArgCount, CoreError, LockError, NeuronId, NeuronKind, Opcode};
use thiserror::Error;

/// Failure of a single instruction.
#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("{op} expects {expected:?} argument(s), got {found}")]
    ArgumentCount {
        op: Opcode,
        expected: ArgCount,
        found: usize,
    },

    #[error("{op} argument {position}: expected {expected}, got {found}")]
    ArgumentKind {
        op: Opcode,
        position: usize,
        expected: &'static str,
        found: NeuronId,
    },

    #[error("{op} index {index} out of range (len {len})")]
    IndexOutOfRange { op: Opcode, index: i64, len: usize },

    /// Nothing matched: an empty list, a missing link, an unbound stack.
    #[error("{op}: {what}")]
    LookupMiss { op: Opcode, what: String },

    #[error("{op}: arithmetic overflow")]
    Overflow { op: Opcode },

    #[error("{op}: division by zero")]
    DivideByZero { op: Opcode },

    #[error("{op} used outside of an enclosing {construct}")]
    NoEnclosing { op: Opcode, construct: &'static str },

    #[error("{id} is {kind:?}, not an instruction")]
    NotAnInstruction { id: NeuronId, kind: NeuronKind },

    #[error("statement {statement} has no instruction")]
    EmptyStatement { statement: NeuronId },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// A nested evaluation hit a fatal condition; it aborts the whole run.
    #[error(transparent)]
    Fatal(Box<ExecError>),
}

impl InstructionError {
    pub(crate) fn miss(op: Opcode, what: impl Into<String>) -> Self {
        InstructionError::LookupMiss { op, what: what.into() }
    }

    /// Lookup misses from the graph are reported as such.
    pub(crate) fn from_core(op: Opcode, e: CoreError) -> Self {
        if e.is_lookup_miss() {
            InstructionError::miss(op, e.to_string())
        } else {
            InstructionError::Core(e)
        }
    }
}

impl From<ExecError> for InstructionError {
    fn from(e: ExecError) -> Self {
        InstructionError::Fatal(Box::new(e))
    }
}

/// Failure that aborts a processor run.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("frame limit ({limit}) exceeded")]
    FrameLimit { limit: usize },

    #[error("step limit ({limit}) exceeded")]
    StepLimit { limit: u64 },

    #[error("{id} ({kind:?}) cannot be executed")]
    NotExecutable { id: NeuronId, kind: NeuronKind },

    #[error("{stack} stack is empty")]
    EmptyStack { stack: &'static str },

    /// An instruction failed while the processor escalates instruction
    /// errors, or a host-level evaluation could not start.
    #[error("statement {statement} failed: {source}")]
    Instruction {
        statement: NeuronId,
        #[source]
        source: InstructionError,
    },

    #[error("no processor became available within {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("run cancelled before it started")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),
}
