//! Execution engine for code stored in a cortex brain.
//!
//! Programs are graph structure: statements, conditionals and code blocks
//! are clusters in the brain, and a [`Processor`] walks them one expression
//! per step. Many processors run concurrently against one shared
//! [`Brain`](cortex_core::Brain); a [`ProcessorPool`] bounds how many exist
//! and reports when the brain becomes busy or quiescent.
//!
//! # Modules
//!
//! - [`processor`]: the interpreter, its stacks and call frames
//! - [`value`]: instruction results and the numeric tower
//! - [`pool`]: ProcessorPool and the pooled-processor guard
//! - [`builder`]: CodeBuilder for assembling code in the brain
//! - [`config`]: ProcessorConfig, PoolConfig, EngineConfig
//! - [`trace`]: optional per-instruction execution trace
//! - [`error`]: InstructionError and ExecError

pub mod builder;
pub mod config;
pub mod error;
mod instructions;
pub mod pool;
pub mod processor;
pub mod trace;
pub mod value;

// Re-export commonly used types
pub use builder::CodeBuilder;
pub use config::{ConfigError, EngineConfig, PoolConfig, ProcessorConfig};
pub use error::{ExecError, InstructionError};
pub use pool::{PoolStatus, PooledProcessor, ProcessorPool};
pub use processor::{FrameKind, Globals, Operand, Processor};
pub use trace::{TraceEntry, TracedValue};
pub use value::{Number, Outcome};
