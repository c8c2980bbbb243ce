//! The processor: a stack machine executing code stored in the brain.
//!
//! A processor walks code clusters one expression per [`step`](Processor::step).
//! Its state is a handful of explicit stacks:
//!
//! - the instruction stack: code blocks, each a [`Selection`] snapshot of a
//!   statement list with a cursor
//! - the call-frame stack: one [`Frame`] per call, solved link, branch or
//!   loop, owning the blocks pushed above its base and the bindings it
//!   must restore
//! - the argument stack: pooled buffers collecting resolved arguments
//! - the return-values stack, filled by `Return`
//! - the neuron stack (`Push`/`Pop`/`Peek`, consumed by `Solve`) and the
//!   value stack (`PushValue`/`PopValue`)
//!
//! Expressions nested inside statements are evaluated recursively; calls
//! and solved links run synchronously by stepping until their frame is
//! gone. Instruction failures are logged and yield an empty result; only
//! limits and escalated failures abort a run with an [`ExecError`].

mod control;
mod eval;
mod frame;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use cortex_core::{Brain, NeuronId, NeuronKind, Pooled, Selection};

use crate::config::ProcessorConfig;
use crate::error::{ExecError, InstructionError};
use crate::trace::TraceEntry;

pub(crate) use eval::{is_system_variable, operands_equal};
pub use eval::Operand;
pub use frame::FrameKind;
pub(crate) use frame::Frame;

/// Bindings of global variables, shared by a processor and its duplicates.
pub type Globals = Arc<Mutex<HashMap<NeuronId, Vec<NeuronId>>>>;

/// A single-threaded executor of graph-resident code.
pub struct Processor {
    brain: Arc<Brain>,
    config: ProcessorConfig,
    blocks: Vec<Selection<NeuronId>>,
    frames: Vec<Frame>,
    args: Vec<Pooled<NeuronId>>,
    returns: Vec<Vec<NeuronId>>,
    pub(crate) neurons: Vec<NeuronId>,
    pub(crate) values: Vec<Vec<NeuronId>>,
    locals: HashMap<NeuronId, Vec<NeuronId>>,
    globals: Globals,
    /// Temporaries created by this processor, released on reset.
    temporaries: Vec<NeuronId>,
    pub(crate) rng: ChaCha8Rng,
    steps: u64,
    /// Depth of nested expression evaluation.
    eval_depth: usize,
    trace: Option<Vec<TraceEntry>>,
    log: Vec<String>,
}

impl Processor {
    pub fn new(brain: Arc<Brain>, config: ProcessorConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let trace = config.trace_enabled.then(Vec::new);
        Processor {
            brain,
            config,
            blocks: Vec::new(),
            frames: Vec::new(),
            args: Vec::new(),
            returns: Vec::new(),
            neurons: Vec::new(),
            values: Vec::new(),
            locals: HashMap::new(),
            globals: Arc::new(Mutex::new(HashMap::new())),
            temporaries: Vec::new(),
            rng,
            steps: 0,
            eval_depth: 0,
            trace,
            log: Vec::new(),
        }
    }

    pub fn brain(&self) -> &Arc<Brain> {
        &self.brain
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Runs `root` to completion and returns the values published by a
    /// top-level `Return` (empty if none).
    ///
    /// `root` is either a code cluster, whose children are executed in
    /// order, or a single expression.
    pub fn run(&mut self, root: NeuronId) -> Result<Vec<NeuronId>, ExecError> {
        self.start(root)?;
        self.resume()
    }

    /// Opens a root frame for `root` without executing anything.
    pub fn start(&mut self, root: NeuronId) -> Result<(), ExecError> {
        let kind = self.brain.kind_of(root)?;
        let block = match kind {
            NeuronKind::Cluster => Selection::children(&self.brain, root)?,
            k if k.is_expression() => Selection::single(&self.brain, root),
            kind => return Err(ExecError::NotExecutable { id: root, kind }),
        };
        if self.frames.is_empty() {
            self.steps = 0;
        }
        self.push_frame(FrameKind::Root).map_err(into_exec)?;
        self.blocks.push(block);
        tracing::debug!(%root, "run started");
        Ok(())
    }

    /// Executes one step. Returns `false` once no frame is left.
    pub fn step(&mut self) -> Result<bool, ExecError> {
        if self.frames.is_empty() {
            return Ok(false);
        }
        if let Err(e) = self.step_inner() {
            return Err(self.abort(e));
        }
        Ok(!self.frames.is_empty())
    }

    /// Steps until every frame is gone; returns the top-level result.
    pub fn resume(&mut self) -> Result<Vec<NeuronId>, ExecError> {
        if let Err(e) = self.run_until(0) {
            return Err(self.abort(e));
        }
        let result = self.returns.pop().unwrap_or_default();
        self.returns.clear();
        tracing::debug!(steps = self.steps, "run finished");
        Ok(result)
    }

    /// Calls `code` synchronously. Each argument is pushed as one entry on
    /// the value stack, the first argument on top, so the callee binds them
    /// with `PopValue`.
    pub fn call(&mut self, code: NeuronId, args: &[NeuronId]) -> Result<Vec<NeuronId>, ExecError> {
        self.host(|p| p.call_code(code, args).map(|list| list.to_vec()))
    }

    /// Solves `neuron`: pushes it on the neuron stack and runs the rule code
    /// of every outgoing link until the stack is back at its old height.
    pub fn solve(&mut self, neuron: NeuronId) -> Result<(), ExecError> {
        self.host(|p| {
            let base = p.neurons.len();
            p.neurons.push(neuron);
            p.solve_stack(base)
        })
    }

    /// Evaluates a single expression to its result list.
    pub fn evaluate(&mut self, expr: NeuronId) -> Result<Vec<NeuronId>, ExecError> {
        self.host(|p| p.eval_list(expr).map(|list| list.to_vec()))
    }

    /// Integer fast path: evaluates without materializing a result neuron.
    pub fn eval_int(&mut self, expr: NeuronId) -> Result<Option<i64>, ExecError> {
        self.host(|p| Ok(p.eval_number(expr)?.map(|n| n.as_i64())))
    }

    /// Double fast path.
    pub fn eval_double(&mut self, expr: NeuronId) -> Result<Option<f64>, ExecError> {
        self.host(|p| Ok(p.eval_number(expr)?.map(|n| n.as_f64())))
    }

    /// Boolean fast path.
    pub fn eval_bool(&mut self, expr: NeuronId) -> Result<bool, ExecError> {
        self.host(|p| p.eval_truth(expr))
    }

    /// Runs a host-level operation, unwinding whatever it opened on failure.
    fn host<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, InstructionError>) -> Result<R, ExecError> {
        if self.frames.is_empty() {
            self.steps = 0;
        }
        let depth = self.frames.len();
        let args = self.args.len();
        match f(self) {
            Ok(r) => Ok(r),
            Err(e) => {
                let e = into_exec(e);
                tracing::error!(error = %e, "processor operation aborted");
                self.unwind_to(depth);
                self.args.truncate(args);
                self.eval_depth = 0;
                Err(e)
            }
        }
    }

    fn abort(&mut self, e: InstructionError) -> ExecError {
        let e = into_exec(e);
        tracing::error!(error = %e, steps = self.steps, "processor run aborted");
        self.unwind_to(0);
        self.args.clear();
        self.returns.clear();
        self.eval_depth = 0;
        e
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// An independent continuation of this processor.
    ///
    /// The copy shares code and loop snapshots (each with its own cursor)
    /// and the global bindings; every stack is copied. Temporaries stay
    /// owned by the source processor, which releases them on reset.
    pub fn duplicate(&self) -> Processor {
        Processor {
            brain: Arc::clone(&self.brain),
            config: self.config.clone(),
            blocks: self.blocks.iter().map(Selection::duplicate).collect(),
            frames: self.frames.clone(),
            args: self
                .args
                .iter()
                .map(|a| self.brain.factories().ids.checkout_from(a.iter().copied()))
                .collect(),
            returns: self.returns.clone(),
            neurons: self.neurons.clone(),
            values: self.values.clone(),
            locals: self.locals.clone(),
            globals: Arc::clone(&self.globals),
            temporaries: Vec::new(),
            rng: self.rng.clone(),
            steps: self.steps,
            eval_depth: self.eval_depth,
            trace: self.trace.as_ref().map(|_| Vec::new()),
            log: Vec::new(),
        }
    }

    /// Clears every stack and binding and releases the temporaries this
    /// processor created, ready for reuse.
    pub fn reset(&mut self) {
        self.unwind_to(0);
        self.args.clear();
        self.returns.clear();
        self.neurons.clear();
        self.values.clear();
        self.locals.clear();
        self.steps = 0;
        self.eval_depth = 0;
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
        self.log.clear();
        self.release_temporaries();
    }

    fn release_temporaries(&mut self) {
        let released = self
            .temporaries
            .drain(..)
            .filter(|&id| self.brain.release_temporary(id))
            .count();
        if released > 0 {
            tracing::debug!(released, "temporaries released");
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Returns `true` when no run is in progress.
    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_kinds(&self) -> impl Iterator<Item = &FrameKind> {
        self.frames.iter().map(|f| &f.kind)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn neuron_stack(&self) -> &[NeuronId] {
        &self.neurons
    }

    pub fn value_stack(&self) -> &[Vec<NeuronId>] {
        &self.values
    }

    /// Takes the top of the neuron stack, for hosts collecting results
    /// pushed by a program.
    pub fn pop_neuron(&mut self) -> Result<NeuronId, ExecError> {
        self.neurons.pop().ok_or(ExecError::EmptyStack { stack: "neuron" })
    }

    /// Current binding of a local variable.
    pub fn binding(&self, variable: NeuronId) -> Option<&[NeuronId]> {
        self.locals.get(&variable).map(Vec::as_slice)
    }

    /// Binds a local variable from the host.
    pub fn bind(&mut self, variable: NeuronId, values: Vec<NeuronId>) {
        self.locals.insert(variable, values);
    }

    pub fn global(&self, variable: NeuronId) -> Option<Vec<NeuronId>> {
        self.globals.lock().get(&variable).cloned()
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Lines written by `Log`.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn temporaries(&self) -> &[NeuronId] {
        &self.temporaries
    }

    pub(crate) fn write_log(&mut self, line: String) {
        tracing::info!(target: "cortex::log", "{line}");
        self.log.push(line);
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.release_temporaries();
    }
}

/// Maps an error escaping a host-level operation onto [`ExecError`].
fn into_exec(e: InstructionError) -> ExecError {
    match e {
        InstructionError::Fatal(e) => *e,
        InstructionError::Core(e) => ExecError::Core(e),
        InstructionError::Lock(e) => ExecError::Core(e.into()),
        source => ExecError::Instruction {
            statement: NeuronId::EMPTY,
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CodeBuilder;
    use cortex_core::{Opcode, Predefined};

    fn processor() -> (Arc<Brain>, Processor) {
        let brain = Arc::new(Brain::new());
        let config = ProcessorConfig {
            random_seed: Some(1),
            ..ProcessorConfig::default()
        };
        let p = Processor::new(Arc::clone(&brain), config);
        (brain, p)
    }

    #[test]
    fn plain_neuron_is_not_executable() {
        let (brain, mut p) = processor();
        let n = brain.create(NeuronKind::Int);
        assert!(matches!(p.run(n), Err(ExecError::NotExecutable { .. })));
        assert!(p.is_idle());
    }

    #[test]
    fn step_walks_a_code_block() {
        let (brain, mut p) = processor();
        let b = CodeBuilder::new(&brain);
        let x = b.int(1).unwrap();
        let code = b
            .code(&[
                b.statement(Opcode::Push, &[x]).unwrap(),
                b.statement(Opcode::Push, &[x]).unwrap(),
            ])
            .unwrap();
        p.start(code).unwrap();
        assert!(p.step().unwrap());
        assert_eq!(p.neuron_stack(), &[x]);
        assert!(p.step().unwrap());
        // Exhausted block, then the root frame.
        while p.step().unwrap() {}
        assert_eq!(p.neuron_stack(), &[x, x]);
        assert!(p.is_idle());
    }

    #[test]
    fn reset_releases_temporaries() {
        let (brain, mut p) = processor();
        let b = CodeBuilder::new(&brain);
        let sum = b.result_statement(Opcode::Add, &[b.int(2).unwrap(), b.int(3).unwrap()]).unwrap();
        let out = p.evaluate(sum).unwrap();
        assert_eq!(out.len(), 1);
        assert!(brain.is_temporary(out[0]));
        assert_eq!(p.temporaries(), &out[..]);

        p.reset();
        assert!(!brain.contains(out[0]));
        assert!(p.temporaries().is_empty());
    }

    #[test]
    fn committed_temporaries_survive_reset() {
        let (brain, mut p) = processor();
        let b = CodeBuilder::new(&brain);
        let holder = brain.create(NeuronKind::Cluster);
        let sum = b.result_statement(Opcode::Add, &[b.int(2).unwrap(), b.int(3).unwrap()]).unwrap();
        let code = b.code(&[b.statement(Opcode::AddChild, &[holder, sum]).unwrap()]).unwrap();
        p.run(code).unwrap();
        p.reset();
        let children = brain.children(holder).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(brain.payload(children[0]).unwrap().as_int(), Some(5));
    }

    #[test]
    fn step_limit_is_fatal_and_unwinds() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(
            Arc::clone(&brain),
            ProcessorConfig {
                max_steps: 50,
                ..ProcessorConfig::default()
            },
        );
        let b = CodeBuilder::new(&brain);
        // A loop whose only part has no condition never ends on its own.
        let body = b.part(None, &[b.statement(Opcode::StackCount, &[]).unwrap()]).unwrap();
        let forever = b.conditional(cortex_core::ConditionalKind::Loop, &[body]).unwrap();
        let code = b.code(&[forever]).unwrap();
        assert!(matches!(p.run(code), Err(ExecError::StepLimit { limit: 50 })));
        assert!(p.is_idle());
        assert_eq!(p.frame_depth(), 0);
        // The processor stays usable.
        let ok = b.code(&[b.statement(Opcode::Push, &[Predefined::True.id()]).unwrap()]).unwrap();
        p.run(ok).unwrap();
        assert_eq!(p.neuron_stack(), &[Predefined::True.id()]);
    }
}
