//! Expression evaluation.
//!
//! [`Processor::eval_list`] is the generic path: every expression yields a
//! list of neurons, and numeric or boolean instruction results are
//! materialized as a temporary neuron or as `True`/`False`. The typed paths
//! ([`Processor::eval_operand`] and the number/truth helpers built on it)
//! read the raw [`Outcome`] instead, so arithmetic nested in arithmetic
//! never creates neurons. Both paths observe the same value.

use cortex_core::{Aspect, LinkKey, NeuronId, NeuronKind, Payload, Pooled, Predefined};

use super::{FrameKind, Processor};
use crate::error::{ExecError, InstructionError};
use crate::value::{Number, Outcome};

/// An evaluated operand, as seen by arithmetic and comparison.
#[derive(Debug)]
pub enum Operand {
    Number(Number),
    Bool(bool),
    /// Anything else: a list of neurons (possibly empty).
    List(Pooled<NeuronId>),
}

impl Operand {
    pub fn truth(&self) -> bool {
        match self {
            Operand::Bool(b) => *b,
            Operand::Number(n) => n.as_f64() != 0.0,
            Operand::List(list) => !list.is_empty(),
        }
    }
}

impl Processor {
    // -----------------------------------------------------------------------
    // Generic path
    // -----------------------------------------------------------------------

    /// Evaluates `expr` to its result list.
    pub(crate) fn eval_list(&mut self, expr: NeuronId) -> Result<Pooled<NeuronId>, InstructionError> {
        self.enter_eval()?;
        let out = self.eval_list_inner(expr);
        self.eval_depth -= 1;
        out
    }

    fn eval_list_inner(&mut self, expr: NeuronId) -> Result<Pooled<NeuronId>, InstructionError> {
        let mut list = self.brain.factories().id_list();
        let kind = match self.brain.kind_of(expr) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(%expr, error = %e, "cannot evaluate expression");
                return Ok(list);
            }
        };
        match kind {
            NeuronKind::ResultStatement => {
                let outcome = self.run_statement(expr)?;
                return self.materialize(outcome);
            }
            NeuronKind::Statement => {
                self.run_statement(expr)?;
            }
            NeuronKind::Assignment => return self.assign(expr),
            NeuronKind::Variable => list.extend(self.variable_value(expr)),
            NeuronKind::Global => list.extend(self.global_value(expr)),
            _ => list.push(expr),
        }
        Ok(list)
    }

    /// Evaluates each expression and concatenates the results, collecting
    /// them in a buffer on the argument stack.
    pub(crate) fn resolve(&mut self, exprs: &[NeuronId]) -> Result<Pooled<NeuronId>, InstructionError> {
        self.args.push(self.brain.factories().id_list());
        for &expr in exprs {
            match self.eval_list(expr) {
                Ok(values) => {
                    if let Some(top) = self.args.last_mut() {
                        top.extend_from_slice(&values);
                    }
                }
                Err(e) => {
                    self.args.pop();
                    return Err(e);
                }
            }
        }
        Ok(self.args.pop().unwrap_or_else(|| self.brain.factories().id_list()))
    }

    /// Turns an instruction result into a neuron list.
    pub(crate) fn materialize(&mut self, outcome: Outcome) -> Result<Pooled<NeuronId>, InstructionError> {
        let mut list = self.brain.factories().id_list();
        match outcome {
            Outcome::Empty => {}
            Outcome::Neurons(neurons) => return Ok(neurons),
            Outcome::Int(v) => list.push(self.temporary(NeuronKind::Int, Payload::Int(v))?),
            Outcome::Double(v) => list.push(self.temporary(NeuronKind::Double, Payload::Double(v))?),
            Outcome::Bool(b) => list.push(Predefined::boolean(b)),
        }
        Ok(list)
    }

    /// Creates a temporary owned by this processor.
    pub(crate) fn temporary(&mut self, kind: NeuronKind, payload: Payload) -> Result<NeuronId, InstructionError> {
        let id = self.brain.create_temporary(kind, payload)?;
        self.temporaries.push(id);
        Ok(id)
    }

    fn enter_eval(&mut self) -> Result<(), InstructionError> {
        if self.eval_depth >= self.config.max_frames {
            return Err(ExecError::FrameLimit {
                limit: self.config.max_frames,
            }
            .into());
        }
        self.eval_depth += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Typed paths
    // -----------------------------------------------------------------------

    /// Evaluates `expr` without materializing numeric or boolean results.
    pub(crate) fn eval_operand(&mut self, expr: NeuronId) -> Result<Operand, InstructionError> {
        self.enter_eval()?;
        let out = self.eval_operand_inner(expr);
        self.eval_depth -= 1;
        out
    }

    fn eval_operand_inner(&mut self, expr: NeuronId) -> Result<Operand, InstructionError> {
        if let Some(b) = as_boolean(expr) {
            return Ok(Operand::Bool(b));
        }
        match self.brain.kind_of(expr)? {
            NeuronKind::Int | NeuronKind::Double => {
                let payload = self.brain.payload(expr)?;
                Ok(Number::from_payload(&payload).map_or_else(|| Operand::List(self.single(expr)), Operand::Number))
            }
            NeuronKind::ResultStatement => match self.run_statement(expr)? {
                Outcome::Int(v) => Ok(Operand::Number(Number::Int(v))),
                Outcome::Double(v) => Ok(Operand::Number(Number::Double(v))),
                Outcome::Bool(b) => Ok(Operand::Bool(b)),
                Outcome::Empty => Ok(Operand::List(self.brain.factories().id_list())),
                Outcome::Neurons(list) => self.classify(list),
            },
            NeuronKind::Statement | NeuronKind::Assignment | NeuronKind::Variable | NeuronKind::Global => {
                let list = self.eval_list_inner(expr)?;
                self.classify(list)
            }
            _ => Ok(Operand::List(self.single(expr))),
        }
    }

    /// A single numeric or boolean neuron counts as that value.
    fn classify(&self, list: Pooled<NeuronId>) -> Result<Operand, InstructionError> {
        if let &[only] = &list[..] {
            if let Some(b) = as_boolean(only) {
                return Ok(Operand::Bool(b));
            }
            if let Some(n) = self.number_of(only)? {
                return Ok(Operand::Number(n));
            }
        }
        Ok(Operand::List(list))
    }

    /// The number stored in `id`, if it is a numeric neuron.
    pub(crate) fn number_of(&self, id: NeuronId) -> Result<Option<Number>, InstructionError> {
        match self.brain.kind_of(id)? {
            NeuronKind::Int | NeuronKind::Double => Ok(Number::from_payload(&self.brain.payload(id)?)),
            _ => Ok(None),
        }
    }

    pub(crate) fn eval_number(&mut self, expr: NeuronId) -> Result<Option<Number>, InstructionError> {
        match self.eval_operand(expr)? {
            Operand::Number(n) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    pub(crate) fn eval_truth(&mut self, expr: NeuronId) -> Result<bool, InstructionError> {
        Ok(self.eval_operand(expr)?.truth())
    }

    fn single(&self, id: NeuronId) -> Pooled<NeuronId> {
        self.brain.factories().ids.checkout_from([id])
    }

    // -----------------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------------

    fn variable_value(&self, variable: NeuronId) -> Vec<NeuronId> {
        if !is_system_variable(variable) {
            return self.locals.get(&variable).cloned().unwrap_or_default();
        }
        let Some(key) = self.current_link() else {
            tracing::warn!(%variable, "system variable read outside of a solved link");
            return Vec::new();
        };
        if variable == Predefined::CurrentFrom.id() {
            vec![key.from]
        } else if variable == Predefined::CurrentTo.id() {
            vec![key.to]
        } else if variable == Predefined::CurrentMeaning.id() {
            vec![key.meaning]
        } else {
            self.brain.info(key).unwrap_or_else(|e| {
                tracing::warn!(%key, error = %e, "current link has no info");
                Vec::new()
            })
        }
    }

    fn global_value(&self, global: NeuronId) -> Vec<NeuronId> {
        self.globals.lock().get(&global).cloned().unwrap_or_default()
    }

    /// The link being solved by the innermost link frame.
    pub(crate) fn current_link(&self) -> Option<LinkKey> {
        self.frames.iter().rev().find_map(|f| match f.kind {
            FrameKind::Link { key } => Some(key),
            _ => None,
        })
    }

    /// Executes an assignment `[variable, expressions...]` and returns the
    /// assigned list.
    pub(crate) fn assign(&mut self, assignment: NeuronId) -> Result<Pooled<NeuronId>, InstructionError> {
        let items = match self.brain.snapshot_ids(assignment, Aspect::Children) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(%assignment, error = %e, "cannot read assignment");
                return Ok(self.brain.factories().id_list());
            }
        };
        let Some((&target, exprs)) = items.split_first() else {
            tracing::warn!(%assignment, "assignment without target");
            return Ok(self.brain.factories().id_list());
        };
        let values = self.resolve(exprs)?;
        match self.brain.kind_of(target) {
            Ok(NeuronKind::Variable) if is_system_variable(target) => {
                tracing::warn!(%assignment, variable = %target, "system variables are read-only");
            }
            Ok(NeuronKind::Variable) => {
                self.locals.insert(target, values.to_vec());
            }
            Ok(NeuronKind::Global) => {
                self.globals.lock().insert(target, values.to_vec());
            }
            Ok(kind) => tracing::warn!(%assignment, target = %target, ?kind, "assignment target is not a variable"),
            Err(e) => tracing::warn!(%assignment, error = %e, "assignment target missing"),
        }
        Ok(values)
    }

    /// Binds a local variable, saving the previous binding in the nearest
    /// callable frame so it comes back when that frame exits.
    pub(crate) fn bind_saved(&mut self, variable: NeuronId, values: Vec<NeuronId>) {
        let previous = self.locals.insert(variable, values);
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.kind.is_callable()) {
            frame.saved.push((variable, previous));
        }
    }

    pub(crate) fn bind_local(&mut self, variable: NeuronId, values: Vec<NeuronId>) {
        self.locals.insert(variable, values);
    }
}

pub(crate) fn is_system_variable(id: NeuronId) -> bool {
    [
        Predefined::CurrentFrom,
        Predefined::CurrentTo,
        Predefined::CurrentMeaning,
        Predefined::CurrentInfo,
    ]
    .iter()
    .any(|p| p.id() == id)
}

fn as_boolean(id: NeuronId) -> Option<bool> {
    if id == Predefined::True.id() {
        Some(true)
    } else if id == Predefined::False.id() {
        Some(false)
    } else {
        None
    }
}

/// Value equality used by `Equal` and `Case`: numbers by value, booleans by
/// truth, texts by content, other lists element-wise.
pub(crate) fn operands_equal(processor: &Processor, a: &Operand, b: &Operand) -> bool {
    match (a, b) {
        (Operand::Number(x), Operand::Number(y)) => x.compare(*y) == Some(std::cmp::Ordering::Equal),
        (Operand::Bool(x), Operand::Bool(y)) => x == y,
        (Operand::List(x), Operand::List(y)) => {
            if x[..] == y[..] {
                return true;
            }
            match (&x[..], &y[..]) {
                ([p], [q]) => match (processor.brain.payload(*p), processor.brain.payload(*q)) {
                    (Ok(Payload::Text(s)), Ok(Payload::Text(t))) => s == t,
                    _ => false,
                },
                _ => false,
            }
        }
        _ => false,
    }
}
