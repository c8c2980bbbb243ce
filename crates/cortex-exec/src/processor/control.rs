//! Stepping, dispatch, conditionals and control transfer.

use cortex_core::{Aspect, ConditionalKind, LinkKey, NeuronId, NeuronKind, Opcode, Predefined, Selection};

use super::eval::operands_equal;
use super::{Frame, FrameKind, Processor};
use crate::error::{ExecError, InstructionError};
use crate::instructions;
use crate::trace::{TraceEntry, TracedValue};
use crate::value::Outcome;

impl Processor {
    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Executes the next expression of the top code block, or finishes the
    /// top frame once all of its blocks are exhausted.
    pub(crate) fn step_inner(&mut self) -> Result<(), InstructionError> {
        let Some(base) = self.frames.last().map(|f| f.block_base) else {
            return Ok(());
        };
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(ExecError::StepLimit {
                limit: self.config.max_steps,
            }
            .into());
        }
        if self.blocks.len() > base {
            match self.blocks.last_mut().and_then(|block| block.next()) {
                Some(expr) => self.execute(expr),
                None => {
                    self.blocks.pop();
                    Ok(())
                }
            }
        } else {
            self.advance_frame()
        }
    }

    pub(crate) fn run_until(&mut self, depth: usize) -> Result<(), InstructionError> {
        while self.frames.len() > depth {
            self.step_inner()?;
        }
        Ok(())
    }

    /// Executes one expression in statement position.
    fn execute(&mut self, expr: NeuronId) -> Result<(), InstructionError> {
        let kind = match self.brain.kind_of(expr) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(%expr, error = %e, "skipping missing expression");
                return Ok(());
            }
        };
        match kind {
            NeuronKind::Statement | NeuronKind::ResultStatement => {
                self.run_statement(expr)?;
            }
            NeuronKind::Assignment => {
                self.assign(expr)?;
            }
            NeuronKind::Conditional(kind) => self.enter_conditional(expr, kind)?,
            NeuronKind::Cluster => {
                if self.brain.meaning(expr).ok().flatten() == Some(Predefined::Code.id()) {
                    self.push_block(expr);
                } else {
                    tracing::debug!(%expr, "cluster without code meaning skipped");
                }
            }
            kind => tracing::debug!(%expr, ?kind, "not executable, skipped"),
        }
        Ok(())
    }

    /// Runs the instruction of a statement `[instruction, args...]`.
    ///
    /// The statement's children are snapshotted once, so edits made by the
    /// instruction itself land on the next execution.
    pub(crate) fn run_statement(&mut self, statement: NeuronId) -> Result<Outcome, InstructionError> {
        let items = match self.brain.snapshot_ids(statement, Aspect::Children) {
            Ok(items) => items,
            Err(e) => return self.recover(statement, e.into()),
        };
        let Some((&instruction, exprs)) = items.split_first() else {
            return self.recover(statement, InstructionError::EmptyStatement { statement });
        };
        let op = match self.brain.kind_of(instruction) {
            Ok(NeuronKind::Instruction(op)) => op,
            Ok(kind) => {
                return self.recover(statement, InstructionError::NotAnInstruction { id: instruction, kind });
            }
            Err(e) => return self.recover(statement, e.into()),
        };
        self.dispatch(op, statement, exprs)
    }

    fn dispatch(&mut self, op: Opcode, statement: NeuronId, exprs: &[NeuronId]) -> Result<Outcome, InstructionError> {
        let mut traced = Vec::new();
        let result = if op.resolves_arguments() {
            match self.resolve(exprs) {
                Ok(args) => {
                    if self.trace.is_some() {
                        traced = args.to_vec();
                    }
                    check_count(op, args.len()).and_then(|()| instructions::execute(self, op, &args))
                }
                Err(e) => Err(e),
            }
        } else {
            if self.trace.is_some() {
                traced = exprs.to_vec();
            }
            check_count(op, exprs.len()).and_then(|()| instructions::execute(self, op, exprs))
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => self.recover(statement, e)?,
        };
        tracing::debug!(%statement, %op, "dispatched");
        let depth = self.frames.len();
        if let Some(trace) = &mut self.trace {
            trace.push(TraceEntry {
                statement,
                op,
                arguments: traced,
                result: TracedValue::from(&outcome),
                depth,
            });
        }
        Ok(outcome)
    }

    /// Logs a failed instruction and yields an empty result, unless the
    /// failure is fatal or the processor escalates errors.
    fn recover(&self, statement: NeuronId, e: InstructionError) -> Result<Outcome, InstructionError> {
        match e {
            InstructionError::Fatal(_) => Err(e),
            source if self.config.escalate_errors => {
                Err(ExecError::Instruction { statement, source }.into())
            }
            e => {
                tracing::warn!(%statement, error = %e, "instruction failed");
                Ok(Outcome::Empty)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Frames and blocks
    // -----------------------------------------------------------------------

    pub(crate) fn push_frame(&mut self, kind: FrameKind) -> Result<(), InstructionError> {
        if self.frames.len() >= self.config.max_frames {
            return Err(ExecError::FrameLimit {
                limit: self.config.max_frames,
            }
            .into());
        }
        self.frames.push(Frame::new(kind, self.blocks.len()));
        Ok(())
    }

    /// Pushes the children of `cluster` as a code block. A cluster that
    /// cannot be read contributes nothing.
    fn push_block(&mut self, cluster: NeuronId) {
        match Selection::children(&self.brain, cluster) {
            Ok(block) => self.blocks.push(block),
            Err(e) => tracing::warn!(%cluster, error = %e, "code block unavailable"),
        }
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.blocks.truncate(frame.block_base);
            for (variable, previous) in frame.saved.into_iter().rev() {
                match previous {
                    Some(values) => self.locals.insert(variable, values),
                    None => self.locals.remove(&variable),
                };
            }
        }
    }

    /// Pops frames until `depth` remain.
    pub(crate) fn unwind_to(&mut self, depth: usize) {
        while self.frames.len() > depth {
            self.pop_frame();
        }
    }

    /// Called when the top frame has no blocks left: loops start their next
    /// pass, every other frame ends.
    fn advance_frame(&mut self) -> Result<(), InstructionError> {
        enum Next {
            Reselect(NeuronId),
            Iterate(NeuronId, NeuronId, NeuronId),
            Done,
        }
        let next = match self.frames.last_mut().map(|f| &mut f.kind) {
            Some(FrameKind::Loop { conditional }) => Next::Reselect(*conditional),
            Some(FrameKind::ForEach {
                variable, body, items, ..
            }) => match items.next() {
                Some(item) => Next::Iterate(item, *variable, *body),
                None => Next::Done,
            },
            _ => Next::Done,
        };
        match next {
            Next::Reselect(conditional) => match self.select_part(conditional)? {
                Some(part) => self.push_block(part),
                None => self.pop_frame(),
            },
            Next::Iterate(item, variable, body) => {
                self.bind_local(variable, vec![item]);
                self.push_block(body);
            }
            Next::Done => self.pop_frame(),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conditionals
    // -----------------------------------------------------------------------

    fn enter_conditional(&mut self, conditional: NeuronId, kind: ConditionalKind) -> Result<(), InstructionError> {
        match kind {
            ConditionalKind::If => {
                if let Some(part) = self.select_part(conditional)? {
                    self.push_frame(FrameKind::Branch { conditional })?;
                    self.push_block(part);
                }
            }
            ConditionalKind::Case => {
                if let Some(part) = self.select_case(conditional)? {
                    self.push_frame(FrameKind::Branch { conditional })?;
                    self.push_block(part);
                }
            }
            ConditionalKind::Loop => {
                if let Some(part) = self.select_part(conditional)? {
                    self.push_frame(FrameKind::Loop { conditional })?;
                    self.push_block(part);
                }
            }
            ConditionalKind::ForEach => {
                let (Some(variable), Some(collection)) = (
                    self.first_out(conditional, Predefined::LoopItem),
                    self.first_out(conditional, Predefined::Collection),
                ) else {
                    tracing::warn!(%conditional, "for-each needs a loop item and a collection");
                    return Ok(());
                };
                let Some(body) = self.brain.child_at(conditional, 0).ok() else {
                    tracing::warn!(%conditional, "for-each without a body");
                    return Ok(());
                };
                let items = Selection::from_pooled(self.eval_list(collection)?);
                self.push_frame(FrameKind::ForEach {
                    conditional,
                    variable,
                    body,
                    items,
                })?;
                // The loop variable is restored when the loop ends.
                let previous = self.locals.get(&variable).cloned();
                if let Some(frame) = self.frames.last_mut() {
                    frame.saved.push((variable, previous));
                }
            }
        }
        Ok(())
    }

    /// The first part whose `Condition` holds; a part without condition
    /// always holds.
    fn select_part(&mut self, conditional: NeuronId) -> Result<Option<NeuronId>, InstructionError> {
        for part in self.parts(conditional) {
            match self.first_out(part, Predefined::Condition) {
                None => return Ok(Some(part)),
                Some(condition) => {
                    if self.eval_truth(condition)? {
                        return Ok(Some(part));
                    }
                }
            }
        }
        Ok(None)
    }

    /// The first part whose condition equals the `CaseItem` value (or
    /// contains it), else the first part without condition.
    fn select_case(&mut self, conditional: NeuronId) -> Result<Option<NeuronId>, InstructionError> {
        let Some(item) = self.first_out(conditional, Predefined::CaseItem) else {
            tracing::warn!(%conditional, "case without a case item");
            return Ok(None);
        };
        let value = self.eval_operand(item)?;
        let mut default = None;
        for part in self.parts(conditional) {
            match self.first_out(part, Predefined::Condition) {
                None => {
                    default = default.or(Some(part));
                }
                Some(condition) => {
                    let candidate = self.eval_operand(condition)?;
                    let contained = match (&value, &candidate) {
                        (super::Operand::List(v), super::Operand::List(c)) => {
                            v.len() == 1 && c.contains(&v[0])
                        }
                        _ => false,
                    };
                    if contained || operands_equal(self, &value, &candidate) {
                        return Ok(Some(part));
                    }
                }
            }
        }
        Ok(default)
    }

    fn parts(&self, conditional: NeuronId) -> Selection<NeuronId> {
        Selection::children(&self.brain, conditional).unwrap_or_else(|e| {
            tracing::warn!(%conditional, error = %e, "conditional parts unavailable");
            Selection::from_items(&self.brain, [])
        })
    }

    /// Target of the first outgoing link of `from` with `meaning`.
    pub(crate) fn first_out(&self, from: NeuronId, meaning: Predefined) -> Option<NeuronId> {
        let links = self.brain.links_out(from).ok()?;
        links.iter().find(|k| k.meaning == meaning.id()).map(|k| k.to)
    }

    // -----------------------------------------------------------------------
    // Control transfer
    // -----------------------------------------------------------------------

    /// Index of the innermost frame matching `pred`, searching no further
    /// than the nearest callable frame.
    fn innermost(&self, pred: impl Fn(&FrameKind) -> bool) -> Option<usize> {
        for (i, frame) in self.frames.iter().enumerate().rev() {
            if pred(&frame.kind) {
                return Some(i);
            }
            if frame.kind.is_callable() {
                return None;
            }
        }
        None
    }

    /// Leaves the innermost `If`, `Case`, `Loop` or `ForEach`.
    pub(crate) fn exit_conditional(&mut self, op: Opcode) -> Result<(), InstructionError> {
        let i = self
            .innermost(FrameKind::is_branching)
            .ok_or(InstructionError::NoEnclosing { op, construct: "conditional" })?;
        self.unwind_to(i);
        Ok(())
    }

    /// Leaves every frame of the link being solved.
    pub(crate) fn exit_link(&mut self, op: Opcode) -> Result<(), InstructionError> {
        let i = self
            .frames
            .iter()
            .rposition(|f| matches!(f.kind, FrameKind::Link { .. }))
            .ok_or(InstructionError::NoEnclosing { op, construct: "solved link" })?;
        self.unwind_to(i);
        Ok(())
    }

    /// Unwinds to and including the nearest callable frame and publishes
    /// `values` as its result.
    pub(crate) fn do_return(&mut self, op: Opcode, values: Vec<NeuronId>) -> Result<(), InstructionError> {
        let i = self
            .frames
            .iter()
            .rposition(|f| f.kind.is_callable())
            .ok_or(InstructionError::NoEnclosing { op, construct: "call" })?;
        self.unwind_to(i);
        self.returns.push(values);
        Ok(())
    }

    /// Ends the innermost loop: a `ForEach` cursor jumps to its end, a
    /// `Loop` is left directly.
    pub(crate) fn break_loop(&mut self, op: Opcode) -> Result<(), InstructionError> {
        let i = self
            .innermost(FrameKind::is_loop)
            .ok_or(InstructionError::NoEnclosing { op, construct: "loop" })?;
        match &mut self.frames[i].kind {
            FrameKind::ForEach { items, .. } => {
                items.goto_end();
                self.unwind_to(i + 1);
                let base = self.frames[i].block_base;
                self.blocks.truncate(base);
            }
            _ => self.unwind_to(i),
        }
        Ok(())
    }

    /// Skips the rest of the current pass of the innermost loop.
    pub(crate) fn continue_loop(&mut self, op: Opcode) -> Result<(), InstructionError> {
        let i = self
            .innermost(FrameKind::is_loop)
            .ok_or(InstructionError::NoEnclosing { op, construct: "loop" })?;
        self.unwind_to(i + 1);
        let base = self.frames[i].block_base;
        self.blocks.truncate(base);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Calls and solving
    // -----------------------------------------------------------------------

    /// Runs `code` in a call frame until it returns or runs out.
    pub(crate) fn call_code(
        &mut self,
        code: NeuronId,
        args: &[NeuronId],
    ) -> Result<cortex_core::Pooled<NeuronId>, InstructionError> {
        let block = Selection::children(&self.brain, code)?;
        let depth = self.frames.len();
        let mark = self.returns.len();
        let values = self.values.len();
        self.values.extend(args.iter().rev().map(|&a| vec![a]));
        self.push_frame(FrameKind::Call { code })?;
        self.blocks.push(block);
        self.run_until(depth)?;
        self.values.truncate(values);

        let mut result = self.brain.factories().id_list();
        if self.returns.len() > mark {
            if let Some(values) = self.returns.pop() {
                result.extend(values);
            }
            self.returns.truncate(mark);
        }
        Ok(result)
    }

    /// Solves neurons popped from the neuron stack until it is back at
    /// `base`. Rule code pushed by a solved link is solved in turn.
    pub(crate) fn solve_stack(&mut self, base: usize) -> Result<(), InstructionError> {
        while self.neurons.len() > base {
            let Some(neuron) = self.neurons.pop() else { break };
            self.solve_neuron(neuron)?;
        }
        Ok(())
    }

    fn solve_neuron(&mut self, neuron: NeuronId) -> Result<(), InstructionError> {
        let links = match Selection::links_out(&self.brain, neuron) {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(%neuron, error = %e, "cannot solve neuron");
                return Ok(());
            }
        };
        for key in links {
            for code in self.rules_for(key.meaning) {
                // Earlier rules may have removed the link.
                if !self.brain.link_exists(key) {
                    break;
                }
                self.solve_link(key, code)?;
            }
        }
        Ok(())
    }

    fn solve_link(&mut self, key: LinkKey, code: NeuronId) -> Result<(), InstructionError> {
        let block = match Selection::children(&self.brain, code) {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(%key, %code, error = %e, "rule code unavailable");
                return Ok(());
            }
        };
        tracing::debug!(%key, %code, "solving link");
        let depth = self.frames.len();
        let mark = self.returns.len();
        self.push_frame(FrameKind::Link { key })?;
        self.blocks.push(block);
        self.run_until(depth)?;
        self.returns.truncate(mark);
        Ok(())
    }

    /// Code clusters attached to `meaning` through `Rules` links.
    fn rules_for(&self, meaning: NeuronId) -> Vec<NeuronId> {
        self.brain
            .links_out(meaning)
            .map(|links| {
                links
                    .iter()
                    .filter(|k| k.meaning == Predefined::Rules.id())
                    .map(|k| k.to)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn check_count(op: Opcode, found: usize) -> Result<(), InstructionError> {
    let expected = op.arg_count();
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(InstructionError::ArgumentCount { op, expected, found })
    }
}
