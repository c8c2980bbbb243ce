//! Helpers for assembling code in the brain.
//!
//! Code is ordinary graph structure: a statement is a cluster whose first
//! child is an instruction neuron, a code block is a cluster with the `Code`
//! meaning, and conditionals hang their conditions off `Condition` links.
//! [`CodeBuilder`] writes these shapes so hosts and tests do not have to.

use cortex_core::{Brain, ConditionalKind, CoreError, NeuronId, NeuronKind, Opcode, Payload, Predefined};

/// Writes code structures into a brain. Every created neuron is committed.
#[derive(Clone, Copy)]
pub struct CodeBuilder<'b> {
    brain: &'b Brain,
}

impl<'b> CodeBuilder<'b> {
    pub fn new(brain: &'b Brain) -> Self {
        CodeBuilder { brain }
    }

    pub fn brain(&self) -> &'b Brain {
        self.brain
    }

    // -----------------------------------------------------------------------
    // Values and bindings
    // -----------------------------------------------------------------------

    pub fn int(&self, value: i64) -> Result<NeuronId, CoreError> {
        self.brain.create_with(NeuronKind::Int, Payload::Int(value))
    }

    pub fn double(&self, value: f64) -> Result<NeuronId, CoreError> {
        self.brain.create_with(NeuronKind::Double, Payload::Double(value))
    }

    pub fn text(&self, value: &str) -> Result<NeuronId, CoreError> {
        self.brain.create_with(NeuronKind::Text, Payload::Text(value.to_string()))
    }

    pub fn variable(&self) -> Result<NeuronId, CoreError> {
        Ok(self.brain.create(NeuronKind::Variable))
    }

    pub fn global(&self) -> Result<NeuronId, CoreError> {
        Ok(self.brain.create(NeuronKind::Global))
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// A statement executed for its side effects.
    pub fn statement(&self, op: Opcode, args: &[NeuronId]) -> Result<NeuronId, CoreError> {
        self.instruction_cluster(NeuronKind::Statement, op, args)
    }

    /// A statement evaluated for its result.
    pub fn result_statement(&self, op: Opcode, args: &[NeuronId]) -> Result<NeuronId, CoreError> {
        self.instruction_cluster(NeuronKind::ResultStatement, op, args)
    }

    /// `variable = exprs...`
    pub fn assignment(&self, variable: NeuronId, exprs: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let mut items = Vec::with_capacity(exprs.len() + 1);
        items.push(variable);
        items.extend_from_slice(exprs);
        self.cluster(NeuronKind::Assignment, NeuronId::EMPTY, &items)
    }

    /// A code block: a cluster with the `Code` meaning.
    pub fn code(&self, statements: &[NeuronId]) -> Result<NeuronId, CoreError> {
        self.cluster(NeuronKind::Cluster, Predefined::Code.id(), statements)
    }

    // -----------------------------------------------------------------------
    // Conditionals
    // -----------------------------------------------------------------------

    /// One branch of a conditional. A part without condition always holds
    /// (and is the default part of a `Case`).
    pub fn part(&self, condition: Option<NeuronId>, statements: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let part = self.cluster(NeuronKind::ConditionalPart, NeuronId::EMPTY, statements)?;
        if let Some(condition) = condition {
            self.brain.insert_link(part, condition, Predefined::Condition.id())?;
        }
        Ok(part)
    }

    pub fn conditional(&self, kind: ConditionalKind, parts: &[NeuronId]) -> Result<NeuronId, CoreError> {
        self.cluster(NeuronKind::Conditional(kind), NeuronId::EMPTY, parts)
    }

    /// A `Case` over the value of `item`.
    pub fn case(&self, item: NeuronId, parts: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let case = self.conditional(ConditionalKind::Case, parts)?;
        self.brain.insert_link(case, item, Predefined::CaseItem.id())?;
        Ok(case)
    }

    /// Runs `body` once per item of `collection`, bound to `variable`.
    pub fn for_each(&self, variable: NeuronId, collection: NeuronId, body: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let part = self.part(None, body)?;
        let each = self.conditional(ConditionalKind::ForEach, &[part])?;
        self.brain.insert_link(each, variable, Predefined::LoopItem.id())?;
        self.brain.insert_link(each, collection, Predefined::Collection.id())?;
        Ok(each)
    }

    /// Attaches `code` as a rule for links with `meaning`, run by `Solve`.
    pub fn rules(&self, meaning: NeuronId, code: NeuronId) -> Result<(), CoreError> {
        self.brain.insert_link(meaning, code, Predefined::Rules.id())?;
        Ok(())
    }

    fn instruction_cluster(&self, kind: NeuronKind, op: Opcode, args: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Predefined::instruction(op));
        items.extend_from_slice(args);
        self.cluster(kind, NeuronId::EMPTY, &items)
    }

    fn cluster(&self, kind: NeuronKind, meaning: NeuronId, children: &[NeuronId]) -> Result<NeuronId, CoreError> {
        let id = self.brain.create_cluster(kind, meaning)?;
        if let Err(e) = self.brain.add_children(id, children) {
            if let Err(undo) = self.brain.delete(id) {
                tracing::warn!(%id, error = %undo, "half-built cluster left behind");
            }
            return Err(e);
        }
        Ok(id)
    }
}
