//! Neuron discriminants and value payloads.
//!
//! [`NeuronKind`] is the "type of neuron" used for polymorphic dispatch: the
//! processor decides how to execute or evaluate a neuron from its kind alone.
//! [`Payload`] is the content of a neuron's `Value` aspect.

use serde::{Deserialize, Serialize};

use crate::id::NeuronId;
use crate::opcode::Opcode;

/// Branching construct selected by a conditional expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionalKind {
    /// Executes the first part whose condition holds.
    If,
    /// Compares the `CaseItem` value against each part's condition.
    Case,
    /// Re-selects a part after every pass until none holds.
    Loop,
    /// Runs once per item of the `Collection` expression.
    ForEach,
}

/// The discriminant of a neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Plain node without payload.
    Neuron,
    /// Node with ordered children and a meaning.
    Cluster,
    Int,
    Double,
    Text,
    /// Node polled by an external scheduler.
    Timer,
    /// One of the fixed instructions.
    Instruction(Opcode),
    /// `[instruction, args...]`, executed for its side effects.
    Statement,
    /// `[instruction, args...]`, evaluated for its result list.
    ResultStatement,
    /// `[variable, expressions...]`.
    Assignment,
    /// Children are [`NeuronKind::ConditionalPart`]s.
    Conditional(ConditionalKind),
    /// Children are the statements of one branch; the condition hangs off a
    /// `Condition` link.
    ConditionalPart,
    /// Binding local to the processor, restored when a frame exits.
    Variable,
    /// Binding shared by a processor and all of its duplicates.
    Global,
}

impl NeuronKind {
    /// Returns `true` for kinds that own an ordered child list.
    pub fn is_cluster(&self) -> bool {
        matches!(
            self,
            NeuronKind::Cluster
                | NeuronKind::Statement
                | NeuronKind::ResultStatement
                | NeuronKind::Assignment
                | NeuronKind::Conditional(_)
                | NeuronKind::ConditionalPart
        )
    }

    /// Returns `true` for expression kinds the processor executes.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NeuronKind::Statement
                | NeuronKind::ResultStatement
                | NeuronKind::Assignment
                | NeuronKind::Conditional(_)
                | NeuronKind::Variable
                | NeuronKind::Global
        )
    }

    /// The payload a fresh neuron of this kind starts with.
    pub fn default_payload(&self) -> Payload {
        match self {
            NeuronKind::Int => Payload::Int(0),
            NeuronKind::Double => Payload::Double(0.0),
            NeuronKind::Text => Payload::Text(String::new()),
            NeuronKind::Timer => Payload::Timer(TimerState::default()),
            k if k.is_cluster() => Payload::Meaning(NeuronId::EMPTY),
            _ => Payload::Empty,
        }
    }

    /// Returns `true` if `payload` is a valid value for this kind.
    pub fn accepts(&self, payload: &Payload) -> bool {
        match (self, payload) {
            (NeuronKind::Int, Payload::Int(_)) => true,
            (NeuronKind::Double, Payload::Double(_)) => true,
            (NeuronKind::Text, Payload::Text(_)) => true,
            (NeuronKind::Timer, Payload::Timer(_)) => true,
            (k, Payload::Meaning(_)) => k.is_cluster(),
            (k, Payload::Empty) => !k.is_cluster() && k.default_payload() == Payload::Empty,
            _ => false,
        }
    }
}

/// Scheduler-visible state of a timer neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub active: bool,
    pub interval_ms: u64,
}

impl Default for TimerState {
    fn default() -> Self {
        TimerState {
            active: false,
            interval_ms: 1000,
        }
    }
}

/// Content of a neuron's `Value` aspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Empty,
    Int(i64),
    Double(f64),
    Text(String),
    Timer(TimerState),
    /// Meaning of a cluster; `NeuronId::EMPTY` when unset.
    Meaning(NeuronId),
}

impl Payload {
    /// Numeric view of the payload as an integer, if it is a number.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(v) => Some(*v),
            Payload::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Numeric view of the payload as a double, if it is a number.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Payload::Int(v) => Some(*v as f64),
            Payload::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The cluster meaning, or `None` if unset or not a cluster payload.
    pub fn meaning(&self) -> Option<NeuronId> {
        match self {
            Payload::Meaning(id) if !id.is_empty() => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_kinds() {
        assert!(NeuronKind::Cluster.is_cluster());
        assert!(NeuronKind::Statement.is_cluster());
        assert!(NeuronKind::Conditional(ConditionalKind::Loop).is_cluster());
        assert!(!NeuronKind::Int.is_cluster());
        assert!(!NeuronKind::Instruction(Opcode::Add).is_cluster());
    }

    #[test]
    fn default_payloads_are_accepted() {
        let kinds = [
            NeuronKind::Neuron,
            NeuronKind::Cluster,
            NeuronKind::Int,
            NeuronKind::Double,
            NeuronKind::Text,
            NeuronKind::Timer,
            NeuronKind::Variable,
            NeuronKind::Statement,
        ];
        for kind in kinds {
            assert!(kind.accepts(&kind.default_payload()), "{kind:?}");
        }
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        assert!(!NeuronKind::Int.accepts(&Payload::Text("x".into())));
        assert!(!NeuronKind::Neuron.accepts(&Payload::Meaning(NeuronId(5))));
        assert!(!NeuronKind::Cluster.accepts(&Payload::Empty));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Payload::Int(3).as_double(), Some(3.0));
        assert_eq!(Payload::Double(2.9).as_int(), Some(2));
        assert_eq!(Payload::Text("a".into()).as_int(), None);
        assert_eq!(Payload::Meaning(NeuronId::EMPTY).meaning(), None);
        assert_eq!(Payload::Meaning(NeuronId(9)).meaning(), Some(NeuronId(9)));
    }
}
