//! Neurons every brain carries at fixed ids.
//!
//! Predefined neurons give graph-resident code a shared vocabulary: boolean
//! results, the meanings that wire code together (`Code`, `Rules`,
//! `Condition`, ...), system variables bound while a link is being solved,
//! type neurons accepted by the `New` instruction, and one instruction neuron
//! per [`Opcode`].

use crate::id::NeuronId;
use crate::kind::NeuronKind;
use crate::opcode::Opcode;

/// First id of the instruction neuron range.
pub const INSTRUCTION_BASE: u64 = 256;

/// Predefined non-instruction neurons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Predefined {
    True = 1,
    False = 2,
    /// Meaning of clusters holding a list of statements.
    Code = 3,
    /// Link meaning from a meaning neuron to the code run when links with
    /// that meaning are solved.
    Rules = 4,
    /// Link meaning from a conditional part to its condition expression.
    Condition = 5,
    /// Link meaning from a `Case` conditional to the value being matched.
    CaseItem = 6,
    /// Link meaning from a `ForEach` conditional to its loop variable.
    LoopItem = 7,
    /// Link meaning from a `ForEach` conditional to the items expression.
    Collection = 8,
    CurrentFrom = 9,
    CurrentTo = 10,
    CurrentMeaning = 11,
    CurrentInfo = 12,
    NeuronType = 13,
    ClusterType = 14,
    IntType = 15,
    DoubleType = 16,
    TextType = 17,
    TimerType = 18,
}

impl Predefined {
    pub const ALL: &'static [Predefined] = &[
        Predefined::True,
        Predefined::False,
        Predefined::Code,
        Predefined::Rules,
        Predefined::Condition,
        Predefined::CaseItem,
        Predefined::LoopItem,
        Predefined::Collection,
        Predefined::CurrentFrom,
        Predefined::CurrentTo,
        Predefined::CurrentMeaning,
        Predefined::CurrentInfo,
        Predefined::NeuronType,
        Predefined::ClusterType,
        Predefined::IntType,
        Predefined::DoubleType,
        Predefined::TextType,
        Predefined::TimerType,
    ];

    pub fn id(self) -> NeuronId {
        NeuronId(self as u64)
    }

    /// Kind the predefined neuron is created with.
    pub fn kind(self) -> NeuronKind {
        match self {
            Predefined::CurrentFrom
            | Predefined::CurrentTo
            | Predefined::CurrentMeaning
            | Predefined::CurrentInfo => NeuronKind::Variable,
            _ => NeuronKind::Neuron,
        }
    }

    /// The instruction neuron id for `op`.
    pub fn instruction(op: Opcode) -> NeuronId {
        NeuronId(INSTRUCTION_BASE + op.code() as u64)
    }

    /// Maps a boolean onto the `True`/`False` neurons.
    pub fn boolean(value: bool) -> NeuronId {
        if value {
            Predefined::True.id()
        } else {
            Predefined::False.id()
        }
    }

    /// Maps a type neuron onto the kind it stands for.
    pub fn type_kind(id: NeuronId) -> Option<NeuronKind> {
        match id.0 {
            13 => Some(NeuronKind::Neuron),
            14 => Some(NeuronKind::Cluster),
            15 => Some(NeuronKind::Int),
            16 => Some(NeuronKind::Double),
            17 => Some(NeuronKind::Text),
            18 => Some(NeuronKind::Timer),
            _ => None,
        }
    }

    /// Maps a kind onto its type neuron, if it has one.
    pub fn type_of(kind: NeuronKind) -> Option<NeuronId> {
        let pre = match kind {
            NeuronKind::Neuron => Predefined::NeuronType,
            NeuronKind::Cluster => Predefined::ClusterType,
            NeuronKind::Int => Predefined::IntType,
            NeuronKind::Double => Predefined::DoubleType,
            NeuronKind::Text => Predefined::TextType,
            NeuronKind::Timer => Predefined::TimerType,
            _ => return None,
        };
        Some(pre.id())
    }
}
