//! The closed instruction vocabulary.
//!
//! Every [`Opcode`] is represented in the graph by one predefined instruction
//! neuron (see [`Predefined::instruction`](crate::Predefined::instruction)).
//! Codes are explicit and stable because they determine those neurons' ids,
//! which end up in persisted graphs.
//!
//! The execution semantics live in `cortex-exec`; this module only carries
//! the static contract every instruction exposes: arity, whether the
//! processor resolves arguments before dispatch, and the shape of the result
//! (which decides whether a typed fast path exists).

use serde::{Deserialize, Serialize};

/// Arity contract of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCount {
    /// Exactly `n` arguments.
    Fixed(usize),
    /// `n` or more arguments.
    AtLeast(usize),
    /// Any number of arguments, including none.
    Variable,
}

impl ArgCount {
    /// Returns `true` if `count` arguments satisfy the contract.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            ArgCount::Fixed(n) => count == n,
            ArgCount::AtLeast(n) => count >= n,
            ArgCount::Variable => true,
        }
    }
}

/// Result shape of an instruction, used to pick typed fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Produces a list of neurons (or nothing).
    Neurons,
    /// Produces an integer.
    Int,
    /// Produces an integer or a double depending on its operands.
    Number,
    /// Produces a boolean.
    Bool,
}

/// Grouping used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Children,
    Links,
    Info,
    Neurons,
    Arithmetic,
    Lists,
    Stack,
    Timer,
}

/// Instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum Opcode {
    // children
    ChildCount = 1,
    GetChildren = 2,
    GetFirstChild = 3,
    GetLastChild = 4,
    GetChildAt = 5,
    IndexOfChild = 6,
    ContainsChild = 7,
    AddChild = 8,
    InsertChild = 9,
    SetChild = 10,
    RemoveChild = 11,
    RemoveChildAt = 12,
    ClearChildren = 13,
    GetClusterMeaning = 14,
    SetClusterMeaning = 15,
    GetClusters = 16,
    GetClustersWithMeaning = 17,
    ClusterCount = 18,

    // links
    LinkOutCount = 20,
    LinkInCount = 21,
    GetFirstOut = 22,
    GetOutgoing = 23,
    GetFirstIn = 24,
    GetIncoming = 25,
    GetOutMeanings = 26,
    GetInMeanings = 27,
    LinkExists = 28,
    InsertLink = 29,
    RemoveLink = 30,
    RemoveLinksOut = 31,
    RemoveLinksIn = 32,
    SetFirstOut = 33,

    // link info
    GetInfo = 40,
    GetFirstInfo = 41,
    GetLastInfo = 42,
    GetInfoAt = 43,
    InfoCount = 44,
    IndexOfInfo = 45,
    AddInfo = 46,
    InsertInfo = 47,
    SetInfoAt = 48,
    RemoveInfo = 49,
    RemoveInfoAt = 50,
    ClearInfo = 51,

    // neurons and values
    New = 60,
    NewCluster = 61,
    Delete = 62,
    TypeOf = 63,
    GetId = 64,
    SetValue = 65,
    Concat = 66,

    // arithmetic and logic
    Add = 70,
    Subtract = 71,
    Multiply = 72,
    Divide = 73,
    Modulus = 74,
    Negate = 75,
    Equal = 76,
    NotEqual = 77,
    Less = 78,
    LessOrEqual = 79,
    Greater = 80,
    GreaterOrEqual = 81,
    And = 82,
    Or = 83,
    Not = 84,
    Count = 85,
    Random = 86,
    ToInt = 87,
    ToDouble = 88,
    IsEmpty = 89,

    // lists
    Union = 90,
    Intersect = 91,
    Complement = 92,
    Distinct = 93,
    First = 94,
    Last = 95,
    Reverse = 96,

    // stack, frames and control
    Push = 100,
    Pop = 101,
    Peek = 102,
    StackCount = 103,
    PushValue = 104,
    PopValue = 105,
    Return = 106,
    ReturnValueIf = 107,
    ExitConditional = 108,
    ExitLink = 109,
    Break = 110,
    Continue = 111,
    Call = 112,
    Solve = 113,
    Log = 114,

    // timers
    StartTimer = 120,
    StopTimer = 121,
    SetTimerInterval = 122,
    GetTimerInterval = 123,
    IsTimerActive = 124,
}

impl Opcode {
    /// Every opcode, in code order.
    pub const ALL: &'static [Opcode] = &[
        Opcode::ChildCount,
        Opcode::GetChildren,
        Opcode::GetFirstChild,
        Opcode::GetLastChild,
        Opcode::GetChildAt,
        Opcode::IndexOfChild,
        Opcode::ContainsChild,
        Opcode::AddChild,
        Opcode::InsertChild,
        Opcode::SetChild,
        Opcode::RemoveChild,
        Opcode::RemoveChildAt,
        Opcode::ClearChildren,
        Opcode::GetClusterMeaning,
        Opcode::SetClusterMeaning,
        Opcode::GetClusters,
        Opcode::GetClustersWithMeaning,
        Opcode::ClusterCount,
        Opcode::LinkOutCount,
        Opcode::LinkInCount,
        Opcode::GetFirstOut,
        Opcode::GetOutgoing,
        Opcode::GetFirstIn,
        Opcode::GetIncoming,
        Opcode::GetOutMeanings,
        Opcode::GetInMeanings,
        Opcode::LinkExists,
        Opcode::InsertLink,
        Opcode::RemoveLink,
        Opcode::RemoveLinksOut,
        Opcode::RemoveLinksIn,
        Opcode::SetFirstOut,
        Opcode::GetInfo,
        Opcode::GetFirstInfo,
        Opcode::GetLastInfo,
        Opcode::GetInfoAt,
        Opcode::InfoCount,
        Opcode::IndexOfInfo,
        Opcode::AddInfo,
        Opcode::InsertInfo,
        Opcode::SetInfoAt,
        Opcode::RemoveInfo,
        Opcode::RemoveInfoAt,
        Opcode::ClearInfo,
        Opcode::New,
        Opcode::NewCluster,
        Opcode::Delete,
        Opcode::TypeOf,
        Opcode::GetId,
        Opcode::SetValue,
        Opcode::Concat,
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Modulus,
        Opcode::Negate,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::Less,
        Opcode::LessOrEqual,
        Opcode::Greater,
        Opcode::GreaterOrEqual,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Count,
        Opcode::Random,
        Opcode::ToInt,
        Opcode::ToDouble,
        Opcode::IsEmpty,
        Opcode::Union,
        Opcode::Intersect,
        Opcode::Complement,
        Opcode::Distinct,
        Opcode::First,
        Opcode::Last,
        Opcode::Reverse,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Peek,
        Opcode::StackCount,
        Opcode::PushValue,
        Opcode::PopValue,
        Opcode::Return,
        Opcode::ReturnValueIf,
        Opcode::ExitConditional,
        Opcode::ExitLink,
        Opcode::Break,
        Opcode::Continue,
        Opcode::Call,
        Opcode::Solve,
        Opcode::Log,
        Opcode::StartTimer,
        Opcode::StopTimer,
        Opcode::SetTimerInterval,
        Opcode::GetTimerInterval,
        Opcode::IsTimerActive,
    ];

    /// Name used in logs and traces.
    pub fn name(self) -> String {
        format!("{self:?}")
    }

    /// Stable numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up an opcode by its numeric code.
    pub fn from_code(code: u16) -> Option<Opcode> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    /// Arity contract, counted after argument resolution for opcodes that
    /// resolve their arguments and in argument expressions otherwise.
    pub fn arg_count(self) -> ArgCount {
        use ArgCount::*;
        use Opcode::*;
        match self {
            ChildCount | GetChildren | GetFirstChild | GetLastChild | ClearChildren
            | GetClusterMeaning | GetClusters | ClusterCount => Fixed(1),
            GetChildAt | IndexOfChild | ContainsChild | RemoveChildAt | SetClusterMeaning
            | GetClustersWithMeaning => Fixed(2),
            InsertChild | SetChild => Fixed(3),
            AddChild | RemoveChild => AtLeast(2),

            LinkOutCount | LinkInCount | GetOutMeanings | GetInMeanings => Fixed(1),
            GetFirstOut | GetOutgoing | GetFirstIn | GetIncoming => Fixed(2),
            LinkExists | InsertLink | RemoveLink | SetFirstOut => Fixed(3),
            RemoveLinksOut | RemoveLinksIn => AtLeast(1),

            GetInfo | GetFirstInfo | GetLastInfo | InfoCount | ClearInfo => Fixed(3),
            GetInfoAt | IndexOfInfo | RemoveInfoAt => Fixed(4),
            InsertInfo | SetInfoAt => Fixed(5),
            AddInfo | RemoveInfo => AtLeast(4),

            New | NewCluster | TypeOf | GetId => Fixed(1),
            SetValue => Fixed(2),
            Delete => AtLeast(1),
            Concat => Variable,

            Add | Subtract | Multiply | And | Or => AtLeast(2),
            Divide | Modulus | Equal | NotEqual | Less | LessOrEqual | Greater
            | GreaterOrEqual | Random | Complement => Fixed(2),
            Negate | Not | ToInt | ToDouble => Fixed(1),
            Count | IsEmpty | Distinct | First | Last | Reverse => Variable,
            Union | Intersect => AtLeast(1),

            Pop | Peek | StackCount | ExitConditional | ExitLink | Break | Continue => Fixed(0),
            Push | PushValue | PopValue | ReturnValueIf | Call | Solve => AtLeast(1),
            Return | Log => Variable,

            StartTimer | StopTimer | GetTimerInterval | IsTimerActive => Fixed(1),
            SetTimerInterval => Fixed(2),
        }
    }

    /// Returns `false` for opcodes that evaluate their argument expressions
    /// themselves (typed operands, per-argument lists, unevaluated variables).
    pub fn resolves_arguments(self) -> bool {
        use Opcode::*;
        !matches!(
            self,
            Add | Subtract
                | Multiply
                | Divide
                | Modulus
                | Negate
                | Equal
                | NotEqual
                | Less
                | LessOrEqual
                | Greater
                | GreaterOrEqual
                | And
                | Or
                | Not
                | Random
                | ToInt
                | ToDouble
                | Union
                | Intersect
                | Complement
                | PopValue
                | ReturnValueIf
        )
    }

    /// Shape of the value this opcode produces when evaluated.
    pub fn result_shape(self) -> ResultShape {
        use Opcode::*;
        match self {
            ChildCount | IndexOfChild | ClusterCount | LinkOutCount | LinkInCount | InfoCount
            | IndexOfInfo | GetId | Count | Random | ToInt | StackCount | GetTimerInterval => {
                ResultShape::Int
            }
            Add | Subtract | Multiply | Divide | Modulus | Negate | ToDouble => ResultShape::Number,
            ContainsChild | LinkExists | Equal | NotEqual | Less | LessOrEqual | Greater
            | GreaterOrEqual | And | Or | Not | IsEmpty | IsTimerActive => ResultShape::Bool,
            _ => ResultShape::Neurons,
        }
    }

    /// Family the opcode belongs to.
    pub fn family(self) -> Family {
        match self.code() {
            1..=18 => Family::Children,
            20..=33 => Family::Links,
            40..=51 => Family::Info,
            60..=66 => Family::Neurons,
            70..=89 => Family::Arithmetic,
            90..=96 => Family::Lists,
            100..=114 => Family::Stack,
            _ => Family::Timer,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
