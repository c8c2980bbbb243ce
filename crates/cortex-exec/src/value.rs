//! Instruction results and numeric operands.
//!
//! Every instruction returns an [`Outcome`]. Numeric and boolean
//! instructions return the raw value, which the typed fast paths consume
//! directly; only the generic evaluation path materializes it as a
//! temporary neuron (or the `True`/`False` neuron).

use cortex_core::{NeuronId, Opcode, Payload, Pooled};

use crate::error::InstructionError;

/// Result of one instruction.
#[derive(Debug)]
pub enum Outcome {
    /// No result, the instruction ran for its side effects or failed.
    Empty,
    Neurons(Pooled<NeuronId>),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Outcome {
    pub fn number(n: Number) -> Self {
        match n {
            Number::Int(v) => Outcome::Int(v),
            Number::Double(v) => Outcome::Double(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Outcome::Empty => true,
            Outcome::Neurons(list) => list.is_empty(),
            _ => false,
        }
    }
}

/// A number read from a payload or produced by arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Double(f64),
}

impl Number {
    pub fn from_payload(payload: &Payload) -> Option<Number> {
        match payload {
            Payload::Int(v) => Some(Number::Int(*v)),
            Payload::Double(v) => Some(Number::Double(*v)),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Double(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Double(v) => v,
        }
    }

    /// Applies a binary operator, promoting to double when either side is
    /// one. Integer arithmetic is checked.
    pub(crate) fn combine(self, rhs: Number, op: Opcode) -> Result<Number, InstructionError> {
        let overflow = InstructionError::Overflow { op };
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                let v = match op {
                    Opcode::Add => a.checked_add(b),
                    Opcode::Subtract => a.checked_sub(b),
                    Opcode::Multiply => a.checked_mul(b),
                    Opcode::Divide | Opcode::Modulus if b == 0 => {
                        return Err(InstructionError::DivideByZero { op })
                    }
                    Opcode::Divide => a.checked_div(b),
                    Opcode::Modulus => a.checked_rem(b),
                    _ => None,
                };
                v.map(Number::Int).ok_or(overflow)
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                let v = match op {
                    Opcode::Add => a + b,
                    Opcode::Subtract => a - b,
                    Opcode::Multiply => a * b,
                    Opcode::Divide | Opcode::Modulus if b == 0.0 => {
                        return Err(InstructionError::DivideByZero { op })
                    }
                    Opcode::Divide => a / b,
                    Opcode::Modulus => a % b,
                    _ => return Err(overflow),
                };
                // Non-finite doubles cannot be stored or persisted.
                if v.is_finite() {
                    Ok(Number::Double(v))
                } else {
                    Err(overflow)
                }
            }
        }
    }

    pub(crate) fn negate(self, op: Opcode) -> Result<Number, InstructionError> {
        match self {
            Number::Int(v) => v.checked_neg().map(Number::Int).ok_or(InstructionError::Overflow { op }),
            Number::Double(v) => Ok(Number::Double(-v)),
        }
    }

    pub(crate) fn compare(self, rhs: Number) -> Option<std::cmp::Ordering> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_is_checked() {
        assert_eq!(Number::Int(7).combine(Number::Int(2), Opcode::Divide).unwrap(), Number::Int(3));
        assert_eq!(Number::Int(7).combine(Number::Int(2), Opcode::Modulus).unwrap(), Number::Int(1));
        assert!(matches!(
            Number::Int(i64::MAX).combine(Number::Int(1), Opcode::Add),
            Err(InstructionError::Overflow { .. })
        ));
        assert!(matches!(
            Number::Int(1).combine(Number::Int(0), Opcode::Divide),
            Err(InstructionError::DivideByZero { .. })
        ));
        assert!(Number::Int(i64::MIN).negate(Opcode::Negate).is_err());
    }

    #[test]
    fn mixed_operands_promote_to_double() {
        assert_eq!(
            Number::Int(1).combine(Number::Double(0.5), Opcode::Add).unwrap(),
            Number::Double(1.5)
        );
        assert!(Number::Double(1.0).combine(Number::Int(0), Opcode::Divide).is_err());
    }

    #[test]
    fn comparison_across_types() {
        use std::cmp::Ordering;
        assert_eq!(Number::Int(2).compare(Number::Double(2.0)), Some(Ordering::Equal));
        assert_eq!(Number::Int(1).compare(Number::Int(3)), Some(Ordering::Less));
    }
}
