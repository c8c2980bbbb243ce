//! Arithmetic, comparison and logic.
//!
//! Except for `Count` and `IsEmpty`, these instructions evaluate their own
//! operands through the typed paths and return raw numbers and booleans.

use std::cmp::Ordering;

use rand::Rng;

use cortex_core::{NeuronId, Opcode, Payload};

use super::unsupported;
use crate::error::InstructionError;
use crate::processor::{operands_equal, Operand, Processor};
use crate::value::{Number, Outcome};

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let outcome = match op {
        Opcode::Add | Opcode::Subtract | Opcode::Multiply | Opcode::Divide | Opcode::Modulus => {
            let mut acc = number(p, op, args, 0)?;
            for position in 1..args.len() {
                let rhs = number(p, op, args, position)?;
                acc = acc.combine(rhs, op)?;
            }
            Outcome::number(acc)
        }
        Opcode::Negate => Outcome::number(number(p, op, args, 0)?.negate(op)?),
        Opcode::Equal | Opcode::NotEqual => {
            let a = p.eval_operand(args[0])?;
            let b = p.eval_operand(args[1])?;
            let equal = operands_equal(p, &a, &b);
            Outcome::Bool(if op == Opcode::Equal { equal } else { !equal })
        }
        Opcode::Less | Opcode::LessOrEqual | Opcode::Greater | Opcode::GreaterOrEqual => {
            let a = number(p, op, args, 0)?;
            let b = number(p, op, args, 1)?;
            let holds = match a.compare(b) {
                Some(Ordering::Less) => matches!(op, Opcode::Less | Opcode::LessOrEqual),
                Some(Ordering::Equal) => matches!(op, Opcode::LessOrEqual | Opcode::GreaterOrEqual),
                Some(Ordering::Greater) => matches!(op, Opcode::Greater | Opcode::GreaterOrEqual),
                None => false,
            };
            Outcome::Bool(holds)
        }
        Opcode::And => {
            let mut all = true;
            for &arg in args {
                if !p.eval_truth(arg)? {
                    all = false;
                    break;
                }
            }
            Outcome::Bool(all)
        }
        Opcode::Or => {
            let mut any = false;
            for &arg in args {
                if p.eval_truth(arg)? {
                    any = true;
                    break;
                }
            }
            Outcome::Bool(any)
        }
        Opcode::Not => Outcome::Bool(!p.eval_truth(args[0])?),
        // Resolved: `args` are the concatenated results.
        Opcode::Count => Outcome::Int(args.len() as i64),
        Opcode::IsEmpty => Outcome::Bool(args.is_empty()),
        Opcode::Random => {
            let low = number(p, op, args, 0)?.as_i64();
            let high = number(p, op, args, 1)?.as_i64();
            if low >= high {
                return Err(InstructionError::miss(op, format!("empty range {low}..{high}")));
            }
            Outcome::Int(p.rng.gen_range(low..high))
        }
        Opcode::ToInt => Outcome::Int(convert(p, op, args[0])?.as_i64()),
        Opcode::ToDouble => Outcome::Double(convert(p, op, args[0])?.as_f64()),
        other => return Err(unsupported(other, "arithmetic")),
    };
    Ok(outcome)
}

fn number(p: &mut Processor, op: Opcode, args: &[NeuronId], position: usize) -> Result<Number, InstructionError> {
    p.eval_number(args[position])?.ok_or(InstructionError::ArgumentKind {
        op,
        position,
        expected: "number",
        found: args[position],
    })
}

/// A number, or a text neuron holding one.
fn convert(p: &mut Processor, op: Opcode, expr: NeuronId) -> Result<Number, InstructionError> {
    let bad = InstructionError::ArgumentKind {
        op,
        position: 0,
        expected: "number or numeric text",
        found: expr,
    };
    match p.eval_operand(expr)? {
        Operand::Number(n) => Ok(n),
        Operand::Bool(b) => Ok(Number::Int(i64::from(b))),
        Operand::List(list) => {
            let &[only] = &list[..] else { return Err(bad) };
            let Ok(Payload::Text(text)) = p.brain().payload(only) else {
                return Err(bad);
            };
            let text = text.trim();
            if let Ok(v) = text.parse::<i64>() {
                Ok(Number::Int(v))
            } else {
                text.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Number::Double)
                    .ok_or(bad)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cortex_core::{Brain, NeuronKind, Opcode, Payload, Predefined};

    use crate::builder::CodeBuilder;
    use crate::config::ProcessorConfig;
    use crate::processor::Processor;

    fn setup() -> (Arc<Brain>, Processor) {
        let brain = Arc::new(Brain::new());
        let config = ProcessorConfig {
            random_seed: Some(42),
            ..ProcessorConfig::default()
        };
        let p = Processor::new(Arc::clone(&brain), config);
        (brain, p)
    }

    #[test]
    fn nested_arithmetic_creates_no_neurons() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let product = b
            .result_statement(Opcode::Multiply, &[b.int(3).unwrap(), b.int(4).unwrap()])
            .unwrap();
        let sum = b.result_statement(Opcode::Add, &[b.int(2).unwrap(), product]).unwrap();

        let before = brain.neuron_count();
        assert_eq!(p.eval_int(sum).unwrap(), Some(14));
        assert_eq!(brain.neuron_count(), before);

        let out = p.evaluate(sum).unwrap();
        assert_eq!(brain.payload(out[0]).unwrap(), Payload::Int(14));
        assert_eq!(brain.neuron_count(), before + 1);
    }

    #[test]
    fn comparisons_yield_boolean_neurons_on_the_generic_path() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let less = b
            .result_statement(Opcode::Less, &[b.int(1).unwrap(), b.double(1.5).unwrap()])
            .unwrap();
        assert!(p.eval_bool(less).unwrap());
        assert_eq!(p.evaluate(less).unwrap(), vec![Predefined::True.id()]);

        let not = b.result_statement(Opcode::Not, &[less]).unwrap();
        assert_eq!(p.evaluate(not).unwrap(), vec![Predefined::False.id()]);
    }

    #[test]
    fn equality_compares_values() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let eq_num = b
            .result_statement(Opcode::Equal, &[b.int(2).unwrap(), b.double(2.0).unwrap()])
            .unwrap();
        assert!(p.eval_bool(eq_num).unwrap());
        let eq_text = b
            .result_statement(Opcode::Equal, &[b.text("a").unwrap(), b.text("a").unwrap()])
            .unwrap();
        assert!(p.eval_bool(eq_text).unwrap());
        let x = brain.create(NeuronKind::Neuron);
        let y = brain.create(NeuronKind::Neuron);
        let ne = b.result_statement(Opcode::NotEqual, &[x, y]).unwrap();
        assert!(p.eval_bool(ne).unwrap());
    }

    #[test]
    fn division_by_zero_is_an_empty_result() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let div = b
            .result_statement(Opcode::Divide, &[b.int(1).unwrap(), b.int(0).unwrap()])
            .unwrap();
        assert_eq!(p.eval_int(div).unwrap(), None);
        assert!(p.evaluate(div).unwrap().is_empty());
    }

    #[test]
    fn random_is_seeded_and_in_range() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let random = b
            .result_statement(Opcode::Random, &[b.int(10).unwrap(), b.int(20).unwrap()])
            .unwrap();
        let first: Vec<i64> = (0..16).map(|_| p.eval_int(random).unwrap().unwrap()).collect();
        assert!(first.iter().all(|v| (10..20).contains(v)));

        let config = ProcessorConfig {
            random_seed: Some(42),
            ..ProcessorConfig::default()
        };
        let mut again = Processor::new(Arc::clone(&brain), config);
        let second: Vec<i64> = (0..16).map(|_| again.eval_int(random).unwrap().unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn to_int_parses_text() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let parse = b.result_statement(Opcode::ToInt, &[b.text(" 42 ").unwrap()]).unwrap();
        assert_eq!(p.eval_int(parse).unwrap(), Some(42));
        let to_double = b.result_statement(Opcode::ToDouble, &[b.int(3).unwrap()]).unwrap();
        assert_eq!(p.eval_double(to_double).unwrap(), Some(3.0));
        let out = p.evaluate(to_double).unwrap();
        assert_eq!(brain.kind_of(out[0]).unwrap(), NeuronKind::Double);
    }

    #[test]
    fn count_and_is_empty_see_resolved_lists() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let c = brain.create(NeuronKind::Cluster);
        let children = b.result_statement(Opcode::GetChildren, &[c]).unwrap();
        let empty = b.result_statement(Opcode::IsEmpty, &[children]).unwrap();
        assert!(p.eval_bool(empty).unwrap());
        brain.add_children(c, &[Predefined::True.id(), Predefined::False.id()]).unwrap();
        assert!(!p.eval_bool(empty).unwrap());
        let count = b.result_statement(Opcode::Count, &[children]).unwrap();
        assert_eq!(p.eval_int(count).unwrap(), Some(2));
    }
}
