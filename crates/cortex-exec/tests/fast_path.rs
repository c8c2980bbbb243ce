//! The typed fast paths agree with the generic, neuron-producing path.

use std::sync::Arc;

use proptest::prelude::*;

use cortex_core::{Brain, NeuronId, Opcode, Payload, Predefined};
use cortex_exec::{CodeBuilder, Processor, ProcessorConfig};

const OPS: [Opcode; 5] = [
    Opcode::Add,
    Opcode::Subtract,
    Opcode::Multiply,
    Opcode::Divide,
    Opcode::Modulus,
];

/// Left-nested arithmetic: `((start op v1) op v2) ...`.
fn build(b: &CodeBuilder<'_>, start: i64, steps: &[(usize, i64)]) -> NeuronId {
    let mut expr = b.int(start).unwrap();
    for &(op, value) in steps {
        let rhs = b.int(value).unwrap();
        expr = b.result_statement(OPS[op % OPS.len()], &[expr, rhs]).unwrap();
    }
    expr
}

proptest! {
    #[test]
    fn int_fast_path_matches_generic_path(
        start in -1000i64..1000,
        steps in prop::collection::vec((0usize..5, -20i64..20), 1..6),
    ) {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let expr = build(&b, start, &steps);

        let fast = p.eval_int(expr).unwrap();
        let generic = p.evaluate(expr).unwrap();
        match fast {
            Some(v) => {
                prop_assert_eq!(generic.len(), 1);
                prop_assert_eq!(brain.payload(generic[0]).unwrap(), Payload::Int(v));
            }
            None => prop_assert!(generic.is_empty()),
        }
    }

    #[test]
    fn bool_fast_path_matches_generic_path(
        start in -1000i64..1000,
        steps in prop::collection::vec((0usize..3, -20i64..20), 0..4),
        bound in -1000i64..1000,
    ) {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let lhs = build(&b, start, &steps);
        let less = b.result_statement(Opcode::Less, &[lhs, b.int(bound).unwrap()]).unwrap();

        let fast = p.eval_bool(less).unwrap();
        let generic = p.evaluate(less).unwrap();
        prop_assert_eq!(generic, vec![Predefined::boolean(fast)]);
    }
}
