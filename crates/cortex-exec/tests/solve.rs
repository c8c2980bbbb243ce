//! Solving neurons through the rule code attached to link meanings.

use std::sync::Arc;

use cortex_core::{Brain, ConditionalKind, NeuronKind, Opcode, Predefined};
use cortex_exec::{CodeBuilder, Processor, ProcessorConfig};

fn setup() -> (Arc<Brain>, Processor) {
    let brain = Arc::new(Brain::new());
    let p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
    (brain, p)
}

#[test]
fn rule_code_sees_the_link_being_solved() {
    let (brain, mut p) = setup();
    let b = CodeBuilder::new(&brain);
    let [from, to, meaning, note] = [0, 1, 2, 3].map(|_| brain.create(NeuronKind::Neuron));
    let key = brain.insert_link(from, to, meaning).unwrap();
    brain.add_info(key, &[note]).unwrap();

    let seen = b.global().unwrap();
    let info = b.global().unwrap();
    let rule = b
        .code(&[
            b.assignment(
                seen,
                &[
                    Predefined::CurrentFrom.id(),
                    Predefined::CurrentTo.id(),
                    Predefined::CurrentMeaning.id(),
                ],
            )
            .unwrap(),
            b.assignment(info, &[Predefined::CurrentInfo.id()]).unwrap(),
        ])
        .unwrap();
    b.rules(meaning, rule).unwrap();

    p.solve(from).unwrap();
    assert_eq!(p.global(seen), Some(vec![from, to, meaning]));
    assert_eq!(p.global(info), Some(vec![note]));
    assert!(p.neuron_stack().is_empty());
    assert!(p.is_idle());
}

#[test]
fn neurons_pushed_by_rules_are_solved_in_turn() {
    let (brain, mut p) = setup();
    let b = CodeBuilder::new(&brain);
    let [first, second, third, next] = [0, 1, 2, 3].map(|_| brain.create(NeuronKind::Neuron));
    brain.insert_link(first, second, next).unwrap();
    brain.insert_link(second, third, next).unwrap();

    let last = b.global().unwrap();
    let rule = b
        .code(&[
            b.assignment(last, &[Predefined::CurrentTo.id()]).unwrap(),
            b.statement(Opcode::Push, &[Predefined::CurrentTo.id()]).unwrap(),
        ])
        .unwrap();
    b.rules(next, rule).unwrap();

    let code = b.code(&[b.statement(Opcode::Solve, &[first]).unwrap()]).unwrap();
    p.run(code).unwrap();
    assert_eq!(p.global(last), Some(vec![third]));
    assert!(p.neuron_stack().is_empty());
}

#[test]
fn exit_link_abandons_the_rest_of_the_rule() {
    let (brain, mut p) = setup();
    let b = CodeBuilder::new(&brain);
    let [from, to, meaning] = [0, 1, 2].map(|_| brain.create(NeuronKind::Neuron));
    brain.insert_link(from, to, meaning).unwrap();

    let reached = b.global().unwrap();
    let leave = b
        .part(None, &[b.statement(Opcode::ExitLink, &[]).unwrap()])
        .unwrap();
    let rule = b
        .code(&[
            b.conditional(ConditionalKind::If, &[leave]).unwrap(),
            b.assignment(reached, &[Predefined::True.id()]).unwrap(),
        ])
        .unwrap();
    b.rules(meaning, rule).unwrap();

    p.solve(from).unwrap();
    assert_eq!(p.global(reached), None);
    assert!(p.is_idle());
}

#[test]
fn system_variables_are_read_only_and_empty_outside_links() {
    let (brain, mut p) = setup();
    let b = CodeBuilder::new(&brain);
    let x = brain.create(NeuronKind::Neuron);
    let code = b
        .code(&[b.assignment(Predefined::CurrentTo.id(), &[x]).unwrap()])
        .unwrap();
    p.run(code).unwrap();
    assert!(p.evaluate(Predefined::CurrentTo.id()).unwrap().is_empty());
}
