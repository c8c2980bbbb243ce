//! Creating, deleting and inspecting neurons.

use std::sync::Arc;

use cortex_core::{CoreError, NeuronId, NeuronKind, Opcode, Payload, Predefined};

use super::{core, neurons, render, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::{Number, Outcome};

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());
    let core = core(op);

    let outcome = match op {
        // New neurons are temporaries until something attaches them.
        Opcode::New => {
            let kind = Predefined::type_kind(args[0]).ok_or(InstructionError::ArgumentKind {
                op,
                position: 0,
                expected: "type neuron",
                found: args[0],
            })?;
            let id = p.temporary(kind, kind.default_payload())?;
            neurons(&brain, [id])
        }
        Opcode::NewCluster => {
            let id = brain.create_cluster(NeuronKind::Cluster, args[0]).map_err(&core)?;
            neurons(&brain, [id])
        }
        Opcode::Delete => {
            for &id in args {
                brain.neuron(id).map_err(&core)?;
                if id.is_predefined() {
                    return Err(core(CoreError::Predefined { id }));
                }
                let uses = brain.usage_count(id);
                if uses > 0 {
                    return Err(core(CoreError::InUse { id, uses }));
                }
            }
            for &id in args {
                brain.delete(id).map_err(&core)?;
            }
            Outcome::Empty
        }
        Opcode::TypeOf => {
            let kind = brain.kind_of(args[0]).map_err(&core)?;
            match Predefined::type_of(kind) {
                Some(ty) => neurons(&brain, [ty]),
                None => return Err(InstructionError::miss(op, format!("{kind:?} has no type neuron"))),
            }
        }
        Opcode::GetId => Outcome::Int(args[0].0 as i64),
        Opcode::SetValue => {
            let (target, source) = (args[0], args[1]);
            let kind = brain.kind_of(target).map_err(&core)?;
            let value = brain.payload(source).map_err(&core)?;
            let payload = match (kind, Number::from_payload(&value)) {
                (NeuronKind::Int, Some(n)) => Payload::Int(n.as_i64()),
                (NeuronKind::Double, Some(n)) => Payload::Double(n.as_f64()),
                _ => value,
            };
            brain.set_payload(target, payload).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::Concat => {
            let text: String = args.iter().map(|&id| render(&brain, id)).collect();
            let id = p.temporary(NeuronKind::Text, Payload::Text(text))?;
            neurons(&brain, [id])
        }
        other => return Err(unsupported(other, "neuron")),
    };
    Ok(outcome)
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
        let p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        (brain, p)
    }

    #[test]
    fn new_creates_a_temporary_of_the_type() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let new = b.result_statement(Opcode::New, &[Predefined::TextType.id()]).unwrap();
        let out = p.evaluate(new).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(brain.kind_of(out[0]).unwrap(), NeuronKind::Text);
        assert!(brain.is_temporary(out[0]));

        let type_of = b.result_statement(Opcode::TypeOf, &[out[0]]).unwrap();
        assert_eq!(p.evaluate(type_of).unwrap(), vec![Predefined::TextType.id()]);
    }

    #[test]
    fn delete_refuses_referenced_neurons_as_a_whole() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let [free, meaning, other] = [0, 1, 2].map(|_| brain.create(NeuronKind::Neuron));
        brain.insert_link(free, other, meaning).unwrap();

        p.run(b.statement(Opcode::Delete, &[other, meaning]).unwrap()).unwrap();
        assert!(brain.contains(other));
        assert!(brain.contains(meaning));

        p.run(b.statement(Opcode::Delete, &[other]).unwrap()).unwrap();
        assert!(!brain.contains(other));
        assert!(brain.links_out(free).unwrap().is_empty());
    }

    #[test]
    fn set_value_converts_numbers() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let target = b.int(0).unwrap();
        let source = b.double(7.9).unwrap();
        p.run(b.statement(Opcode::SetValue, &[target, source]).unwrap()).unwrap();
        assert_eq!(brain.payload(target).unwrap(), Payload::Int(7));

        let text = b.text("x").unwrap();
        p.run(b.statement(Opcode::SetValue, &[target, text]).unwrap()).unwrap();
        assert_eq!(brain.payload(target).unwrap(), Payload::Int(7));
    }

    #[test]
    fn concat_renders_texts_and_numbers() {
        let (brain, mut p) = setup();
        let b = CodeBuilder::new(&brain);
        let concat = b
            .result_statement(Opcode::Concat, &[b.text("n=").unwrap(), b.int(4).unwrap()])
            .unwrap();
        let out = p.evaluate(concat).unwrap();
        assert_eq!(brain.payload(out[0]).unwrap(), Payload::Text("n=4".into()));
    }
}
