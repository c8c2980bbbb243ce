//! Links between neurons.

use std::sync::Arc;

use cortex_core::{Aspect, LinkKey, NeuronId, Opcode};

use super::{core, neurons, one, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());
    let core = core(op);
    let subject = args[0];

    let outcome = match op {
        Opcode::LinkOutCount => Outcome::Int(brain.links_out(subject).map_err(&core)?.len() as i64),
        Opcode::LinkInCount => Outcome::Int(brain.links_in(subject).map_err(&core)?.len() as i64),
        Opcode::GetFirstOut => {
            let meaning = args[1];
            let links = brain.links_out(subject).map_err(&core)?;
            let to = links.iter().find(|k| k.meaning == meaning).map(|k| k.to);
            one(&brain, op, to, "no outgoing link with that meaning")?
        }
        Opcode::GetOutgoing => {
            let meaning = args[1];
            let links = brain.links_out(subject).map_err(&core)?;
            neurons(&brain, links.iter().filter(|k| k.meaning == meaning).map(|k| k.to))
        }
        Opcode::GetFirstIn => {
            let meaning = args[1];
            let links = brain.links_in(subject).map_err(&core)?;
            let from = links.iter().find(|k| k.meaning == meaning).map(|k| k.from);
            one(&brain, op, from, "no incoming link with that meaning")?
        }
        Opcode::GetIncoming => {
            let meaning = args[1];
            let links = brain.links_in(subject).map_err(&core)?;
            neurons(&brain, links.iter().filter(|k| k.meaning == meaning).map(|k| k.from))
        }
        Opcode::GetOutMeanings => neurons(&brain, brain.link_meanings(subject, Aspect::LinksOut).map_err(&core)?),
        Opcode::GetInMeanings => neurons(&brain, brain.link_meanings(subject, Aspect::LinksIn).map_err(&core)?),
        Opcode::LinkExists => Outcome::Bool(brain.link_exists(LinkKey::new(args[0], args[1], args[2]))),
        Opcode::InsertLink => {
            brain.insert_link(args[0], args[1], args[2]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveLink => {
            brain.remove_link(LinkKey::new(args[0], args[1], args[2])).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveLinksOut | Opcode::RemoveLinksIn => {
            let meanings = &args[1..];
            let removed = if op == Opcode::RemoveLinksOut {
                brain.remove_links_out(subject, meanings)
            } else {
                brain.remove_links_in(subject, meanings)
            }
            .map_err(&core)?;
            tracing::debug!(%subject, removed, "links removed");
            Outcome::Empty
        }
        Opcode::SetFirstOut => {
            brain.set_first_out(args[0], args[1], args[2]).map_err(&core)?;
            Outcome::Empty
        }
        other => return Err(unsupported(other, "links")),
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cortex_core::{Brain, NeuronKind, Opcode};

    use crate::builder::CodeBuilder;
    use crate::config::ProcessorConfig;
    use crate::processor::Processor;

    #[test]
    fn insert_count_remove_scenario() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [a, c, m] = [0, 1, 2].map(|_| brain.create(NeuronKind::Neuron));

        let count = b.result_statement(Opcode::LinkOutCount, &[a]).unwrap();
        let insert = b.statement(Opcode::InsertLink, &[a, c, m]).unwrap();
        p.run(insert).unwrap();
        assert_eq!(p.eval_int(count).unwrap(), Some(1));

        // A second insert of the same triple is rejected and changes nothing.
        p.run(insert).unwrap();
        assert_eq!(p.eval_int(count).unwrap(), Some(1));

        let first = b.result_statement(Opcode::GetFirstOut, &[a, m]).unwrap();
        assert_eq!(p.evaluate(first).unwrap(), vec![c]);
        let exists = b.result_statement(Opcode::LinkExists, &[a, c, m]).unwrap();
        assert!(p.eval_bool(exists).unwrap());

        p.run(b.statement(Opcode::RemoveLink, &[a, c, m]).unwrap()).unwrap();
        assert_eq!(p.eval_int(count).unwrap(), Some(0));
        assert!(!p.eval_bool(exists).unwrap());
        assert!(brain.links_in(c).unwrap().is_empty());
        assert!(p.evaluate(first).unwrap().is_empty());
    }

    #[test]
    fn remove_links_out_by_meaning() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [a, t, m1, m2] = [0, 1, 2, 3].map(|_| brain.create(NeuronKind::Neuron));
        brain.insert_link(a, t, m1).unwrap();
        brain.insert_link(a, t, m2).unwrap();

        let meanings = b.result_statement(Opcode::GetOutMeanings, &[a]).unwrap();
        assert_eq!(p.evaluate(meanings).unwrap(), vec![m1, m2]);

        p.run(b.statement(Opcode::RemoveLinksOut, &[a, m1]).unwrap()).unwrap();
        assert_eq!(brain.link_meanings(a, cortex_core::Aspect::LinksOut).unwrap(), vec![m2]);
        p.run(b.statement(Opcode::RemoveLinksOut, &[a]).unwrap()).unwrap();
        assert!(brain.links_out(a).unwrap().is_empty());
    }

    #[test]
    fn set_first_out_replaces_target() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [a, t1, t2, m] = [0, 1, 2, 3].map(|_| brain.create(NeuronKind::Neuron));
        brain.insert_link(a, t1, m).unwrap();
        p.run(b.statement(Opcode::SetFirstOut, &[a, m, t2]).unwrap()).unwrap();
        let outgoing = b.result_statement(Opcode::GetOutgoing, &[a, m]).unwrap();
        assert_eq!(p.evaluate(outgoing).unwrap(), vec![t2]);
        let incoming = b.result_statement(Opcode::GetIncoming, &[t2, m]).unwrap();
        assert_eq!(p.evaluate(incoming).unwrap(), vec![a]);
    }
}
