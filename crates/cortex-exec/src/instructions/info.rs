//! Link info lists. Every instruction addresses its link with the first
//! three arguments `from, to, meaning`.

use std::sync::Arc;

use cortex_core::{LinkKey, NeuronId, Opcode};

use super::{core, index, neurons, one, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());
    let core = core(op);
    let key = LinkKey::new(args[0], args[1], args[2]);

    let outcome = match op {
        Opcode::GetInfo => neurons(&brain, brain.info(key).map_err(&core)?),
        Opcode::GetFirstInfo => {
            let info = brain.info(key).map_err(&core)?;
            one(&brain, op, info.first().copied(), "link has no info")?
        }
        Opcode::GetLastInfo => {
            let info = brain.info(key).map_err(&core)?;
            one(&brain, op, info.last().copied(), "link has no info")?
        }
        Opcode::GetInfoAt => {
            let at = index(p, op, args, 3)?;
            let info = brain.info(key).map_err(&core)?;
            let item = info.get(at).copied().ok_or(InstructionError::IndexOutOfRange {
                op,
                index: at as i64,
                len: info.len(),
            })?;
            neurons(&brain, [item])
        }
        Opcode::InfoCount => Outcome::Int(brain.info(key).map_err(&core)?.len() as i64),
        Opcode::IndexOfInfo => {
            let info = brain.info(key).map_err(&core)?;
            match info.iter().position(|&i| i == args[3]) {
                Some(i) => Outcome::Int(i as i64),
                None => {
                    tracing::debug!(%key, item = %args[3], "info item not found");
                    Outcome::Int(-1)
                }
            }
        }
        Opcode::AddInfo => {
            brain.add_info(key, &args[3..]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::InsertInfo => {
            let at = index(p, op, args, 4)?;
            brain.insert_info(key, args[3], at).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::SetInfoAt => {
            let at = index(p, op, args, 4)?;
            brain.set_info(key, at, args[3]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveInfo => {
            brain.remove_info_items(key, &args[3..]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveInfoAt => {
            let at = index(p, op, args, 3)?;
            brain.remove_info_at(key, at).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::ClearInfo => {
            brain.clear_info(key).map_err(&core)?;
            Outcome::Empty
        }
        other => return Err(unsupported(other, "info")),
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
    fn info_list_editing() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [f, t, m, i1, i2, i3] = [0, 1, 2, 3, 4, 5].map(|_| brain.create(NeuronKind::Neuron));
        let key = brain.insert_link(f, t, m).unwrap();

        let zero = b.int(0).unwrap();
        let code = b
            .code(&[
                b.statement(Opcode::AddInfo, &[f, t, m, i1, i3]).unwrap(),
                b.statement(Opcode::InsertInfo, &[f, t, m, i2, b.int(1).unwrap()]).unwrap(),
                b.statement(Opcode::SetInfoAt, &[f, t, m, i1, b.int(2).unwrap()]).unwrap(),
            ])
            .unwrap();
        p.run(code).unwrap();
        assert_eq!(brain.info(key).unwrap(), vec![i1, i2, i1]);

        let at = b.result_statement(Opcode::GetInfoAt, &[f, t, m, zero]).unwrap();
        assert_eq!(p.evaluate(at).unwrap(), vec![i1]);
        let idx = b.result_statement(Opcode::IndexOfInfo, &[f, t, m, i3]).unwrap();
        assert_eq!(p.eval_int(idx).unwrap(), Some(-1));

        p.run(b.statement(Opcode::RemoveInfo, &[f, t, m, i1, i1]).unwrap()).unwrap();
        assert_eq!(brain.info(key).unwrap(), vec![i2]);
    }

    #[test]
    fn last_info_is_the_last_item() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [f, t, m, i1, i2] = [0, 1, 2, 3, 4].map(|_| brain.create(NeuronKind::Neuron));
        let key = brain.insert_link(f, t, m).unwrap();

        let last = b.result_statement(Opcode::GetLastInfo, &[f, t, m]).unwrap();
        // Empty info list: a logged miss, not an out-of-bounds read.
        assert!(p.evaluate(last).unwrap().is_empty());

        brain.add_info(key, &[i1, i2]).unwrap();
        assert_eq!(p.evaluate(last).unwrap(), vec![i2]);
        let first = b.result_statement(Opcode::GetFirstInfo, &[f, t, m]).unwrap();
        assert_eq!(p.evaluate(first).unwrap(), vec![i1]);
    }

    #[test]
    fn out_of_range_index_changes_nothing() {
        let brain = Arc::new(Brain::new());
        let mut p = Processor::new(Arc::clone(&brain), ProcessorConfig::default());
        let b = CodeBuilder::new(&brain);
        let [f, t, m, i1] = [0, 1, 2, 3].map(|_| brain.create(NeuronKind::Neuron));
        let key = brain.insert_link(f, t, m).unwrap();
        brain.add_info(key, &[i1]).unwrap();

        p.run(b.statement(Opcode::RemoveInfoAt, &[f, t, m, b.int(5).unwrap()]).unwrap())
            .unwrap();
        p.run(b.statement(Opcode::RemoveInfoAt, &[f, t, m, b.int(-1).unwrap()]).unwrap())
            .unwrap();
        assert_eq!(brain.info(key).unwrap(), vec![i1]);
    }
}
