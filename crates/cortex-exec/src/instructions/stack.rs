//! The neuron and value stacks, control transfer, calls and solving.

use std::sync::Arc;

use cortex_core::{NeuronId, NeuronKind, Opcode};

use super::{core, one, render, unsupported};
use crate::error::InstructionError;
use crate::processor::{is_system_variable, Processor};
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());

    let outcome = match op {
        Opcode::Push => {
            p.neurons.extend_from_slice(args);
            Outcome::Empty
        }
        Opcode::Pop => one(&brain, op, p.neurons.pop(), "neuron stack is empty")?,
        Opcode::Peek => one(&brain, op, p.neurons.last().copied(), "neuron stack is empty")?,
        Opcode::StackCount => Outcome::Int(p.neurons.len() as i64),
        Opcode::PushValue => {
            p.values.push(args.to_vec());
            Outcome::Empty
        }
        Opcode::PopValue => {
            for (position, &variable) in args.iter().enumerate() {
                let kind = brain.kind_of(variable).map_err(core(op))?;
                if kind != NeuronKind::Variable || is_system_variable(variable) {
                    return Err(InstructionError::ArgumentKind {
                        op,
                        position,
                        expected: "writable local variable",
                        found: variable,
                    });
                }
            }
            if p.values.len() < args.len() {
                return Err(InstructionError::miss(
                    op,
                    format!("value stack holds {} of {} entries", p.values.len(), args.len()),
                ));
            }
            for &variable in args {
                let values = p.values.pop().unwrap_or_default();
                p.bind_saved(variable, values);
            }
            Outcome::Empty
        }
        Opcode::Return => {
            p.do_return(op, args.to_vec())?;
            Outcome::Empty
        }
        Opcode::ReturnValueIf => {
            if p.eval_truth(args[0])? {
                let values = p.resolve(&args[1..])?;
                p.do_return(op, values.to_vec())?;
            }
            Outcome::Empty
        }
        Opcode::ExitConditional => {
            p.exit_conditional(op)?;
            Outcome::Empty
        }
        Opcode::ExitLink => {
            p.exit_link(op)?;
            Outcome::Empty
        }
        Opcode::Break => {
            p.break_loop(op)?;
            Outcome::Empty
        }
        Opcode::Continue => {
            p.continue_loop(op)?;
            Outcome::Empty
        }
        Opcode::Call => Outcome::Neurons(p.call_code(args[0], &args[1..])?),
        Opcode::Solve => {
            let base = p.neurons.len();
            // Reversed, so the first argument is solved first.
            p.neurons.extend(args.iter().rev());
            p.solve_stack(base)?;
            Outcome::Empty
        }
        Opcode::Log => {
            let line = args.iter().map(|&id| render(&brain, id)).collect::<Vec<_>>().join(" ");
            p.write_log(line);
            Outcome::Empty
        }
        other => return Err(unsupported(other, "stack")),
    };
    Ok(outcome)
}
