//! Timer neurons. The processor only edits their state; firing them is up to
//! an external scheduler reading [`Brain::active_timers`](cortex_core::Brain::active_timers).

use std::sync::Arc;

use cortex_core::{CoreError, NeuronId, NeuronKind, Opcode, Payload, TimerState};

use super::{core, expect_kind, index, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());
    let timer = args[0];
    expect_kind(&brain, op, timer, 0, NeuronKind::Timer, "timer")?;

    let outcome = match op {
        Opcode::StartTimer | Opcode::StopTimer => {
            let active = op == Opcode::StartTimer;
            edit(&brain, op, timer, |t| t.active = active)?;
            tracing::debug!(%timer, active, "timer toggled");
            Outcome::Empty
        }
        Opcode::SetTimerInterval => {
            let interval = index(p, op, args, 1).map_err(|_| InstructionError::ArgumentKind {
                op,
                position: 1,
                expected: "non-negative interval",
                found: args[1],
            })?;
            edit(&brain, op, timer, |t| t.interval_ms = interval as u64)?;
            Outcome::Empty
        }
        Opcode::GetTimerInterval => Outcome::Int(state(&brain, op, timer)?.interval_ms as i64),
        Opcode::IsTimerActive => Outcome::Bool(state(&brain, op, timer)?.active),
        other => return Err(unsupported(other, "timer")),
    };
    Ok(outcome)
}

fn state(brain: &cortex_core::Brain, op: Opcode, timer: NeuronId) -> Result<TimerState, InstructionError> {
    match brain.payload(timer).map_err(core(op))? {
        Payload::Timer(state) => Ok(state),
        _ => Ok(TimerState::default()),
    }
}

fn edit(
    brain: &cortex_core::Brain,
    op: Opcode,
    timer: NeuronId,
    f: impl FnOnce(&mut TimerState),
) -> Result<(), InstructionError> {
    brain
        .update_payload(timer, |payload| match payload {
            Payload::Timer(state) => {
                f(state);
                Ok(())
            }
            _ => Err(CoreError::InvalidPayload {
                id: timer,
                kind: NeuronKind::Timer,
            }),
        })
        .map_err(core(op))
}
