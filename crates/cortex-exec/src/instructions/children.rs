//! Cluster children and meanings.

use std::sync::Arc;

use cortex_core::{NeuronId, Opcode};

use super::{core, index, neurons, one, unsupported};
use crate::error::InstructionError;
use crate::processor::Processor;
use crate::value::Outcome;

pub(super) fn execute(p: &mut Processor, op: Opcode, args: &[NeuronId]) -> Result<Outcome, InstructionError> {
    let brain = Arc::clone(p.brain());
    let core = core(op);
    let cluster = args[0];

    let outcome = match op {
        Opcode::ChildCount => Outcome::Int(brain.child_count(cluster).map_err(&core)? as i64),
        Opcode::GetChildren => neurons(&brain, brain.children(cluster).map_err(&core)?),
        Opcode::GetFirstChild => {
            let children = brain.children(cluster).map_err(&core)?;
            one(&brain, op, children.first().copied(), "cluster has no children")?
        }
        Opcode::GetLastChild => {
            let children = brain.children(cluster).map_err(&core)?;
            one(&brain, op, children.last().copied(), "cluster has no children")?
        }
        Opcode::GetChildAt => {
            let at = index(p, op, args, 1)?;
            neurons(&brain, [brain.child_at(cluster, at).map_err(&core)?])
        }
        Opcode::IndexOfChild => match brain.index_of_child(cluster, args[1]).map_err(&core)? {
            Some(i) => Outcome::Int(i as i64),
            None => {
                tracing::debug!(%cluster, child = %args[1], "child not found");
                Outcome::Int(-1)
            }
        },
        Opcode::ContainsChild => Outcome::Bool(brain.index_of_child(cluster, args[1]).map_err(&core)?.is_some()),
        Opcode::AddChild => {
            brain.add_children(cluster, &args[1..]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::InsertChild => {
            let at = index(p, op, args, 2)?;
            brain.insert_child(cluster, args[1], at).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::SetChild => {
            let at = index(p, op, args, 2)?;
            brain.set_child(cluster, at, args[1]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveChild => {
            brain.remove_children(cluster, &args[1..]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::RemoveChildAt => {
            let at = index(p, op, args, 1)?;
            brain.remove_child_at(cluster, at).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::ClearChildren => {
            brain.clear_children(cluster).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::GetClusterMeaning => neurons(&brain, brain.meaning(cluster).map_err(&core)?),
        Opcode::SetClusterMeaning => {
            brain.set_meaning(cluster, args[1]).map_err(&core)?;
            Outcome::Empty
        }
        Opcode::GetClusters => neurons(&brain, brain.clustered_by(cluster).map_err(&core)?),
        Opcode::GetClustersWithMeaning => {
            let meaning = args[1];
            let owners = brain.clustered_by(cluster).map_err(&core)?;
            let mut matching = Vec::with_capacity(owners.len());
            for owner in owners {
                if brain.meaning(owner).ok().flatten() == Some(meaning) {
                    matching.push(owner);
                }
            }
            neurons(&brain, matching)
        }
        Opcode::ClusterCount => Outcome::Int(brain.clustered_by(cluster).map_err(&core)?.len() as i64),
        other => return Err(unsupported(other, "children")),
    };
    Ok(outcome)
}
