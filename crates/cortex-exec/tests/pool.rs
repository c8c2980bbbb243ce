//! Concurrent runs through a processor pool.

use std::sync::Arc;

use cortex_core::{Brain, BrainEvent, CancelToken, NeuronKind, Opcode, Payload};
use cortex_exec::{CodeBuilder, ExecError, PoolConfig, ProcessorConfig, ProcessorPool};

#[test]
fn concurrent_runs_serialize_on_a_shared_cluster() {
    let brain = Arc::new(Brain::new());
    let pool = ProcessorPool::new(
        Arc::clone(&brain),
        ProcessorConfig::default(),
        PoolConfig {
            min_size: 1,
            max_size: 3,
            acquire_timeout_ms: 10_000,
        },
    );
    let b = CodeBuilder::new(&brain);
    let holder = brain.create(NeuronKind::Cluster);
    let roots: Vec<_> = (0..12)
        .map(|n| {
            let item = b.int(n).unwrap();
            b.code(&[b.statement(Opcode::AddChild, &[holder, item]).unwrap()])
                .unwrap()
        })
        .collect();

    let events = brain.subscribe();
    let results = pool.run_many(&roots, &CancelToken::new());
    assert_eq!(results.len(), roots.len());
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(brain.child_count(holder).unwrap(), 12);

    let status = pool.status();
    assert_eq!(status.busy, 0);
    assert!(status.alive >= 1 && status.alive <= 3);

    let activity: Vec<BrainEvent> = events
        .try_iter()
        .filter(|e| matches!(e, BrainEvent::ActivityStarted | BrainEvent::ActivityStopped))
        .collect();
    assert_eq!(activity.first(), Some(&BrainEvent::ActivityStarted));
    assert_eq!(activity.last(), Some(&BrainEvent::ActivityStopped));
    let started = activity.iter().filter(|e| **e == BrainEvent::ActivityStarted).count();
    assert_eq!(started * 2, activity.len());
}

#[test]
fn cancelled_runs_do_not_start() {
    let brain = Arc::new(Brain::new());
    let pool = ProcessorPool::new(Arc::clone(&brain), ProcessorConfig::default(), PoolConfig::default());
    let b = CodeBuilder::new(&brain);
    let root = b.code(&[b.statement(Opcode::StackCount, &[]).unwrap()]).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let results = pool.run_many(&[root, root], &cancel);
    assert!(results.iter().all(|r| matches!(r, Err(ExecError::Cancelled))));
}

#[test]
fn run_returns_the_program_result() {
    let brain = Arc::new(Brain::new());
    let pool = ProcessorPool::new(Arc::clone(&brain), ProcessorConfig::default(), PoolConfig::default());
    let b = CodeBuilder::new(&brain);
    let x = brain.create(NeuronKind::Neuron);
    let root = b.code(&[b.statement(Opcode::Return, &[x]).unwrap()]).unwrap();
    assert_eq!(pool.run(root).unwrap(), vec![x]);
}

#[test]
fn computed_results_outlive_the_pooled_processor() {
    let brain = Arc::new(Brain::new());
    let pool = ProcessorPool::new(Arc::clone(&brain), ProcessorConfig::default(), PoolConfig::default());
    let b = CodeBuilder::new(&brain);
    let sum = b
        .result_statement(Opcode::Add, &[b.int(2).unwrap(), b.int(3).unwrap()])
        .unwrap();
    let root = b.code(&[b.statement(Opcode::Return, &[sum]).unwrap()]).unwrap();

    let out = pool.run(root).unwrap();
    assert_eq!(out.len(), 1);
    assert!(brain.contains(out[0]));
    assert!(!brain.is_temporary(out[0]));
    assert_eq!(brain.payload(out[0]).unwrap(), Payload::Int(5));

    let many = pool.run_many(&[root, root], &CancelToken::new());
    for result in many {
        let out = result.unwrap();
        assert_eq!(brain.payload(out[0]).unwrap(), Payload::Int(5));
    }
}
