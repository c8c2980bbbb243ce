//! Structural invariants of the brain under arbitrary operation sequences.

use proptest::prelude::*;

use cortex_core::{Aspect, Brain, LinkKey, NeuronId, NeuronKind};

/// Every id in every adjacency list of every neuron refers to a live
/// neuron, and both sides of every relation agree.
fn assert_no_dangling(brain: &Brain) {
    for id in brain.ids() {
        let neuron = brain.find(id).expect("registered id must be live");
        for key in brain.links_out(id).unwrap() {
            assert_eq!(key.from, id);
            assert!(brain.contains(key.to), "dangling link target in {key}");
            assert!(brain.link_exists(key));
            assert!(brain.links_in(key.to).unwrap().contains(&key));
        }
        for key in brain.links_in(id).unwrap() {
            assert_eq!(key.to, id);
            assert!(brain.contains(key.from), "dangling link source in {key}");
        }
        for owner in brain.clustered_by(id).unwrap() {
            assert!(brain.contains(owner), "dangling owner {owner} of {id}");
        }
        if neuron.is_cluster() {
            let children = brain.children(id).unwrap();
            for &child in &children {
                assert!(brain.contains(child), "dangling child {child} of {id}");
                let occurrences = children.iter().filter(|&&c| c == child).count();
                let owners = brain
                    .clustered_by(child)
                    .unwrap()
                    .iter()
                    .filter(|&&o| o == id)
                    .count();
                assert_eq!(occurrences, owners, "child/owner multiplicity of {child} in {id}");
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    AddChild(usize, usize),
    InsertChild(usize, usize, usize),
    RemoveChildAt(usize, usize),
    InsertLink(usize, usize, usize),
    RemoveLinksOut(usize),
    AddInfo(usize, usize),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..12usize, 0..12usize).prop_map(|(c, n)| Op::AddChild(c, n)),
        (0..12usize, 0..12usize, 0..6usize).prop_map(|(c, n, i)| Op::InsertChild(c, n, i)),
        (0..12usize, 0..6usize).prop_map(|(c, i)| Op::RemoveChildAt(c, i)),
        (0..12usize, 0..12usize, 0..12usize).prop_map(|(f, t, m)| Op::InsertLink(f, t, m)),
        (0..12usize).prop_map(Op::RemoveLinksOut),
        (0..12usize, 0..12usize).prop_map(|(l, i)| Op::AddInfo(l, i)),
        (0..12usize).prop_map(Op::Delete),
    ]
}

fn pick(pool: &[NeuronId], i: usize) -> NeuronId {
    pool[i % pool.len()]
}

proptest! {
    #[test]
    fn insert_child_preserves_order(len in 0usize..20, seed in any::<usize>()) {
        let brain = Brain::new();
        let cluster = brain.create_cluster(NeuronKind::Cluster, NeuronId::EMPTY).unwrap();
        let existing: Vec<NeuronId> = (0..len).map(|_| brain.create(NeuronKind::Neuron)).collect();
        brain.add_children(cluster, &existing).unwrap();

        let index = seed % (len + 1);
        let new = brain.create(NeuronKind::Neuron);
        brain.insert_child(cluster, new, index).unwrap();

        let children = brain.children(cluster).unwrap();
        prop_assert_eq!(children.len(), len + 1);
        prop_assert_eq!(children[index], new);
        let rest: Vec<NeuronId> = children.iter().copied().filter(|&c| c != new).collect();
        prop_assert_eq!(rest, existing);
    }

    #[test]
    fn random_edits_never_leave_dangling_ids(ops in prop::collection::vec(arb_op(), 1..60)) {
        let brain = Brain::new();
        let mut pool: Vec<NeuronId> = Vec::new();
        for i in 0..12 {
            let id = if i % 3 == 0 {
                brain.create_cluster(NeuronKind::Cluster, NeuronId::EMPTY).unwrap()
            } else {
                brain.create(NeuronKind::Neuron)
            };
            pool.push(id);
        }
        let mut links: Vec<LinkKey> = Vec::new();

        for op in ops {
            // Errors are expected (wrong kind, duplicates, in use, deleted);
            // the invariant must hold either way.
            match op {
                Op::AddChild(c, n) => { let _ = brain.add_child(pick(&pool, c), pick(&pool, n)); }
                Op::InsertChild(c, n, i) => { let _ = brain.insert_child(pick(&pool, c), pick(&pool, n), i); }
                Op::RemoveChildAt(c, i) => { let _ = brain.remove_child_at(pick(&pool, c), i); }
                Op::InsertLink(f, t, m) => {
                    if let Ok(key) = brain.insert_link(pick(&pool, f), pick(&pool, t), pick(&pool, m)) {
                        links.push(key);
                    }
                }
                Op::RemoveLinksOut(f) => { let _ = brain.remove_links_out(pick(&pool, f), &[]); }
                Op::AddInfo(l, i) => {
                    if !links.is_empty() {
                        let _ = brain.add_info(links[l % links.len()], &[pick(&pool, i)]);
                    }
                }
                Op::Delete(n) => { let _ = brain.delete(pick(&pool, n)); }
            }
            assert_no_dangling(&brain);
        }
    }
}

#[test]
fn cluster_scenario() {
    let brain = Brain::new();
    let m = brain.create(NeuronKind::Neuron);
    let c = brain.create_cluster(NeuronKind::Cluster, m).unwrap();
    let a = brain.create(NeuronKind::Neuron);
    let b = brain.create(NeuronKind::Neuron);
    brain.add_children(c, &[a, b]).unwrap();

    assert_eq!(brain.index_of_child(c, b).unwrap(), Some(1));

    let x = brain.create(NeuronKind::Neuron);
    brain.insert_child(c, x, 1).unwrap();
    assert_eq!(brain.children(c).unwrap(), vec![a, x, b]);

    brain.remove_child(c, x).unwrap();
    assert_eq!(brain.children(c).unwrap(), vec![a, b]);
    assert!(brain.clustered_by(x).unwrap().is_empty());
}

#[test]
fn link_scenario() {
    let brain = Brain::new();
    let f = brain.create(NeuronKind::Neuron);
    let t = brain.create(NeuronKind::Neuron);
    let meaning = brain.create(NeuronKind::Neuron);

    let key = brain.insert_link(f, t, meaning).unwrap();
    assert_eq!(brain.links_out(f).unwrap().len(), 1);
    assert!(brain.insert_link(f, t, meaning).is_err());
    assert_eq!(brain.link_count(), 1);

    brain.remove_link(key).unwrap();
    assert_eq!(brain.links_out(f).unwrap().len(), 0);
}

#[test]
fn untouched_lists_stay_absent() {
    let brain = Brain::new();
    let n = brain.create(NeuronKind::Neuron);
    // Reading does not materialize anything.
    assert!(brain.links_out(n).unwrap().is_empty());
    let neuron = brain.find(n).unwrap();
    assert!(!neuron.is_materialized(Aspect::LinksOut));

    let parts = brain.neuron_parts(n).unwrap();
    assert!(parts.links_out.is_none());
    assert!(parts.clustered_by.is_none());
}
