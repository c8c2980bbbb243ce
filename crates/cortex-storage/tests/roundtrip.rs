//! Persistence round trips across every backend.

use proptest::prelude::*;

use cortex_core::{Brain, BrainConfig, CancelToken, LinkKey, NeuronId, NeuronKind, Payload};
use cortex_storage::{decompose, GraphStore, InMemoryStore, JsonFileStore, SqliteStore};

#[derive(Debug, Clone)]
enum Op {
    Int(i64),
    Double(f64),
    Text(String),
    Cluster(usize),
    AddChild(usize, usize),
    InsertChild(usize, usize, usize),
    Link(usize, usize, usize),
    Info(usize, usize),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i64>().prop_map(Op::Int),
        any::<f64>().prop_filter("finite", |v| v.is_finite()).prop_map(Op::Double),
        "[a-z ]{0,12}".prop_map(Op::Text),
        (0..32usize).prop_map(Op::Cluster),
        (0..32usize, 0..32usize).prop_map(|(c, n)| Op::AddChild(c, n)),
        (0..32usize, 0..32usize, 0..4usize).prop_map(|(c, n, i)| Op::InsertChild(c, n, i)),
        (0..32usize, 0..32usize, 0..32usize).prop_map(|(f, t, m)| Op::Link(f, t, m)),
        (0..32usize, 0..32usize).prop_map(|(l, i)| Op::Info(l, i)),
        (0..32usize).prop_map(Op::Delete),
    ]
}

/// Applies `ops` to `brain`; `pool` and `links` track what was created.
fn apply(brain: &Brain, pool: &mut Vec<NeuronId>, links: &mut Vec<LinkKey>, ops: &[Op]) {
    let pick = |pool: &[NeuronId], i: usize| pool[i % pool.len()];
    for op in ops {
        // Failing edits (wrong kind, duplicates, in use) are part of the
        // workload; they must leave the graph intact.
        match op.clone() {
            Op::Int(v) => pool.push(brain.create_with(NeuronKind::Int, Payload::Int(v)).unwrap()),
            Op::Double(v) => pool.push(brain.create_with(NeuronKind::Double, Payload::Double(v)).unwrap()),
            Op::Text(s) => pool.push(brain.create_with(NeuronKind::Text, Payload::Text(s)).unwrap()),
            Op::Cluster(m) => {
                // The meaning may already be deleted.
                if let Ok(id) = brain.create_cluster(NeuronKind::Cluster, pick(pool, m)) {
                    pool.push(id);
                }
            }
            Op::AddChild(c, n) => {
                let _ = brain.add_child(pick(pool, c), pick(pool, n));
            }
            Op::InsertChild(c, n, i) => {
                let _ = brain.insert_child(pick(pool, c), pick(pool, n), i);
            }
            Op::Link(f, t, m) => {
                if let Ok(key) = brain.insert_link(pick(pool, f), pick(pool, t), pick(pool, m)) {
                    links.push(key);
                }
            }
            Op::Info(l, i) => {
                if !links.is_empty() {
                    let _ = brain.add_info(links[l % links.len()], &[pick(pool, i)]);
                }
            }
            Op::Delete(n) => {
                let _ = brain.delete(pick(pool, n));
            }
        }
    }
}

fn seeded_brain(ops: &[Op]) -> (Brain, Vec<NeuronId>, Vec<LinkKey>) {
    let brain = Brain::new();
    let mut pool = vec![brain.create(NeuronKind::Neuron), brain.create(NeuronKind::Neuron)];
    let mut links = Vec::new();
    apply(&brain, &mut pool, &mut links, ops);
    (brain, pool, links)
}

/// save(load(save(G))) == save(G) for one backend.
fn assert_roundtrip(store: &mut dyn GraphStore, brain: &Brain) {
    let cancel = CancelToken::new();
    store.save_brain(brain, &cancel).unwrap();
    let first = store.load_document().unwrap();
    assert_eq!(first, decompose(brain).unwrap());

    let loaded = store.load_brain(BrainConfig::default(), &cancel).unwrap();
    store.save_brain(&loaded, &cancel).unwrap();
    assert_eq!(store.load_document().unwrap(), first);
}

/// Every double reloads bit-for-bit from `store`.
fn assert_doubles_exact(store: &mut dyn GraphStore, values: &[f64]) {
    let brain = Brain::new();
    let ids: Vec<NeuronId> = values
        .iter()
        .map(|&v| brain.create_with(NeuronKind::Double, Payload::Double(v)).unwrap())
        .collect();
    let cancel = CancelToken::new();
    store.save_brain(&brain, &cancel).unwrap();
    let loaded = store.load_brain(BrainConfig::default(), &cancel).unwrap();
    for (&id, &v) in ids.iter().zip(values) {
        match loaded.payload(id).unwrap() {
            Payload::Double(found) => assert_eq!(found.to_bits(), v.to_bits(), "double {v:e}"),
            other => panic!("expected a double, got {other:?}"),
        }
    }
}

#[test]
fn hard_to_parse_doubles_reload_exactly() {
    let values = [1.0715660391465826e-75, 0.1, -2.2250738585072014e-308, 5e-324, f64::MAX, 1.0 / 3.0];
    let dir = tempfile::tempdir().unwrap();
    assert_doubles_exact(&mut JsonFileStore::new(dir.path().join("brain.json")), &values);
    assert_doubles_exact(&mut SqliteStore::in_memory().unwrap(), &values);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_doubles_reload_exactly(
        values in prop::collection::vec(any::<f64>().prop_filter("finite", |v| v.is_finite()), 1..64),
    ) {
        let dir = tempfile::tempdir().unwrap();
        assert_doubles_exact(&mut JsonFileStore::new(dir.path().join("brain.json")), &values);
        assert_doubles_exact(&mut SqliteStore::in_memory().unwrap(), &values);
    }

    #[test]
    fn prop_roundtrip_in_memory(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (brain, _, _) = seeded_brain(&ops);
        assert_roundtrip(&mut InMemoryStore::new(), &brain);
    }

    #[test]
    fn prop_roundtrip_json_file(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (brain, _, _) = seeded_brain(&ops);
        let dir = tempfile::tempdir().unwrap();
        assert_roundtrip(&mut JsonFileStore::new(dir.path().join("brain.json")), &brain);
    }

    #[test]
    fn prop_roundtrip_sqlite(ops in prop::collection::vec(arb_op(), 0..40)) {
        let (brain, _, _) = seeded_brain(&ops);
        assert_roundtrip(&mut SqliteStore::in_memory().unwrap(), &brain);
    }

    #[test]
    fn prop_incremental_save_matches_full_save(
        before in prop::collection::vec(arb_op(), 0..30),
        after in prop::collection::vec(arb_op(), 1..30),
    ) {
        let (brain, mut pool, mut links) = seeded_brain(&before);
        let cancel = CancelToken::new();

        let mut incremental = SqliteStore::in_memory().unwrap();
        brain.take_changes().unwrap();
        incremental.save_brain(&brain, &cancel).unwrap();

        apply(&brain, &mut pool, &mut links, &after);
        incremental.save_changes(&brain.take_changes().unwrap()).unwrap();

        let mut full = InMemoryStore::new();
        full.save_brain(&brain, &cancel).unwrap();
        prop_assert_eq!(incremental.load_document().unwrap(), full.load_document().unwrap());
    }
}

#[test]
fn file_backed_sqlite_survives_reopen() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    let (brain, _, _) = seeded_brain(&[Op::Int(5), Op::Cluster(0), Op::AddChild(4, 2), Op::Link(2, 3, 0)]);

    {
        let mut store = SqliteStore::new(&path).unwrap();
        store.save_brain(&brain, &CancelToken::new()).unwrap();
    }
    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.load_document().unwrap(), decompose(&brain).unwrap());
}

#[test]
fn incremental_delete_is_persisted() {
    let (brain, pool, _) = seeded_brain(&[Op::Int(1), Op::Int(2)]);
    let cancel = CancelToken::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("brain.json"));
    brain.take_changes().unwrap();
    store.save_brain(&brain, &cancel).unwrap();

    let victim = pool[2];
    brain.delete(victim).unwrap();
    let changes = brain.take_changes().unwrap();
    assert_eq!(changes.deleted_neurons, vec![victim]);
    store.save_changes(&changes).unwrap();

    let loaded = store.load_brain(BrainConfig::default(), &cancel).unwrap();
    assert!(!loaded.contains(victim));
    assert!(loaded.contains(pool[3]));
}
