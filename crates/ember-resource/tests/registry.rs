//! Integration tests for the use-counted registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use ember_resource::*;
use parking_lot::Mutex;

// ============================================================================
// Helpers
// ============================================================================

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.setup(64);
    registry
}

/// Discard callbacks that append the discarded id to a shared list.
#[derive(Clone, Default)]
struct DiscardLog(Arc<Mutex<Vec<Id>>>);

impl DiscardLog {
    fn callback(&self) -> Option<DiscardFn> {
        let log = Arc::clone(&self.0);
        Some(Box::new(move |id: Id| log.lock().push(id)))
    }

    fn ids(&self) -> Vec<Id> {
        self.0.lock().clone()
    }

    fn count(&self, id: Id) -> usize {
        self.0.lock().iter().filter(|d| **d == id).count()
    }
}

/// Deterministic pseudo random sequence for churn tests.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_use_count_walk() {
    let log = DiscardLog::default();
    let mut registry = registry();
    let loc = Locator::new("tex:foo.png");
    let id = Id::new(0, 0, 1);

    assert!(!registry.lookup(&loc).is_valid());
    registry.add(loc.clone(), id, log.callback());
    assert_eq!(registry.use_count(id), 1);

    // a second client finds the resource and shares it
    let found = registry.lookup(&loc);
    assert_eq!(found, id);
    registry.add_ref(found);
    assert_eq!(registry.use_count(id), 2);

    assert!(!registry.release(id));
    assert_eq!(registry.use_count(id), 1);
    assert!(log.ids().is_empty());

    assert!(registry.release(id));
    assert_eq!(log.ids(), vec![id]);
    assert!(!registry.contains(id));
    assert!(!registry.lookup(&loc).is_valid());
    assert_eq!(registry.len(), 0);

    registry.discard();
}

#[test]
fn test_release_middle_entry_keeps_others_resolvable() {
    let mut registry = registry();
    let entries: Vec<(Locator, Id)> = (0..5)
        .map(|i| (Locator::new(format!("mesh:{}.bin", i)), Id::new(i, i as u16, 2)))
        .collect();
    for (loc, id) in &entries {
        registry.add(loc.clone(), *id, None);
    }

    assert!(registry.release(entries[2].1));
    assert!(registry.check_integrity());
    assert_eq!(registry.len(), 4);

    for (i, (loc, id)) in entries.iter().enumerate() {
        if i == 2 {
            assert!(!registry.lookup(loc).is_valid());
            assert!(!registry.contains(*id));
        } else {
            assert_eq!(registry.lookup(loc), *id);
            assert_eq!(registry.locator(*id), Some(loc));
        }
    }

    registry.remove_by_label(ResourceLabel::ALL);
    registry.discard();
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_shared_locator_resolves_to_one_id() {
    let mut registry = registry();
    let loc = Locator::new("tex:shared.png");
    let id = Id::new(7, 3, 1);
    registry.add(loc.clone(), id, None);

    for _ in 0..10 {
        let found = registry.lookup(&Locator::new("tex:shared.png"));
        assert_eq!(found, id);
        registry.add_ref(found);
    }
    assert_eq!(registry.use_count(id), 11);
    assert_eq!(registry.len(), 1);

    registry.remove_by_label(ResourceLabel::ALL);
    registry.discard();
}

#[test]
fn test_signatures_keep_variants_apart() {
    let mut registry = registry();
    let a = Id::new(0, 0, 1);
    let b = Id::new(1, 1, 1);
    registry.add(Locator::with_signature("tex:foo.png", 1), a, None);
    registry.add(Locator::with_signature("tex:foo.png", 2), b, None);

    assert_eq!(registry.lookup(&Locator::with_signature("tex:foo.png", 1)), a);
    assert_eq!(registry.lookup(&Locator::with_signature("tex:foo.png", 2)), b);
    assert!(!registry.lookup(&Locator::new("tex:foo.png")).is_valid());

    registry.remove_by_label(ResourceLabel::ALL);
    registry.discard();
}

#[test]
fn test_non_shared_never_found() {
    let mut registry = registry();
    let loc = Locator::non_shared_at("tex:private.png");
    for i in 0..3 {
        registry.add(loc.clone(), Id::new(i, i as u16, 1), None);
    }
    assert_eq!(registry.len(), 3);
    assert!(!registry.lookup(&loc).is_valid());
    assert!(!registry.lookup(&Locator::non_shared()).is_valid());

    assert_eq!(registry.remove_by_label(ResourceLabel::ALL).len(), 3);
    registry.discard();
}

#[test]
fn test_discard_runs_exactly_once_per_entry() {
    let log = DiscardLog::default();
    let mut registry = registry();
    let id = Id::new(0, 0, 1);
    registry.add(Locator::new("a"), id, log.callback());

    let uses = 17;
    for _ in 1..uses {
        registry.add_ref(id);
    }
    for i in 0..uses {
        let removed = registry.release(id);
        assert_eq!(removed, i == uses - 1);
    }
    // extra releases of a removed id are no-ops
    assert!(!registry.release(id));
    assert_eq!(log.count(id), 1);

    registry.discard();
}

#[test]
fn test_index_integrity_under_churn() {
    let log = DiscardLog::default();
    let mut registry = registry();
    let mut rng = Lcg(0x5eed);
    let mut live: BTreeMap<Id, (Locator, u32)> = BTreeMap::new();
    let mut next_stamp = 0u32;

    for step in 0..2000 {
        let roll = rng.below(10);
        if live.is_empty() || roll < 4 {
            let shared = rng.below(4) != 0;
            let loc = if shared {
                Locator::new(format!("res:{}", next_stamp))
            } else {
                Locator::non_shared_at(format!("res:{}", next_stamp))
            };
            let id = Id::new(next_stamp, (next_stamp % 1024) as u16, 1);
            next_stamp += 1;
            registry.add(loc.clone(), id, log.callback());
            live.insert(id, (loc, 1));
        } else {
            let pick = rng.below(live.len());
            let id = *live.keys().nth(pick).unwrap();
            if roll < 6 {
                registry.add_ref(id);
                live.get_mut(&id).unwrap().1 += 1;
            } else {
                let entry = live.get_mut(&id).unwrap();
                entry.1 -= 1;
                let gone = entry.1 == 0;
                assert_eq!(registry.release(id), gone, "step {}", step);
                if gone {
                    live.remove(&id);
                }
            }
        }

        assert!(registry.check_integrity(), "integrity lost at step {}", step);
        assert_eq!(registry.len(), live.len());
    }

    for (id, (loc, uses)) in &live {
        assert!(registry.contains(*id));
        assert_eq!(registry.use_count(*id), *uses);
        if loc.is_shared() {
            assert_eq!(registry.lookup(loc), *id);
        } else {
            assert!(!registry.lookup(loc).is_valid());
        }
    }

    // every discarded id was discarded once
    let discarded = log.ids();
    let mut unique = discarded.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), discarded.len());
    assert_eq!(discarded.len() + live.len(), next_stamp as usize);

    registry.remove_by_label(ResourceLabel::ALL);
    registry.discard();
}

#[test]
fn test_id_by_index_covers_all_entries() {
    let mut registry = registry();
    for i in 0..6 {
        registry.add(Locator::new(format!("r{}", i)), Id::new(i, i as u16, 1), None);
    }
    registry.release(Id::new(1, 1, 1));
    registry.release(Id::new(4, 4, 1));

    let mut ids: Vec<Id> = (0..registry.len()).map(|i| registry.id_by_index(i)).collect();
    ids.sort();
    let expected: Vec<Id> = [0, 2, 3, 5].iter().map(|&i| Id::new(i, i as u16, 1)).collect();
    assert_eq!(ids, expected);
    assert_eq!(registry.ids().count(), 4);

    registry.remove_by_label(ResourceLabel::ALL);
    registry.discard();
}

#[test]
fn test_dependency_cascade() {
    let log = DiscardLog::default();
    let mut registry = registry();
    let texture = Id::new(0, 0, 1);
    let material = Id::new(1, 0, 2);
    let model = Id::new(2, 0, 3);

    registry.add(Locator::new("tex:diffuse.png"), texture, log.callback());
    registry.add_with_dependencies(
        Locator::new("mat:stone"),
        material,
        ResourceLabel::DEFAULT,
        vec![texture],
        log.callback(),
    );
    registry.add_with_dependencies(
        Locator::new("model:wall"),
        model,
        ResourceLabel::DEFAULT,
        vec![material],
        log.callback(),
    );
    // the creators hand their own uses over to the dependents
    registry.release(texture);
    registry.release(material);
    assert_eq!(registry.use_count(texture), 1);
    assert_eq!(registry.use_count(material), 1);

    registry.add_ref(model);
    assert_eq!(registry.use_count(texture), 2);

    assert!(!registry.release(model));
    assert!(registry.release(model));
    assert_eq!(log.ids(), vec![model, material, texture]);
    assert!(registry.is_empty());

    registry.discard();
}
