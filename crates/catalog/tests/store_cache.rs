use pretty_assertions::assert_eq;
use sop_catalog::{CatalogError, CatalogStore, MemoryBackend, Procedure};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LONG_TTL: Duration = Duration::from_secs(3600);

fn procedure(id: &str, generation: &str) -> Procedure {
    Procedure::new(id, format!("{id} ({generation})"), vec![format!("{id} issue")])
        .with_step("Inspect", &["query_logs"])
        .with_tags(&[generation])
}

#[test]
fn reads_within_ttl_are_served_from_cache() {
    let backend = MemoryBackend::with_records(vec![procedure("a", "g1")]);
    let store = CatalogStore::new(backend, LONG_TTL);

    for _ in 0..5 {
        assert_eq!(store.list().unwrap().len(), 1);
    }
    assert_eq!(store.backend().loads(), 1);

    // Out-of-band change is invisible until the cache expires or is cleared.
    store
        .backend()
        .replace_records(vec![procedure("a", "g1"), procedure("b", "g1")]);
    assert_eq!(store.list().unwrap().len(), 1);

    store.clear_cache();
    assert_eq!(store.list().unwrap().len(), 2);
    assert_eq!(store.backend().loads(), 2);
}

#[test]
fn expired_ttl_reloads_on_every_read() {
    let backend = MemoryBackend::with_records(vec![procedure("a", "g1")]);
    let store = CatalogStore::new(backend, Duration::ZERO);

    store.list().unwrap();
    store.list().unwrap();
    store.list().unwrap();
    assert_eq!(store.backend().loads(), 3);
}

#[test]
fn write_is_visible_to_next_read_inside_ttl() {
    let store = CatalogStore::new(MemoryBackend::new(), LONG_TTL);
    assert!(store.list().unwrap().is_empty());

    store.put(procedure("lag", "g1")).unwrap();
    assert_eq!(store.get("lag").unwrap().name, "lag (g1)");

    store.put(procedure("lag", "g2")).unwrap();
    assert_eq!(store.get("lag").unwrap().name, "lag (g2)");

    store.delete("lag").unwrap();
    assert!(store.get("lag").unwrap_err().is_not_found());
}

#[test]
fn failed_write_keeps_previous_snapshot() {
    let backend = MemoryBackend::with_records(vec![procedure("a", "g1")]);
    let store = CatalogStore::new(backend, LONG_TTL);
    let before = store.list().unwrap();

    store.backend().set_fail_writes(true);
    let err = store.put(procedure("b", "g1")).unwrap_err();
    assert!(matches!(err, CatalogError::Backend(_)), "{err}");

    let after = store.list().unwrap();
    assert_eq!(after.revision(), before.revision());
    assert_eq!(after.ids(), vec!["a"]);
    assert!(store.get("b").unwrap_err().is_not_found());
}

#[test]
fn refresh_ignores_ttl_and_bumps_revision() {
    let backend = MemoryBackend::with_records(vec![procedure("a", "g1")]);
    let store = CatalogStore::new(backend, LONG_TTL);
    let first = store.list().unwrap();

    store
        .backend()
        .replace_records(vec![procedure("a", "g1"), procedure("b", "g1")]);
    let refreshed = store.refresh().unwrap();

    assert!(refreshed.revision() > first.revision());
    assert_eq!(refreshed.len(), 2);
    // Earlier holders keep their own immutable view.
    assert_eq!(first.len(), 1);
}

#[test]
fn concurrent_readers_never_see_a_mixed_snapshot() {
    let ids: Vec<String> = (0..12).map(|i| format!("proc-{i:02}")).collect();
    let initial = ids.iter().map(|id| procedure(id, "g0")).collect();
    let store = Arc::new(CatalogStore::new(
        MemoryBackend::with_records(initial),
        Duration::ZERO,
    ));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.list().unwrap();
                    let generations: Vec<&str> = snapshot
                        .procedures()
                        .iter()
                        .map(|p| p.tags[0].as_str())
                        .collect();
                    assert_eq!(snapshot.len(), 12);
                    assert!(
                        generations.windows(2).all(|w| w[0] == w[1]),
                        "mixed generations in revision {}: {generations:?}",
                        snapshot.revision()
                    );
                }
            })
        })
        .collect();

    for generation in ["g1", "g2", "g3", "g4", "g5"] {
        let batch = ids.iter().map(|id| procedure(id, generation)).collect();
        store.import(batch, true).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    let last = store.list().unwrap();
    assert!(last.procedures().iter().all(|p| p.tags == vec!["g5"]));
}
