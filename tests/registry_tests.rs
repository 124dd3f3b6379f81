//! Registry behavior across persistence boundaries.

use top_ams::hal::MockStore;
use top_ams::traits::KvStore;
use top_ams::{FilamentRegistry, Metadata, RegistryError, SnapshotError};

const KEY: &str = "filaments";

fn fresh() -> FilamentRegistry<MockStore> {
    let mut registry = FilamentRegistry::new(MockStore::new(), KEY);
    registry.init();
    registry
}

/// Simulate a power cycle: keep only what was committed and load it again.
fn reboot(registry: &FilamentRegistry<MockStore>) -> FilamentRegistry<MockStore> {
    let mut reloaded = FilamentRegistry::new(registry.store().durable(), KEY);
    reloaded.init();
    reloaded
}

// ============================================================================
// Id Allocation
// ============================================================================

#[test]
fn duplicate_motor_is_rejected() {
    let mut registry = fresh();
    assert_eq!(registry.add(3, Metadata::new("{}")), Ok(1));
    assert_eq!(
        registry.add(3, Metadata::new("{}")),
        Err(RegistryError::DuplicateMotor(3))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn removed_ids_are_not_reused() {
    let mut registry = fresh();
    assert_eq!(registry.add(1, Metadata::new("{}")), Ok(1));
    assert_eq!(registry.add(2, Metadata::new("{}")), Ok(2));
    registry.remove(1).unwrap();
    assert_eq!(registry.add(3, Metadata::new("{}")), Ok(3));
}

#[test]
fn next_id_resumes_after_highest_loaded_id() {
    let mut registry = fresh();
    registry.add(1, Metadata::new("{}")).unwrap();
    registry.add(2, Metadata::new("{}")).unwrap();
    registry.add(3, Metadata::new("{}")).unwrap();
    registry.remove(3).unwrap();

    let mut reloaded = reboot(&registry);
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.next_id(), 3);
    assert_eq!(reloaded.add(9, Metadata::new("{}")), Ok(3));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn every_mutation_is_durable() {
    let mut registry = fresh();
    let red = registry
        .add(1, Metadata::new(r#"{"color":"red"}"#))
        .unwrap();
    let blue = registry
        .add(2, Metadata::new(r#"{"color":"blue"}"#))
        .unwrap();
    registry
        .update(red, Some(4), Some(Metadata::new(r#"{"color":"orange"}"#)))
        .unwrap();
    registry.remove(blue).unwrap();

    let reloaded = reboot(&registry);
    assert_eq!(reloaded.records(), registry.records());
    let record = reloaded.get_by_id(red).unwrap();
    assert_eq!(record.motor_id, 4);
    assert_eq!(record.metadata.field("color").as_deref(), Some("orange"));
    assert!(reloaded.get_by_motor(2).is_none());
}

#[test]
fn failed_commit_is_not_surfaced() {
    let mut registry = fresh();
    registry.store_mut().fail_commits(true);

    // The in-memory change stands even though flash rejected it
    assert_eq!(registry.add(1, Metadata::new("{}")), Ok(1));
    assert_eq!(registry.len(), 1);
    assert!(reboot(&registry).is_empty());
}

#[test]
fn cleared_registry_saves_empty_set() {
    let mut registry = fresh();
    registry.add(1, Metadata::new("{}")).unwrap();
    registry.clear();
    assert!(registry.save());

    let reloaded = reboot(&registry);
    assert!(reloaded.is_empty());
    assert_eq!(
        reloaded.store().get_str(KEY).unwrap().as_deref(),
        Some("[]")
    );
}

#[test]
fn snapshot_round_trip_preserves_records_and_order() {
    let mut registry = fresh();
    registry.add(7, Metadata::new(r#"{"type":"PLA"}"#)).unwrap();
    registry.add(2, Metadata::new("")).unwrap();
    registry.add(5, Metadata::new("not json")).unwrap();

    let mut other = fresh();
    other.from_snapshot(&registry.to_snapshot()).unwrap();
    assert_eq!(other.records(), registry.records());
    assert_eq!(other.next_id(), 4);
}

// ============================================================================
// All-or-nothing Load
// ============================================================================

#[test]
fn one_malformed_record_discards_the_whole_snapshot() {
    let mut store = MockStore::new();
    store.insert(
        KEY,
        br#"[{"id":1,"motor_id":1,"metadata":"{}"},{"id":"two","motor_id":2,"metadata":"{}"}]"#,
    );
    let mut registry = FilamentRegistry::new(store, KEY);
    registry.init();

    assert!(registry.is_empty());
    assert_eq!(registry.next_id(), 1);
}

#[test]
fn missing_field_discards_the_whole_snapshot() {
    let mut registry = fresh();
    let result = registry.from_snapshot(r#"[{"id":1,"motor_id":1}]"#);
    assert!(matches!(result, Err(SnapshotError::Malformed(_))));
    assert!(registry.is_empty());
}

#[test]
fn duplicate_motor_in_snapshot_is_rejected() {
    let mut registry = fresh();
    let result = registry.from_snapshot(
        r#"[{"id":1,"motor_id":4,"metadata":""},{"id":2,"motor_id":4,"metadata":""}]"#,
    );
    assert_eq!(result, Err(SnapshotError::DuplicateMotor(4)));
    assert!(registry.is_empty());
}

#[test]
fn non_array_snapshot_is_ignored_at_startup() {
    let mut store = MockStore::new();
    store.insert(KEY, br#"{"id":1}"#);
    let mut registry = FilamentRegistry::new(store, KEY);
    registry.init();
    assert!(registry.is_empty());
}

// ============================================================================
// Metadata Search
// ============================================================================

#[test]
fn find_by_metadata_field_matches_exactly() {
    let mut registry = fresh();
    let red = registry
        .add(5, Metadata::new(r#"{"color":"red","temp":210}"#))
        .unwrap();
    registry
        .add(6, Metadata::new(r#"{"color":"Red"}"#))
        .unwrap();
    registry.add(7, Metadata::new("garbage")).unwrap();

    let found = registry.find_by_metadata_field("color", "red");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, red);

    assert!(registry.find_by_metadata_field("color", "blue").is_empty());
    assert_eq!(registry.find_by_metadata_field("temp", "210").len(), 1);
}
