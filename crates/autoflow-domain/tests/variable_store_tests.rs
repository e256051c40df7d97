use std::sync::Arc;
use std::thread;

use autoflow_domain::{StoreConfig, VariableDefinition, VariableError, VariableKind, VariableStore, VariableValue};
use chrono::{Duration, Utc};

fn store_with_speed() -> VariableStore {
    let store = VariableStore::default();
    store.create_with(VariableDefinition::numeric("Speed", 1).with_range(0.0, 100.0).with_unit("rpm"))
         .expect("create Speed");
    store
}

#[test]
fn create_then_get_returns_default_and_no_modification() {
    let store = VariableStore::default();
    store.create(VariableKind::Numeric, "N", 1).unwrap();
    store.create(VariableKind::String, "S", 2).unwrap();
    store.create(VariableKind::DateTime, "D", 3).unwrap();
    store.create(VariableKind::Array, "A", 4).unwrap();
    store.create(VariableKind::Struct, "T", 5).unwrap();

    assert_eq!(store.get::<f64>("N").unwrap(), 0.0);
    assert_eq!(store.get::<String>("S").unwrap(), "");
    assert_eq!(store.get::<Vec<VariableValue>>("A").unwrap(), vec![]);
    assert!(matches!(store.get_value("T").unwrap(), VariableValue::Struct(f) if f.is_empty()));
    for name in ["N", "S", "D", "A", "T"] {
        assert_eq!(store.variable(name).unwrap().last_modified, None, "{name}");
    }
}

#[test]
fn duplicate_name_or_index_fails_and_leaves_store_unchanged() {
    let store = store_with_speed();
    let before = store.export_variables();

    assert!(matches!(store.create(VariableKind::String, "Speed", 2), Err(VariableError::DuplicateKey(_))));
    assert!(matches!(store.create(VariableKind::String, "Other", 1), Err(VariableError::DuplicateKey(_))));
    assert_eq!(store.export_variables(), before);
    assert_eq!(store.len(), 1);
}

#[test]
fn alias_cannot_be_reused_for_another_variable() {
    let store = store_with_speed();
    store.create(VariableKind::Numeric, "Torque", 2).unwrap();
    store.add_alias("Speed", "S1").unwrap();
    assert!(matches!(store.add_alias("Torque", "S1"), Err(VariableError::DuplicateKey(_))));
    assert!(matches!(store.add_alias("Torque", "Speed"), Err(VariableError::DuplicateKey(_))));
    assert!(matches!(store.add_alias("Missing", "X"), Err(VariableError::NotFound(_))));
    assert!(matches!(store.add_to_group("g", "Missing"), Err(VariableError::NotFound(_))));
}

#[test]
fn successful_set_appends_exactly_one_history_record() {
    let store = store_with_speed();
    let t0 = Utc::now() - Duration::seconds(1);
    store.set("Speed", 5.0).unwrap();
    let t1 = Utc::now() + Duration::seconds(1);

    let history = store.get_history("Speed", t0, t1).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].value(), &VariableValue::Numeric(5.0));
    assert_eq!(store.variable("Speed").unwrap().last_modified, Some(history[0].timestamp()));
}

#[test]
fn out_of_range_set_is_rejected_without_side_effects() {
    let store = store_with_speed();
    let err = store.set("Speed", 150.0).unwrap_err();
    assert!(matches!(err, VariableError::Validation { .. }));
    assert_eq!(store.variable("Speed").unwrap().last_modified, None);
    assert!(store.export_history("Speed").unwrap().is_empty());
    assert_eq!(store.get::<f64>("Speed").unwrap(), 0.0);
}

#[test]
fn string_max_length_and_type_mismatch() {
    let store = VariableStore::default();
    store.create_with(VariableDefinition::string("Batch", 1).with_max_length(4)).unwrap();
    assert!(matches!(store.set("Batch", "ABCDE"), Err(VariableError::Validation { .. })));
    store.set("Batch", 1234).unwrap();
    assert_eq!(store.get::<String>("Batch").unwrap(), "1234");
    assert_eq!(store.get::<i32>("Batch").unwrap(), 1234);

    store.set("Batch", "AB").unwrap();
    assert!(matches!(store.get::<f64>("Batch"), Err(VariableError::TypeMismatch { .. })));
    assert!(matches!(store.set("Missing", 1.0), Err(VariableError::NotFound(_))));
}

#[test]
fn history_never_exceeds_capacity() {
    let store = VariableStore::new(StoreConfig { history_capacity: 5,
                                                 ..StoreConfig::default() });
    store.create(VariableKind::Numeric, "Counter", 1).unwrap();
    for i in 0..20 {
        store.set("Counter", i).unwrap();
    }
    let all = store.export_history("Counter").unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all.first().unwrap().value(), &VariableValue::Numeric(15.0));
    assert_eq!(all.last().unwrap().value(), &VariableValue::Numeric(19.0));
}

#[test]
fn get_history_for_unknown_variable_is_not_found() {
    let store = store_with_speed();
    let now = Utc::now();
    assert!(matches!(store.get_history("Nope", now, now), Err(VariableError::NotFound(_))));
    assert!(store.get_history("Speed", now, now).unwrap().is_empty());
}

#[test]
fn snapshot_then_restore_on_unmodified_store_is_idempotent() {
    let store = store_with_speed();
    store.create(VariableKind::String, "Recipe", 2).unwrap();
    store.set("Speed", 42.0).unwrap();
    store.set("Recipe", "R-7").unwrap();
    let before: Vec<_> = store.names().iter().map(|n| store.get_value(n).unwrap()).collect();

    let snap = store.create_snapshot("checkpoint");
    let report = store.restore_from_snapshot(&snap);
    assert!(report.is_complete());

    let after: Vec<_> = store.names().iter().map(|n| store.get_value(n).unwrap()).collect();
    assert_eq!(before, after);
}

#[test]
fn restore_is_best_effort() {
    let store = store_with_speed();
    store.create(VariableKind::Numeric, "Level", 2).unwrap();
    store.set("Level", 300.0).unwrap();
    store.set("Speed", 10.0).unwrap();
    let snap = store.create_snapshot("before");

    store.set("Speed", 20.0).unwrap();
    store.set("Level", 1.0).unwrap();
    store.remove("Level").unwrap();
    store.create_with(VariableDefinition::numeric("Level", 2).with_range(0.0, 100.0)).unwrap();

    let report = store.restore_from_snapshot(&snap);
    assert_eq!(report.applied, vec!["Speed".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(store.get::<f64>("Speed").unwrap(), 10.0);
    assert_eq!(store.get::<f64>("Level").unwrap(), 0.0);

    store.remove("Level").unwrap();
    let report = store.restore_from_snapshot(&snap);
    assert_eq!(report.skipped, vec!["Level".to_string()]);
}

#[test]
fn snapshot_is_not_affected_by_later_writes() {
    let store = store_with_speed();
    store.set("Speed", 1.0).unwrap();
    let snap = store.create_snapshot("s");
    store.set("Speed", 2.0).unwrap();
    assert_eq!(snap.get("Speed"), Some(&VariableValue::Numeric(1.0)));
    assert_eq!(snap.name(), "s");
}

#[test]
fn concurrent_writers_keep_history_consistent() {
    let store = Arc::new(VariableStore::default());
    store.create(VariableKind::Numeric, "Shared", 1).unwrap();

    let handles: Vec<_> = (0..8).map(|t| {
                                   let store = Arc::clone(&store);
                                   thread::spawn(move || {
                                       for i in 0..50 {
                                           store.set("Shared", t * 100 + i).unwrap();
                                       }
                                   })
                               })
                               .collect();
    for h in handles {
        h.join().unwrap();
    }
    let history = store.export_history("Shared").unwrap();
    assert_eq!(history.len(), 400);
    assert!(history.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    assert_eq!(history.last().unwrap().value(), &store.get_value("Shared").unwrap());
}

#[tokio::test]
async fn subscribers_receive_committed_changes_only() {
    let store = store_with_speed();
    let mut rx = store.subscribe();
    store.set("Speed", 150.0).unwrap_err();
    store.set("Speed", 50.0).unwrap();

    let change = rx.recv().await.unwrap();
    assert_eq!(change.name, "Speed");
    assert_eq!(change.previous, VariableValue::Numeric(0.0));
    assert_eq!(change.current, VariableValue::Numeric(50.0));
    assert!(rx.try_recv().is_err());
}
