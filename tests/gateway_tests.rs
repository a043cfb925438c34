use chrono::NaiveDate;
use serde_json::{json, Value};

use sensorlog::memory::MemoryStore;
use sensorlog::record::{CandidateRecord, DataQuery};
use sensorlog::schema::{self, FieldIssue};
use sensorlog::{GatewayError, PersistenceGateway};

fn gateway() -> PersistenceGateway<MemoryStore> {
    PersistenceGateway::new(MemoryStore::with_organizations(vec!["org-1", "org-2"]))
}

fn candidate(value: Value) -> CandidateRecord {
    serde_json::from_value(value).unwrap()
}

fn reading(organization_id: &str) -> CandidateRecord {
    candidate(json!({
        "soil_moisture": 42,
        "light_level": 10,
        "relative_humidity": 55,
        "temperature": 21,
        "date": "2024-01-01",
        "organization_id": organization_id,
    }))
}

#[test]
fn create_returns_record_with_server_fields() {
    let mut gateway = gateway();
    let record = gateway.create(&reading("org-1")).unwrap();

    assert!(!record.id.is_empty());
    assert_eq!(record.soil_moisture, 42);
    assert_eq!(record.light_level, 10);
    assert_eq!(record.relative_humidity, 55);
    assert_eq!(record.temperature, 21);
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(record.organization_id, "org-1");
    assert_eq!(record.created_at, record.updated_at);

    let loaded = gateway.get_by_id(&record.id).unwrap();
    assert_eq!(loaded, record);
}

#[test]
fn create_assigns_distinct_ids() {
    let mut gateway = gateway();
    let first = gateway.create(&reading("org-1")).unwrap();
    let second = gateway.create(&reading("org-1")).unwrap();
    assert_ne!(first.id, second.id);
}

#[test]
fn create_rejects_each_missing_field() {
    let fields = [
        schema::SOIL_MOISTURE,
        schema::LIGHT_LEVEL,
        schema::RELATIVE_HUMIDITY,
        schema::TEMPERATURE,
        schema::DATE,
        schema::ORGANIZATION_ID,
    ];
    for field in fields.iter() {
        let mut input = serde_json::to_value(reading("org-1")).unwrap();
        input.as_object_mut().unwrap().remove(*field);

        let mut gateway = gateway();
        match gateway.create(&candidate(input)) {
            Err(GatewayError::Validation(err)) => {
                assert_eq!(err.fields(), vec![*field]);
                assert_eq!(err.issue(field), Some(FieldIssue::Missing));
            }
            other => panic!("Expected Validation for {}, got {:?}", field, other),
        }
        assert!(gateway.store().is_empty());
    }
}

#[test]
fn create_rejects_fractional_readings() {
    let mut gateway = gateway();
    let mut input = reading("org-1");
    input.soil_moisture = Some(json!(1.5));
    match gateway.create(&input) {
        Err(GatewayError::Validation(err)) => {
            assert_eq!(err.issue(schema::SOIL_MOISTURE), Some(FieldIssue::NotAnInteger));
        }
        other => panic!("Expected Validation, got {:?}", other),
    }
    assert!(gateway.store().is_empty());
}

#[test]
fn create_with_unknown_organization_persists_nothing() {
    let mut gateway = gateway();
    match gateway.create(&reading("org-404")) {
        Err(GatewayError::Reference(org)) => assert_eq!(org, "org-404"),
        other => panic!("Expected Reference, got {:?}", other),
    }
    assert!(gateway.list(&DataQuery::default()).unwrap().is_empty());
}

#[test]
fn client_supplied_server_fields_are_ignored() {
    let mut gateway = gateway();
    let mut input = serde_json::to_value(reading("org-1")).unwrap();
    let object = input.as_object_mut().unwrap();
    object.insert(String::from("id"), json!("chosen-by-client"));
    object.insert(String::from("created_at"), json!("2000-01-01T00:00:00Z"));
    object.insert(String::from("updated_at"), json!("2000-01-01T00:00:00Z"));

    let record = gateway.create(&candidate(input)).unwrap();
    assert_ne!(record.id, "chosen-by-client");
    assert!(record.created_at.timestamp() > 946_684_800);
}

#[test]
fn get_unknown_id_is_not_found() {
    let mut gateway = gateway();
    match gateway.get_by_id("missing") {
        Err(GatewayError::NotFound(id)) => assert_eq!(id, "missing"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn update_unknown_id_is_not_found_and_writes_nothing() {
    let mut gateway = gateway();
    let existing = gateway.create(&reading("org-1")).unwrap();

    match gateway.update_by_id("missing", &reading("org-2")) {
        Err(GatewayError::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
    let all = gateway.list(&DataQuery::default()).unwrap();
    assert_eq!(all, vec![existing]);
}

#[test]
fn update_replaces_fields_and_keeps_identity() {
    let mut gateway = gateway();
    let original = gateway.create(&reading("org-1")).unwrap();

    let changes = candidate(json!({
        "soil_moisture": 7,
        "light_level": 8,
        "relative_humidity": 9,
        "temperature": -2,
        "date": "2024-02-29",
        "organization_id": "org-2",
    }));
    let updated = gateway.update_by_id(&original.id, &changes).unwrap();

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.temperature, -2);
    assert_eq!(updated.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert_eq!(updated.organization_id, "org-2");
    assert_eq!(gateway.get_by_id(&original.id).unwrap(), updated);
}

#[test]
fn update_is_a_full_replacement() {
    let mut gateway = gateway();
    let original = gateway.create(&reading("org-1")).unwrap();

    match gateway.update_by_id(&original.id, &candidate(json!({"temperature": 30}))) {
        Err(GatewayError::Validation(err)) => assert_eq!(err.errors.len(), 5),
        other => panic!("Expected Validation, got {:?}", other),
    }
    assert_eq!(gateway.get_by_id(&original.id).unwrap(), original);
}

#[test]
fn update_with_unknown_organization_keeps_record() {
    let mut gateway = gateway();
    let original = gateway.create(&reading("org-1")).unwrap();

    match gateway.update_by_id(&original.id, &reading("org-404")) {
        Err(GatewayError::Reference(_)) => {}
        other => panic!("Expected Reference, got {:?}", other),
    }
    assert_eq!(gateway.get_by_id(&original.id).unwrap(), original);
}

#[test]
fn list_filters_by_organization_and_id() {
    let mut gateway = gateway();
    let a = gateway.create(&reading("org-1")).unwrap();
    let b = gateway.create(&reading("org-2")).unwrap();
    let c = gateway.create(&reading("org-1")).unwrap();

    let org_1 = gateway.list(&DataQuery {
        organization_id: Some(String::from("org-1")),
        ..Default::default()
    }).unwrap();
    let mut ids: Vec<String> = org_1.into_iter().map(|record| record.id).collect();
    ids.sort();
    let mut expected = vec![a.id.clone(), c.id.clone()];
    expected.sort();
    assert_eq!(ids, expected);

    let by_id = gateway.list(&DataQuery { id: Some(b.id.clone()), ..Default::default() }).unwrap();
    assert_eq!(by_id, vec![b.clone()]);

    let none = gateway.list(&DataQuery {
        id: Some(b.id),
        organization_id: Some(String::from("org-1")),
        ..Default::default()
    }).unwrap();
    assert!(none.is_empty());

    let limited = gateway.list(&DataQuery { limit: Some(2), ..Default::default() }).unwrap();
    assert_eq!(limited.len(), 2);
    let skipped = gateway.list(&DataQuery { offset: Some(2), ..Default::default() }).unwrap();
    assert_eq!(skipped.len(), 1);
}

#[test]
fn delete_removes_record_once() {
    let mut gateway = gateway();
    let record = gateway.create(&reading("org-1")).unwrap();

    assert_eq!(gateway.delete_by_id(&record.id).unwrap(), record);
    assert!(matches!(gateway.get_by_id(&record.id), Err(GatewayError::NotFound(_))));
    assert!(matches!(gateway.delete_by_id(&record.id), Err(GatewayError::NotFound(_))));
}

#[test]
fn form_style_string_input_is_accepted() {
    let mut gateway = gateway();
    let record = gateway.create(&candidate(json!({
        "soil_moisture": "42",
        "light_level": "10",
        "relative_humidity": 55.0,
        "temperature": "-3",
        "date": "2024-01-01T00:00:00.000Z",
        "organization_id": "org-1",
    }))).unwrap();
    assert_eq!(record.soil_moisture, 42);
    assert_eq!(record.relative_humidity, 55);
    assert_eq!(record.temperature, -3);
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
}

#[test]
fn record_serializes_with_wire_keys() {
    let mut gateway = gateway();
    let record = gateway.create(&reading("org-1")).unwrap();
    let value = serde_json::to_value(&record).unwrap();
    for key in ["id", "soil_moisture", "light_level", "relative_humidity", "temperature",
        "date", "organization_id", "created_at", "updated_at"].iter() {
        assert!(value.get(*key).is_some(), "missing key {}", key);
    }
    assert_eq!(value["date"], json!("2024-01-01"));
}
