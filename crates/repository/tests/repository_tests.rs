use std::sync::Arc;

use query_engine_execution::metrics::Metrics;
use query_engine_sql::sql::ast::ParameterValue;
use query_engine_translation::translation;
use query_engine_translation::translation::mutation::{ResourceId, ResourceSnapshot};
use resource_sql::error::RepositoryError;
use resource_sql::state::State;
use resource_sql::{mutation, query};
use resource_sql_configuration::{Configuration, PoolSettings, QuerySettings};
use tests_common::recording_store::RecordingStore;
use tests_common::todo_model;

fn configuration() -> Configuration {
    Configuration {
        metadata: todo_model::metadata(),
        pool_settings: PoolSettings::default(),
        connection_uri: String::new(),
        query_settings: QuerySettings {
            include_total_resource_count: true,
            ..QuerySettings::default()
        },
    }
}

fn state(store: &Arc<RecordingStore>) -> State {
    let metrics = Metrics::initialize(&mut prometheus::Registry::new()).unwrap();
    State::new(store.clone(), metrics)
}

fn snapshot(value: serde_json::Value) -> ResourceSnapshot {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn queries_return_the_page_and_the_total() {
    let store = Arc::new(
        RecordingStore::new()
            .with_count(3)
            .with_rows(vec![vec![serde_json::json!(1), serde_json::json!("admin")]]),
    );
    let state = state(&store);
    let request = serde_json::from_value(serde_json::json!({
        "resourceType": "accounts",
        "pagination": { "pageNumber": 1, "pageSize": 1 }
    }))
    .unwrap();

    let result = query::query(&configuration(), &state, &request).await.unwrap();

    assert_eq!(result.total_count, Some(3));
    assert_eq!(
        result.rows,
        vec![vec![serde_json::json!(1), serde_json::json!("admin")]]
    );
    assert_eq!(store.recording().statements.len(), 2);
    assert_eq!(state.metrics.query_total.get(), 1);
}

#[tokio::test]
async fn unknown_fields_are_bad_requests() {
    let store = Arc::new(RecordingStore::new());
    let request = serde_json::from_value(serde_json::json!({
        "resourceType": "tags",
        "sort": [{ "target": { "type": "field", "path": ["colour"] }, "direction": "ascending" }]
    }))
    .unwrap();

    let result = query::query(&configuration(), &state(&store), &request).await;

    assert!(matches!(result, Err(RepositoryError::BadRequest(_))));
    assert!(store.recording().statements.is_empty());
}

#[tokio::test]
async fn created_resources_take_over_related_resources() {
    let store = Arc::new(
        RecordingStore::new()
            .with_returned_ids([ParameterValue::Int(7)])
            .with_affected_rows([2]),
    );
    let state = state(&store);

    let id = mutation::create(
        &configuration(),
        &state,
        "people",
        &snapshot(serde_json::json!({
            "attributes": { "lastName": "Smith" },
            "toMany": { "ownedTodoItems": [5, 6] }
        })),
    )
    .await
    .unwrap();

    assert_eq!(id, ResourceId::Int(7));
    let recording = store.recording();
    assert_eq!(recording.statements.len(), 2);
    assert!(recording.statements[0].sql.starts_with("INSERT INTO \"People\""));
    let related = &recording.statements[1];
    assert!(related.sql.starts_with("UPDATE \"TodoItems\""));
    assert_eq!(related.params.get("@p1"), Some(&ParameterValue::Int(7)));
    assert!(recording.committed);
    assert_eq!(state.metrics.mutation_total.get(), 1);
}

#[tokio::test]
async fn creates_roll_back_when_related_resources_are_missing() {
    let store = Arc::new(RecordingStore::new().with_affected_rows([1]));
    let state = state(&store);

    let result = mutation::create(
        &configuration(),
        &state,
        "people",
        &snapshot(serde_json::json!({
            "attributes": { "lastName": "Smith" },
            "toMany": { "ownedTodoItems": [5, 6] }
        })),
    )
    .await;

    assert!(matches!(
        result,
        Err(RepositoryError::DataStoreUpdateFailed(_))
    ));
    let recording = store.recording();
    assert!(recording.rolled_back);
    assert!(!recording.committed);
    assert_eq!(state.metrics.mutation_failure_total.get(), 1);
}

#[tokio::test]
async fn clearing_a_required_relationship_is_a_bad_request() {
    let store = Arc::new(RecordingStore::new());

    let result = mutation::update(
        &configuration(),
        &state(&store),
        "todoItems",
        &snapshot(serde_json::json!({ "id": 1, "toOne": { "owner": 4 } })),
        &snapshot(serde_json::json!({ "toOne": { "owner": null } })),
    )
    .await;

    assert!(matches!(
        result,
        Err(RepositoryError::BadRequest(
            translation::Error::RequiredRelationshipCleared { .. }
        ))
    ));
    assert!(store.recording().statements.is_empty());
}

#[tokio::test]
async fn updates_write_the_changed_attributes() {
    let store = Arc::new(RecordingStore::new());

    mutation::update(
        &configuration(),
        &state(&store),
        "tags",
        &snapshot(serde_json::json!({ "id": 3, "attributes": { "name": "home" } })),
        &snapshot(serde_json::json!({ "attributes": { "name": "work" } })),
    )
    .await
    .unwrap();

    let recording = store.recording();
    assert_eq!(recording.statements.len(), 1);
    assert_eq!(
        recording.statements[0].params.values().collect::<Vec<_>>(),
        vec![
            &ParameterValue::String("work".to_string()),
            &ParameterValue::Int(3)
        ]
    );
    assert!(recording.committed);
}

#[tokio::test]
async fn deleting_a_missing_resource_fails() {
    let store = Arc::new(RecordingStore::new().with_affected_rows([0]));

    let result = mutation::delete(
        &configuration(),
        &state(&store),
        "tags",
        &ResourceId::Int(99),
    )
    .await;

    assert!(matches!(
        result,
        Err(RepositoryError::DataStoreUpdateFailed(_))
    ));
    assert!(store.recording().rolled_back);
}
