//! Create, update and delete resources.
//!
//! Every write runs in a single transaction. A statement that fails, or that affects
//! a different number of rows than planned, rolls back the whole write.

use tracing::{info_span, Instrument};

use query_engine_execution::error as execution;
use query_engine_execution::mutation::{self, MutationTransaction};
use query_engine_sql::sql::ast::ParameterValue;
use query_engine_sql::sql::execution_plan::MutationStep;
use query_engine_translation::translation::mutation::{
    plan_after_create, plan_create, plan_delete, plan_update, ChangeSet, CreatePlan,
    ResourceChangeDetector, ResourceId, ResourceSnapshot,
};
use resource_sql_configuration::Configuration;

use crate::error::RepositoryError;
use crate::state::State;

/// Apply the difference between two snapshots of an existing resource.
pub async fn update(
    configuration: &Configuration,
    state: &State,
    resource_type: &str,
    before: &ResourceSnapshot,
    after: &ResourceSnapshot,
) -> Result<(), RepositoryError> {
    let steps = async {
        let change_set =
            ResourceChangeDetector::new(&configuration.metadata, resource_type, Some(before), after)?;
        Ok::<_, RepositoryError>(plan_update(&configuration.metadata, &change_set)?)
    }
    .instrument(info_span!("Plan mutation"))
    .await
    .map_err(|err| {
        err.log("Plan mutation");
        err
    })?;

    execute_steps(state, &steps).await
}

/// Create a resource and return its identifier.
///
/// Resources related to the new one through a foreign key on their side are updated
/// once the identifier is known, in the same transaction as the insert.
pub async fn create(
    configuration: &Configuration,
    state: &State,
    resource_type: &str,
    after: &ResourceSnapshot,
) -> Result<ResourceId, RepositoryError> {
    let (change_set, plan) = async {
        let change_set =
            ResourceChangeDetector::new(&configuration.metadata, resource_type, None, after)?;
        let plan = plan_create(&configuration.metadata, &change_set)?;
        Ok::<_, RepositoryError>((change_set, plan))
    }
    .instrument(info_span!("Plan mutation"))
    .await
    .map_err(|err| {
        err.log("Plan mutation");
        err
    })?;

    execute_create(configuration, state, &change_set, &plan)
        .instrument(info_span!("Execute mutation"))
        .await
        .map_err(|err| {
            err.log("Execute mutation");
            err
        })
}

async fn execute_create(
    configuration: &Configuration,
    state: &State,
    change_set: &ResourceChangeDetector,
    plan: &CreatePlan,
) -> Result<ResourceId, RepositoryError> {
    let mut transaction = MutationTransaction::begin(state.store.as_ref(), &state.metrics).await?;
    match run_create(&mut transaction, configuration, change_set, plan).await {
        Ok(id) => {
            transaction.commit().await?;
            Ok(id)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

async fn run_create(
    transaction: &mut MutationTransaction<'_>,
    configuration: &Configuration,
    change_set: &ResourceChangeDetector,
    plan: &CreatePlan,
) -> Result<ResourceId, RepositoryError> {
    transaction.run_all(&plan.before_insert).await?;
    let id = returned_id(transaction.run(&plan.insert).await?)?;
    tracing::info!(resource_type = change_set.resource_type(), id = %id, "Created resource");

    let after_insert = plan_after_create(&configuration.metadata, change_set, &id)?;
    transaction.run_all(&after_insert).await?;
    Ok(id)
}

fn returned_id(value: Option<ParameterValue>) -> Result<ResourceId, RepositoryError> {
    match value {
        Some(ParameterValue::Int(id)) => Ok(ResourceId::Int(id)),
        Some(ParameterValue::String(id)) => Ok(ResourceId::String(id)),
        _ => Err(RepositoryError::from(
            execution::Error::Query(execution::QueryError::MissingReturnedId)
                .data_store_update_failed(),
        )),
    }
}

/// Delete a resource. Deleting a resource that does not exist fails.
pub async fn delete(
    configuration: &Configuration,
    state: &State,
    resource_type: &str,
    id: &ResourceId,
) -> Result<(), RepositoryError> {
    let step = info_span!("Plan mutation")
        .in_scope(|| plan_delete(&configuration.metadata, resource_type, id))
        .map_err(|err| {
            let err = RepositoryError::from(err);
            err.log("Plan mutation");
            err
        })?;

    execute_steps(state, &[step]).await
}

async fn execute_steps(state: &State, steps: &[MutationStep]) -> Result<(), RepositoryError> {
    mutation::execute(state.store.as_ref(), &state.metrics, steps)
        .await
        .map_err(|err| {
            let err = RepositoryError::from(err);
            err.log("Execute mutation");
            err
        })
}
