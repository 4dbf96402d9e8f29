//! Plan the statements that apply a change-set, each with the number of rows it must affect.
//!
//! Every statement is compiled on its own, so parameter names restart at `@p1`.
//! Columns in WHERE clauses are not qualified with a table alias.

use query_engine_metadata::metadata::{DataModelService, RelationshipSide};
use query_engine_sql::sql;
use query_engine_sql::sql::execution_plan::{MutationStep, RowCountExpectation};

use super::super::error::Error;
use super::super::helpers::State;
use super::change_set::{ChangeSet, ResourceId};

/// The statements creating a resource. The statements relating other resources to the
/// new one can only be planned once its identifier is known; see `plan_after_create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlan {
    pub before_insert: Vec<MutationStep>,
    pub insert: MutationStep,
}

/// Plan the update of an existing resource:
///
/// 1. free the resources a one-to-one relationship is about to take from another resource
/// 2. write the changed columns of the resource itself
/// 3. move the foreign keys held by related resources
pub fn plan_update(
    data_model: &dyn DataModelService,
    change_set: &dyn ChangeSet,
) -> Result<Vec<MutationStep>, Error> {
    change_set.assert_required_relationships_not_cleared()?;
    let id = change_set
        .resource_id()
        .ok_or_else(|| Error::MissingResourceId(change_set.resource_type().to_string()))?;

    let mut steps = plan_one_to_one_release(data_model, change_set)?;

    if !change_set.changed_columns().is_empty() {
        let mut state = State::new();
        let table = sql::ast::TableName(data_model.table_name_for(change_set.resource_type())?);
        let assignments = assignments(&mut state, change_set);
        let id_column = data_model.id_column_for(change_set.resource_type())?;
        steps.push(MutationStep {
            statement: sql::ast::Statement::Update(sql::ast::Update {
                table,
                assignments,
                where_: where_equals(&mut state, &id_column, id),
            }),
            expectation: RowCountExpectation::Exactly(1),
        });
    }

    steps.extend(plan_related_updates(data_model, change_set, id)?);
    Ok(steps)
}

/// Plan the creation of a resource, up to and including its INSERT.
pub fn plan_create(
    data_model: &dyn DataModelService,
    change_set: &dyn ChangeSet,
) -> Result<CreatePlan, Error> {
    change_set.assert_required_relationships_not_cleared()?;

    let before_insert = plan_one_to_one_release(data_model, change_set)?;

    let mut state = State::new();
    let insert = MutationStep {
        statement: sql::ast::Statement::Insert(sql::ast::Insert {
            table: sql::ast::TableName(data_model.table_name_for(change_set.resource_type())?),
            assignments: assignments(&mut state, change_set),
            returning: sql::ast::ColumnName(data_model.id_column_for(change_set.resource_type())?),
        }),
        expectation: RowCountExpectation::ReturnsId,
    };

    Ok(CreatePlan {
        before_insert,
        insert,
    })
}

/// Plan the statements relating other resources to a resource just created.
pub fn plan_after_create(
    data_model: &dyn DataModelService,
    change_set: &dyn ChangeSet,
    id: &ResourceId,
) -> Result<Vec<MutationStep>, Error> {
    plan_related_updates(data_model, change_set, id)
}

/// Plan the deletion of a resource.
pub fn plan_delete(
    data_model: &dyn DataModelService,
    resource_type: &str,
    id: &ResourceId,
) -> Result<MutationStep, Error> {
    let mut state = State::new();
    let id_column = data_model.id_column_for(resource_type)?;
    Ok(MutationStep {
        statement: sql::ast::Statement::Delete(sql::ast::Delete {
            table: sql::ast::TableName(data_model.table_name_for(resource_type)?),
            where_: where_equals(&mut state, &id_column, id),
        }),
        expectation: RowCountExpectation::Exactly(1),
    })
}

/// A one-to-one relationship set to a resource takes it away from whichever resource of
/// our type held it. Such a resource has its foreign key cleared, or is deleted when
/// the foreign key cannot be null.
fn plan_one_to_one_release(
    data_model: &dyn DataModelService,
    change_set: &dyn ChangeSet,
) -> Result<Vec<MutationStep>, Error> {
    let resource_type = change_set.resource_type();
    change_set
        .changed_one_to_one_to_not_null()
        .iter()
        .map(|change| {
            let foreign_key = data_model.foreign_key_for(resource_type, &change.relationship)?;
            let table = sql::ast::TableName(data_model.table_name_for(resource_type)?);
            let mut state = State::new();
            let where_ = where_equals(&mut state, &foreign_key.column_name, &change.new);
            Ok(MutationStep {
                statement: clear_or_delete(
                    table,
                    &foreign_key.column_name,
                    foreign_key.is_nullable,
                    where_,
                ),
                expectation: RowCountExpectation::AtMostOne,
            })
        })
        .collect()
}

/// The foreign keys held by related resources: to-one relationships whose foreign key
/// is at the right side, then to-many relationships.
fn plan_related_updates(
    data_model: &dyn DataModelService,
    change_set: &dyn ChangeSet,
    id: &ResourceId,
) -> Result<Vec<MutationStep>, Error> {
    let resource_type = change_set.resource_type();
    let mut steps = vec![];

    for change in change_set.changed_to_one_with_foreign_key_at_right_side() {
        let related = RelatedTable::new(data_model, resource_type, &change.relationship)?;

        if let Some(old) = &change.old {
            let mut state = State::new();
            let where_ = where_equals(&mut state, &related.id_column, old);
            steps.push(MutationStep {
                statement: related.clear_or_delete(where_),
                expectation: RowCountExpectation::Exactly(1),
            });
        }
        if let Some(new) = &change.new {
            steps.push(MutationStep {
                statement: related.point_to(id, &[new]),
                expectation: RowCountExpectation::Exactly(1),
            });
        }
    }

    for change in change_set.changed_to_many() {
        let related = RelatedTable::new(data_model, resource_type, &change.relationship)?;

        let removed = change.removed();
        if !removed.is_empty() {
            let mut state = State::new();
            let where_ = where_equals_any(&mut state, &related.id_column, &removed);
            steps.push(MutationStep {
                statement: related.clear_or_delete(where_),
                expectation: RowCountExpectation::Exactly(removed.len() as u64),
            });
        }

        let added = change.added();
        if !added.is_empty() {
            steps.push(MutationStep {
                statement: related.point_to(id, &added),
                expectation: RowCountExpectation::Exactly(added.len() as u64),
            });
        }
    }

    Ok(steps)
}

/// The table of a related resource type holding the foreign key of a relationship.
struct RelatedTable {
    table: sql::ast::TableName,
    id_column: String,
    foreign_key_column: String,
    foreign_key_is_nullable: bool,
}

impl RelatedTable {
    fn new(
        data_model: &dyn DataModelService,
        resource_type: &str,
        relationship: &str,
    ) -> Result<RelatedTable, Error> {
        let target = data_model.relationship_target(resource_type, relationship)?;
        let foreign_key = data_model.foreign_key_for(resource_type, relationship)?;
        if foreign_key.owned_by != RelationshipSide::Right {
            return Err(Error::NotSupported(format!(
                "moving the foreign key of relationship '{relationship}' held by '{resource_type}'"
            )));
        }
        Ok(RelatedTable {
            table: sql::ast::TableName(data_model.table_name_for(&target)?),
            id_column: data_model.id_column_for(&target)?,
            foreign_key_column: foreign_key.column_name,
            foreign_key_is_nullable: foreign_key.is_nullable,
        })
    }

    fn clear_or_delete(&self, where_: sql::ast::Where) -> sql::ast::Statement {
        clear_or_delete(
            self.table.clone(),
            &self.foreign_key_column,
            self.foreign_key_is_nullable,
            where_,
        )
    }

    /// `UPDATE <related> SET <foreign key> = <id> WHERE <related id> IN (...)`
    fn point_to(&self, id: &ResourceId, related: &[&ResourceId]) -> sql::ast::Statement {
        let mut state = State::new();
        let value = state.make_parameter(id.to_parameter_value());
        let assignments = vec![sql::ast::ColumnAssignment {
            column: sql::ast::ColumnName(self.foreign_key_column.clone()),
            value: sql::ast::Operand::Parameter(value),
        }];
        sql::ast::Statement::Update(sql::ast::Update {
            table: self.table.clone(),
            assignments,
            where_: where_equals_any(&mut state, &self.id_column, related),
        })
    }
}

/// Clear the foreign key of the matching rows, or delete them when it cannot be null.
fn clear_or_delete(
    table: sql::ast::TableName,
    foreign_key_column: &str,
    is_nullable: bool,
    where_: sql::ast::Where,
) -> sql::ast::Statement {
    if is_nullable {
        sql::ast::Statement::Update(sql::ast::Update {
            table,
            assignments: vec![sql::ast::ColumnAssignment {
                column: sql::ast::ColumnName(foreign_key_column.to_string()),
                value: sql::ast::Operand::Null,
            }],
            where_,
        })
    } else {
        sql::ast::Statement::Delete(sql::ast::Delete { table, where_ })
    }
}

fn assignments(state: &mut State, change_set: &dyn ChangeSet) -> Vec<sql::ast::ColumnAssignment> {
    change_set
        .changed_columns()
        .iter()
        .map(|(column, value)| sql::ast::ColumnAssignment {
            column: sql::ast::ColumnName(column.clone()),
            value: match value {
                sql::ast::ParameterValue::Null => sql::ast::Operand::Null,
                value => sql::ast::Operand::Parameter(state.make_parameter(value.clone())),
            },
        })
        .collect()
}

fn unqualified_column(name: &str) -> sql::ast::Column {
    sql::ast::Column::InTable(sql::ast::ColumnInTable {
        name: sql::ast::ColumnName(name.to_string()),
        r#type: sql::ast::ColumnType::Scalar,
        table_alias: None,
    })
}

fn where_equals(state: &mut State, column: &str, id: &ResourceId) -> sql::ast::Where {
    where_equals_any(state, column, &[id])
}

fn where_equals_any(state: &mut State, column: &str, ids: &[&ResourceId]) -> sql::ast::Where {
    let values = ids
        .iter()
        .map(|id| state.make_parameter(id.to_parameter_value()))
        .collect();
    sql::ast::Where(sql::helpers::equals_any(unqualified_column(column), values))
}
