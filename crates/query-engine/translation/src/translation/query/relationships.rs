//! Follow relationships: join related tables, or correlate sub-selects with them.

use query_engine_metadata::metadata::{ForeignKey, RelationshipSide};
use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, State};
use super::request::{FilterExpression, RelationshipChain};
use super::root::{translate_query_from, SelectionShape};

/// The pair of columns equated to follow a relationship from `from` to `to`.
/// The outer column belongs to `from`, the inner column to `to`.
fn relationship_columns(
    foreign_key: &ForeignKey,
    from: &sql::ast::Table,
    to: &sql::ast::Table,
) -> Result<(sql::ast::Column, sql::ast::Column), Error> {
    let column_name = sql::ast::ColumnName(foreign_key.column_name.clone());
    match foreign_key.owned_by {
        RelationshipSide::Left => Ok((from.get_column(&column_name)?, to.id_column())),
        RelationshipSide::Right => Ok((from.id_column(), to.get_column(&column_name)?)),
    }
}

/// Join the table a relationship points to, or find the join made earlier for it.
///
/// The join is an inner join when the foreign key lives on our side and cannot be
/// null, because every row then has a match.
pub fn join_relationship(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    from: &sql::ast::Table,
    relationship: &str,
) -> Result<sql::ast::Table, Error> {
    if let Some(table) = current.lookup_join(from.alias, relationship) {
        return Ok(table.clone());
    }

    let info = env.lookup_relationship(&from.resource_type, relationship)?;
    let foreign_key = env.foreign_key_for(&from.resource_type, relationship)?;
    let joined = env.make_table(&info.target, state.make_table_alias())?;

    let join_type = if foreign_key.owned_by == RelationshipSide::Left && !foreign_key.is_nullable
    {
        sql::ast::JoinType::Inner
    } else {
        sql::ast::JoinType::Left
    };
    let (outer_column, inner_column) = relationship_columns(&foreign_key, from, &joined)?;
    let join = sql::ast::Join::new(
        join_type,
        sql::ast::TableSource::Table(joined.clone()),
        outer_column,
        inner_column,
    )?;

    current.add_relationship_join(from.alias, relationship, joined.clone(), join);
    Ok(joined)
}

/// Join a to-many relationship whose rows are filtered. The related table is wrapped
/// in a derived table holding only the matching rows, which is left joined.
///
/// Returns the base table inside the derived table, and the derived table itself.
pub fn join_filtered_relationship(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    from: &sql::ast::Table,
    relationship: &str,
    filter: &FilterExpression,
) -> Result<(sql::ast::Table, sql::ast::TableSource), Error> {
    let info = env.lookup_relationship(&from.resource_type, relationship)?;
    if !info.is_to_many() {
        return Err(Error::ExpectedToManyRelationship {
            resource_type: from.resource_type.clone(),
            relationship: relationship.to_string(),
        });
    }
    let foreign_key = env.foreign_key_for(&from.resource_type, relationship)?;

    let base = env.make_table(&info.target, state.make_table_alias())?;
    let select = translate_query_from(
        env,
        state,
        base.clone(),
        Some(filter),
        SelectionShape::Columns,
    )?;
    let derived_alias = state.make_table_alias();
    let derived = sql::helpers::derived_table(select, derived_alias)?;

    // the join columns name the base table, they are redirected once the select is assembled
    current.remap.insert(base.alias, derived_alias);

    let (outer_column, inner_column) = relationship_columns(&foreign_key, from, &base)?;
    let join = sql::ast::Join::new(
        sql::ast::JoinType::Left,
        derived.clone(),
        outer_column,
        inner_column,
    )?;
    current.add_join(join);

    Ok((base, derived))
}

/// Walk a chain of to-one relationships, joining each of them.
/// Returns the table at the end of the chain.
pub fn follow_to_one_chain(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    from: &sql::ast::Table,
    chain: &[String],
) -> Result<sql::ast::Table, Error> {
    let mut table = from.clone();
    for relationship in chain {
        let info = env.lookup_relationship(&table.resource_type, relationship)?;
        if !info.is_to_one() {
            return Err(Error::ExpectedToOneRelationship {
                resource_type: table.resource_type.clone(),
                relationship: relationship.clone(),
            });
        }
        table = join_relationship(env, state, current, &table, relationship)?;
    }
    Ok(table)
}

/// Split a relationship chain into the to-one prefix and the final relationship, which
/// must be a to-many relationship. The prefix is joined.
pub fn follow_to_many_chain<'c>(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    from: &sql::ast::Table,
    chain: &'c RelationshipChain,
    context: &'static str,
) -> Result<(sql::ast::Table, &'c str), Error> {
    let (last, prefix) = chain.split_last().ok_or(Error::EmptyPath(context))?;
    let owner = follow_to_one_chain(env, state, current, from, prefix)?;

    let info = env.lookup_relationship(&owner.resource_type, last)?;
    if !info.is_to_many() {
        return Err(Error::ExpectedToManyRelationship {
            resource_type: owner.resource_type.clone(),
            relationship: last.clone(),
        });
    }
    Ok((owner, last))
}

/// A sub-select over the related rows of a relationship, correlated with the row of
/// `from` it is evaluated for.
pub fn correlated_select(
    env: &Env,
    state: &mut State,
    from: &sql::ast::Table,
    relationship: &str,
    filter: Option<&FilterExpression>,
    shape: SelectionShape,
) -> Result<sql::ast::Select, Error> {
    let info = env.lookup_relationship(&from.resource_type, relationship)?;
    let foreign_key = env.foreign_key_for(&from.resource_type, relationship)?;
    let related = env.make_table(&info.target, state.make_table_alias())?;

    let mut select = translate_query_from(env, state, related.clone(), filter, shape)?;

    let (outer_column, inner_column) = relationship_columns(&foreign_key, from, &related)?;
    sql::helpers::prepend_where(
        &mut select,
        sql::helpers::column_equals(outer_column, inner_column),
    );
    Ok(select)
}
