//! Handle the selected attributes and the included relationships of a query layer.

use std::collections::BTreeSet;

use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, State, ID_FIELD};
use super::relationships::{join_filtered_relationship, join_relationship};
use super::request::{QueryLayer, Selection};
use super::sorting::translate_order_by;

/// The scalar columns to select for a resource type.
///
/// Without a selection all scalar columns are selected. A selection containing a
/// calculated attribute selects all scalar columns too, because its value is derived
/// from other columns. Otherwise the identifier and the columns of the selected
/// attributes are selected, in table order.
pub fn selected_columns(
    env: &Env,
    table: &sql::ast::Table,
    selection: Option<&Selection>,
) -> Result<Vec<sql::ast::ColumnName>, Error> {
    let Some(selection) = selection else {
        return Ok(table.scalar_columns.clone());
    };
    if selection.attributes.is_empty() && !selection.relationships.is_empty() {
        return Ok(table.scalar_columns.clone());
    }

    let info = env.lookup_resource_type(&table.resource_type)?;
    let mut wanted = BTreeSet::new();
    for attribute in &selection.attributes {
        // the identifier is always selected
        if attribute == ID_FIELD {
            continue;
        }
        let attribute_info =
            info.attributes
                .get(attribute)
                .ok_or_else(|| Error::AttributeNotFound {
                    resource_type: table.resource_type.clone(),
                    attribute: attribute.clone(),
                })?;
        match &attribute_info.column {
            Some(column) => {
                wanted.insert(column.clone());
            }
            None => return Ok(table.scalar_columns.clone()),
        }
    }

    Ok(table
        .scalar_columns
        .iter()
        .filter(|column| column.0 == info.id_column || wanted.contains(&column.0))
        .cloned()
        .collect())
}

/// Selectors for the selected columns of `table`, read from the table source that
/// exposes it: the table itself, or a derived table wrapping it.
pub fn translate_columns(
    env: &Env,
    table: &sql::ast::Table,
    exposed: &sql::ast::TableSource,
    selection: Option<&Selection>,
) -> Result<Vec<sql::ast::Selector>, Error> {
    selected_columns(env, table, selection)?
        .iter()
        .map(|name| {
            let column = exposed.get_column(name, Some(table.alias))?;
            Ok(sql::helpers::select_column(column))
        })
        .collect()
}

/// Join and select the relationships of a layer, recursively.
///
/// To-many relationships multiply the rows of the table they are joined from, so the
/// identifier of each of them is added to the ORDER BY to keep related rows together.
pub fn translate_relationships(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    layer: &QueryLayer,
    order_terms: &mut Vec<sql::ast::OrderByTerm>,
) -> Result<(), Error> {
    for (relationship, sub_layer) in layer.relationships() {
        let info = env.lookup_relationship(&table.resource_type, &relationship)?;

        if sub_layer.pagination.is_some() {
            tracing::debug!(
                relationship = relationship.as_str(),
                "Ignoring pagination of an included relationship"
            );
        }

        let (joined, exposed) = match &sub_layer.filter {
            Some(filter) => {
                join_filtered_relationship(env, state, current, table, &relationship, filter)?
            }
            None => {
                let joined = join_relationship(env, state, current, table, &relationship)?;
                let exposed = sql::ast::TableSource::Table(joined.clone());
                (joined, exposed)
            }
        };

        let selectors = translate_columns(env, &joined, &exposed, sub_layer.selection.as_ref())?;
        if let Some(alias) = exposed.alias() {
            current.add_selectors(alias, selectors);
        }

        if let Some(sort) = &sub_layer.sort {
            order_terms.extend(translate_order_by(env, state, current, &joined, sort)?);
        }
        if info.is_to_many() {
            order_terms.push(sql::ast::OrderByTerm {
                target: sql::ast::OrderByTarget::Column(joined.id_column()),
                direction: sql::ast::OrderByDirection::Asc,
            });
        }

        translate_relationships(env, state, current, &joined, &sub_layer, order_terms)?;
    }
    Ok(())
}

/// Do the relationships of a layer, or of any layer below it, reach a to-many
/// relationship.
pub fn reaches_to_many(env: &Env, resource_type: &str, layer: &QueryLayer) -> Result<bool, Error> {
    for (relationship, sub_layer) in layer.relationships() {
        let info = env.lookup_relationship(resource_type, &relationship)?;
        if info.is_to_many() || reaches_to_many(env, &info.target, &sub_layer)? {
            return Ok(true);
        }
    }
    Ok(false)
}
