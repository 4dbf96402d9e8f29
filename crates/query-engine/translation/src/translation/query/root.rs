//! Handle the translation of a query layer into a SELECT over the table of its resource type.

use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, State};
use super::request::{FilterExpression, Pagination, QueryLayer, SortElement};
use super::{fields, filtering, pagination, push_down, sorting};

/// What a filter-only SELECT returns for its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionShape {
    /// The scalar and foreign key columns, so the select can be used as a derived table.
    Columns,
    /// `COUNT(*)`
    Count,
    /// The constant `1`, to test for existence.
    One,
}

/// Translate a filter over the resources of a type into a SELECT of the given shape.
pub fn translate_query(
    env: &Env,
    state: &mut State,
    resource_type: &str,
    filter: Option<&FilterExpression>,
    shape: SelectionShape,
) -> Result<sql::ast::Select, Error> {
    let table = env.make_table(resource_type, state.make_table_alias())?;
    translate_query_from(env, state, table, filter, shape)
}

/// Like `translate_query`, over a table whose alias is already allocated.
pub fn translate_query_from(
    env: &Env,
    state: &mut State,
    table: sql::ast::Table,
    filter: Option<&FilterExpression>,
    shape: SelectionShape,
) -> Result<sql::ast::Select, Error> {
    let mut current = CurrentStatement::new();
    let where_ = translate_where(env, state, &mut current, &table, filter)?;

    let selectors = match shape {
        SelectionShape::Columns => table
            .scalar_columns()
            .into_iter()
            .chain(table.foreign_key_columns())
            .map(sql::helpers::select_column)
            .collect(),
        SelectionShape::Count => vec![sql::ast::Selector::CountStar],
        SelectionShape::One => vec![sql::ast::Selector::One],
    };

    current.into_select(
        sql::ast::TableSource::Table(table),
        selectors,
        where_,
        None,
        None,
    )
}

/// Translate a page of resources: filtered, sorted and limited, with their selected
/// attributes and included relationships.
///
/// When included relationships can multiply the rows of a resource, the page is
/// selected first in a derived table and the relationships are joined to that.
pub fn translate_page(
    env: &Env,
    state: &mut State,
    table: sql::ast::Table,
    layer: &QueryLayer,
    sort: &[SortElement],
    page: Pagination,
) -> Result<sql::ast::Select, Error> {
    let mut current = CurrentStatement::new();

    let where_ = translate_where(env, state, &mut current, &table, layer.filter.as_ref())?;
    let mut order_terms = sorting::translate_order_by(env, state, &mut current, &table, sort)?;
    let limit = pagination::translate_pagination(env, state, page)?;

    if fields::reaches_to_many(env, &table.resource_type, layer)? {
        return push_down::push_down_page(
            env,
            state,
            push_down::Page {
                current,
                table,
                layer,
                sort,
                where_,
                order_terms,
                limit,
            },
        );
    }

    let exposed = sql::ast::TableSource::Table(table.clone());
    let selectors = fields::translate_columns(env, &table, &exposed, layer.selection.as_ref())?;
    fields::translate_relationships(env, state, &mut current, &table, layer, &mut order_terms)?;

    current.into_select(
        exposed,
        selectors,
        where_,
        sorting::order_by(order_terms),
        Some(limit),
    )
}

fn translate_where(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    filter: Option<&FilterExpression>,
) -> Result<Option<sql::ast::Where>, Error> {
    filter
        .map(|filter| {
            filtering::translate_expression(env, state, current, table, filter).map(sql::ast::Where)
        })
        .transpose()
}
