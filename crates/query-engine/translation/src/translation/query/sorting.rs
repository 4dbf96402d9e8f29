//! Translate sort elements into ORDER BY terms.

use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, State};
use super::filtering::translate_field;
use super::relationships::{correlated_select, follow_to_many_chain};
use super::request::{SortDirection, SortElement, SortTarget};
use super::root::SelectionShape;

/// Translate the sort elements over the rows of `table`, one term per element.
pub fn translate_order_by(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    sort: &[SortElement],
) -> Result<Vec<sql::ast::OrderByTerm>, Error> {
    sort.iter()
        .map(|element| translate_sort_element(env, state, current, table, element))
        .collect()
}

/// Translate a single sort element. Columns of joined tables are recorded on the
/// statement, so they can be exposed when the statement is pushed down.
pub fn translate_sort_element(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    element: &SortElement,
) -> Result<sql::ast::OrderByTerm, Error> {
    let target = match &element.target {
        SortTarget::Field { path } => {
            let (column, _) = translate_field(env, state, current, table, path)?;
            if column.table_alias() != Some(table.alias) {
                current.add_sort_column(column.clone());
            }
            sql::ast::OrderByTarget::Column(column)
        }
        SortTarget::Count { relationship } => {
            let (owner, relationship) =
                follow_to_many_chain(env, state, current, table, relationship, "sort")?;
            let select =
                correlated_select(env, state, &owner, relationship, None, SelectionShape::Count)?;
            sql::ast::OrderByTarget::Count(Box::new(select))
        }
    };

    Ok(sql::ast::OrderByTerm {
        target,
        direction: match element.direction {
            SortDirection::Ascending => sql::ast::OrderByDirection::Asc,
            SortDirection::Descending => sql::ast::OrderByDirection::Desc,
        },
    })
}

/// An ORDER BY clause, or none when there is nothing to order by.
pub fn order_by(terms: Vec<sql::ast::OrderByTerm>) -> Option<sql::ast::OrderBy> {
    if terms.is_empty() {
        None
    } else {
        Some(sql::ast::OrderBy { terms })
    }
}
