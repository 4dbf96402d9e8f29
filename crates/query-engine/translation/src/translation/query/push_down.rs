//! Scope pagination to the primary resources when included relationships multiply rows.
//!
//! The filtered, sorted and limited primary rows are selected in an inner statement,
//! which becomes a derived table. Included relationships are joined to the derived
//! table in the outer statement, so LIMIT counts resources rather than joined rows.
//! References built against the primary table or its joins are redirected to the
//! derived table when the outer statement is assembled.

use std::collections::BTreeSet;

use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, State};
use super::request::{QueryLayer, SortElement};
use super::{fields, sorting};

/// A page of primary resources, translated up to its LIMIT.
pub struct Page<'a> {
    pub current: CurrentStatement,
    pub table: sql::ast::Table,
    pub layer: &'a QueryLayer,
    pub sort: &'a [SortElement],
    pub where_: Option<sql::ast::Where>,
    /// One term per sort element.
    pub order_terms: Vec<sql::ast::OrderByTerm>,
    pub limit: sql::ast::Limit,
}

pub fn push_down_page(env: &Env, state: &mut State, page: Page) -> Result<sql::ast::Select, Error> {
    let Page {
        mut current,
        table,
        layer,
        sort,
        where_,
        order_terms,
        limit,
    } = page;

    // the inner statement exposes every column of the primary table, and the joined
    // columns the ORDER BY needs, renamed where their names collide
    let mut taken = BTreeSet::new();
    let from_selectors = table
        .scalar_columns()
        .into_iter()
        .chain(table.foreign_key_columns())
        .map(|column| {
            taken.insert(column.name().clone());
            sql::helpers::select_column(column)
        })
        .collect();
    let sort_columns = current.sort_columns().to_vec();
    for column in sort_columns {
        let Some(alias) = column.table_alias() else {
            continue;
        };
        let renamed = unique_name(&mut taken, column.name());
        current.add_selectors(
            alias,
            [sql::ast::Selector::Column(sql::ast::ColumnSelector {
                column,
                alias: renamed,
            })],
        );
    }
    let join_aliases = current.join_aliases();

    let inner = current.into_select(
        sql::ast::TableSource::Table(table.clone()),
        from_selectors,
        where_,
        sorting::order_by(order_terms.clone()),
        Some(limit),
    )?;
    let derived_alias = state.make_table_alias();
    let derived = sql::helpers::derived_table(inner, derived_alias)?;

    let mut outer = CurrentStatement::new();
    outer.remap.insert(table.alias, derived_alias);
    for alias in join_aliases {
        outer.remap.insert(alias, derived_alias);
    }

    // columns are redirected to the derived table; count sub-selects are built again,
    // as they would otherwise correlate with the rows before the limit
    let mut outer_terms = Vec::with_capacity(order_terms.len());
    for (term, element) in order_terms.into_iter().zip(sort) {
        match term.target {
            sql::ast::OrderByTarget::Column(_) => outer_terms.push(term),
            sql::ast::OrderByTarget::Count(_) => outer_terms.push(
                sorting::translate_sort_element(env, state, &mut outer, &table, element)?,
            ),
        }
    }

    let selectors = fields::translate_columns(env, &table, &derived, layer.selection.as_ref())?;
    fields::translate_relationships(env, state, &mut outer, &table, layer, &mut outer_terms)?;

    outer.into_select(
        derived,
        selectors,
        None,
        sorting::order_by(outer_terms),
        None,
    )
}

/// `None` when `name` is still free, otherwise the first free `{name}0`, `{name}1`, ...
fn unique_name(
    taken: &mut BTreeSet<sql::ast::ColumnName>,
    name: &sql::ast::ColumnName,
) -> Option<sql::ast::ColumnName> {
    if taken.insert(name.clone()) {
        return None;
    }
    let mut suffix = 0;
    loop {
        let candidate = sql::ast::ColumnName(format!("{}{suffix}", name.0));
        if taken.insert(candidate.clone()) {
            return Some(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_names_get_the_first_free_suffix() {
        let mut taken = BTreeSet::from([
            sql::ast::ColumnName("Id".to_string()),
            sql::ast::ColumnName("Id0".to_string()),
        ]);

        assert_eq!(
            unique_name(&mut taken, &sql::ast::ColumnName("Id".to_string())),
            Some(sql::ast::ColumnName("Id1".to_string()))
        );
        assert_eq!(
            unique_name(&mut taken, &sql::ast::ColumnName("Name".to_string())),
            None
        );
    }
}
