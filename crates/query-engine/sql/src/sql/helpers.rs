//! Helpers for building sql::ast types in certain shapes and patterns.

use super::ast::*;
use super::error::Error;

// SELECTs //

/// Build a select from a single table source with the rest empty.
pub fn simple_select(source: TableSource, selectors: Vec<Selector>) -> Select {
    Select {
        selectors: vec![TableSelectors {
            accessor: TableAccessor::From(source),
            selectors,
        }],
        where_: None,
        order_by: None,
        limit: None,
        alias: None,
    }
}

/// Turn a select into a derived table that can be joined or selected from.
pub fn derived_table(mut select: Select, alias: TableAlias) -> Result<TableSource, Error> {
    if select.column_selectors().next().is_none() {
        return Err(Error::SelectWithoutSelectors { alias: Some(alias) });
    }
    select.alias = Some(alias);
    Ok(TableSource::Select(Box::new(select)))
}

/// Select a column under its own name.
pub fn select_column(column: Column) -> Selector {
    Selector::Column(ColumnSelector {
        column,
        alias: None,
    })
}

/// Add a condition to the WHERE clause of a select, before any existing conditions.
pub fn prepend_where(select: &mut Select, filter: Filter) {
    let filter = match select.where_.take() {
        None => filter,
        Some(Where(existing)) => and(vec![filter, existing]),
    };
    select.where_ = Some(Where(filter));
}

// Filters //

/// `left = right`
pub fn column_equals(left: Column, right: Column) -> Filter {
    Filter::Comparison {
        left: Operand::Column(left),
        operator: ComparisonOperator::Equal,
        right: Operand::Column(right),
    }
}

/// `column = @p` for a single value, `column IN (@p, ...)` for several.
pub fn equals_any(column: Column, mut values: Vec<Parameter>) -> Filter {
    if values.len() == 1 {
        if let Some(value) = values.pop() {
            return Filter::Comparison {
                left: Operand::Column(column),
                operator: ComparisonOperator::Equal,
                right: Operand::Parameter(value),
            };
        }
    }
    Filter::In { column, values }
}

/// Combine filters with AND. Nested ANDs are flattened and a single term is
/// returned as is.
pub fn and(terms: Vec<Filter>) -> Filter {
    logical(LogicalOperator::And, terms)
}

/// Combine filters with OR. Nested ORs are flattened and a single term is
/// returned as is.
pub fn or(terms: Vec<Filter>) -> Filter {
    logical(LogicalOperator::Or, terms)
}

fn logical(operator: LogicalOperator, terms: Vec<Filter>) -> Filter {
    let mut flattened = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            Filter::Logical {
                operator: inner,
                terms,
            } if inner == operator => flattened.extend(terms),
            term => flattened.push(term),
        }
    }

    if flattened.len() == 1 {
        if let Some(term) = flattened.pop() {
            return term;
        }
    }

    Filter::Logical {
        operator,
        terms: flattened,
    }
}
