//! Errors raised while building or rewriting SQL trees.

use super::ast::{ColumnName, TableAlias};

/// A tree that cannot be built or rewritten.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Column '{column}' not found in table source {}.", display_alias(.table))]
    ColumnNotFound {
        column: ColumnName,
        table: Option<TableAlias>,
    },
    #[error(
        "Column '{column}' of table {table} is not accessible from this scope. Tables in scope: {}.",
        display_aliases(.candidates)
    )]
    InaccessibleColumn {
        column: ColumnName,
        table: TableAlias,
        candidates: Vec<TableAlias>,
    },
    #[error("Derived table {} must select at least one column.", display_alias(.alias))]
    SelectWithoutSelectors { alias: Option<TableAlias> },
    #[error(
        "Join on {} must equate a column outside it ('{outer}') with a column inside it ('{inner}').",
        display_alias(.table)
    )]
    InvalidJoinColumns {
        outer: ColumnName,
        inner: ColumnName,
        table: Option<TableAlias>,
    },
}

fn display_alias(alias: &Option<TableAlias>) -> String {
    match alias {
        Some(alias) => alias.to_string(),
        None => "(unaliased)".to_string(),
    }
}

fn display_aliases(aliases: &[TableAlias]) -> String {
    if aliases.is_empty() {
        return "none".to_string();
    }
    aliases
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
