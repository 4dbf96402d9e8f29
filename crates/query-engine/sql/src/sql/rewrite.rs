//! Repair column references that were made stale by moving a table inside a derived table.
//!
//! When the compiler pushes a table down into a derived table, references built
//! earlier still name the original table alias, which is no longer visible where the
//! reference is used. The alias remap records which derived table now encloses each
//! moved alias; the rewriter walks the tree with the set of visible tables and
//! redirects every stale reference to the column the derived table exposes.

use std::collections::BTreeMap;

use super::ast::*;
use super::error::Error;

/// Former table alias to the alias of the derived table now enclosing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasRemap(BTreeMap<TableAlias, TableAlias>);

impl AliasRemap {
    pub fn new() -> Self {
        AliasRemap(BTreeMap::new())
    }

    pub fn insert(&mut self, from: TableAlias, to: TableAlias) {
        self.0.insert(from, to);
    }

    pub fn get(&self, from: TableAlias) -> Option<TableAlias> {
        self.0.get(&from).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// The tables visible at each nesting level. Entering a select pushes a copy of the
/// enclosing level, so a nested select sees its parent's tables plus its own.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<BTreeMap<TableAlias, TableSource>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![BTreeMap::new()],
        }
    }

    pub fn push(&mut self) {
        let current = self.scopes.last().cloned().unwrap_or_default();
        self.scopes.push(current);
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn declare(&mut self, source: &TableSource) {
        if let (Some(alias), Some(scope)) = (source.alias(), self.scopes.last_mut()) {
            scope.insert(alias, source.clone());
        }
    }

    pub fn lookup(&self, alias: TableAlias) -> Option<&TableSource> {
        self.scopes.last().and_then(|scope| scope.get(&alias))
    }

    pub fn visible_aliases(&self) -> Vec<TableAlias> {
        self.scopes
            .last()
            .map(|scope| scope.keys().copied().collect())
            .unwrap_or_default()
    }
}

/// Whether a column is being declared (a selector) or referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnVisitMode {
    Declaration,
    Reference,
}

/// Rewrite every stale column reference in `select`.
pub fn repair_stale_columns(select: Select, remap: &AliasRemap) -> Result<Select, Error> {
    if remap.is_empty() {
        return Ok(select);
    }
    let mut rewriter = StaleColumnRewriter {
        remap,
        scopes: ScopeStack::new(),
    };
    rewriter.visit_select(select)
}

struct StaleColumnRewriter<'a> {
    remap: &'a AliasRemap,
    scopes: ScopeStack,
}

impl StaleColumnRewriter<'_> {
    fn visit_select(&mut self, select: Select) -> Result<Select, Error> {
        self.scopes.push();
        let result = self.visit_select_in_scope(select);
        self.scopes.pop();
        result
    }

    fn visit_select_in_scope(&mut self, select: Select) -> Result<Select, Error> {
        let Select {
            selectors,
            where_,
            order_by,
            limit,
            alias,
        } = select;

        // every table source is declared before any join condition is looked at
        let mut declared = Vec::with_capacity(selectors.len());
        for TableSelectors {
            accessor,
            selectors,
        } in selectors
        {
            let accessor = match accessor {
                TableAccessor::From(source) => {
                    let source = self.visit_table_source(source)?;
                    self.scopes.declare(&source);
                    TableAccessor::From(source)
                }
                TableAccessor::Join(join) => {
                    let source = self.visit_table_source(join.source)?;
                    self.scopes.declare(&source);
                    TableAccessor::Join(Join { source, ..join })
                }
            };
            declared.push((accessor, selectors));
        }

        let mut repaired = Vec::with_capacity(declared.len());
        for (accessor, selectors) in declared {
            let accessor = match accessor {
                TableAccessor::Join(join) => TableAccessor::Join(Join {
                    outer_column: self
                        .visit_column(join.outer_column, ColumnVisitMode::Reference)?,
                    inner_column: self
                        .visit_column(join.inner_column, ColumnVisitMode::Reference)?,
                    ..join
                }),
                from => from,
            };
            let selectors = selectors
                .into_iter()
                .map(|selector| self.visit_selector(selector))
                .collect::<Result<Vec<_>, _>>()?;
            repaired.push(TableSelectors {
                accessor,
                selectors,
            });
        }

        let where_ = where_
            .map(|Where(filter)| self.visit_filter(filter).map(Where))
            .transpose()?;
        let order_by = order_by
            .map(|order_by| self.visit_order_by(order_by))
            .transpose()?;

        Ok(Select {
            selectors: repaired,
            where_,
            order_by,
            limit,
            alias,
        })
    }

    fn visit_table_source(&mut self, source: TableSource) -> Result<TableSource, Error> {
        match source {
            TableSource::Table(table) => Ok(TableSource::Table(table)),
            TableSource::Select(select) => {
                if select.column_selectors().next().is_none() {
                    return Err(Error::SelectWithoutSelectors {
                        alias: select.alias,
                    });
                }
                Ok(TableSource::Select(Box::new(self.visit_select(*select)?)))
            }
        }
    }

    fn visit_selector(&mut self, selector: Selector) -> Result<Selector, Error> {
        match selector {
            Selector::Column(ColumnSelector { column, alias }) => {
                Ok(Selector::Column(ColumnSelector {
                    column: self.visit_column(column, ColumnVisitMode::Declaration)?,
                    alias,
                }))
            }
            other => Ok(other),
        }
    }

    fn visit_filter(&mut self, filter: Filter) -> Result<Filter, Error> {
        match filter {
            Filter::Comparison {
                left,
                operator,
                right,
            } => Ok(Filter::Comparison {
                left: self.visit_operand(left)?,
                operator,
                right: self.visit_operand(right)?,
            }),
            Filter::Logical { operator, terms } => Ok(Filter::Logical {
                operator,
                terms: terms
                    .into_iter()
                    .map(|term| self.visit_filter(term))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
            Filter::Not(filter) => Ok(Filter::Not(Box::new(self.visit_filter(*filter)?))),
            Filter::Like {
                column,
                text,
                match_kind,
            } => Ok(Filter::Like {
                column: self.visit_column(column, ColumnVisitMode::Reference)?,
                text,
                match_kind,
            }),
            Filter::In { column, values } => Ok(Filter::In {
                column: self.visit_column(column, ColumnVisitMode::Reference)?,
                values,
            }),
            Filter::Exists(select) => Ok(Filter::Exists(Box::new(self.visit_select(*select)?))),
        }
    }

    fn visit_operand(&mut self, operand: Operand) -> Result<Operand, Error> {
        match operand {
            Operand::Column(column) => Ok(Operand::Column(
                self.visit_column(column, ColumnVisitMode::Reference)?,
            )),
            Operand::Count(select) => Ok(Operand::Count(Box::new(self.visit_select(*select)?))),
            other => Ok(other),
        }
    }

    fn visit_order_by(&mut self, order_by: OrderBy) -> Result<OrderBy, Error> {
        let terms = order_by
            .terms
            .into_iter()
            .map(|term| {
                let target = match term.target {
                    OrderByTarget::Column(column) => OrderByTarget::Column(
                        self.visit_column(column, ColumnVisitMode::Reference)?,
                    ),
                    OrderByTarget::Count(select) => {
                        OrderByTarget::Count(Box::new(self.visit_select(*select)?))
                    }
                };
                Ok(OrderByTerm {
                    target,
                    direction: term.direction,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(OrderBy { terms })
    }

    fn visit_column(&self, column: Column, mode: ColumnVisitMode) -> Result<Column, Error> {
        if mode == ColumnVisitMode::Declaration {
            return Ok(column);
        }
        let Some(stale_alias) = column.table_alias() else {
            return Ok(column);
        };
        if self.scopes.lookup(stale_alias).is_some() {
            return Ok(column);
        }

        let mut former = stale_alias;
        // bounded by the remap size, so a cyclic remap cannot loop forever
        for _ in 0..=self.remap.0.len() {
            let Some(enclosing) = self.remap.get(former) else {
                break;
            };
            if let Some(source) = self.scopes.lookup(enclosing) {
                if let Some(found) = source.find_column(column.name(), Some(stale_alias)) {
                    tracing::trace!(
                        "Mapped column {stale_alias}.{} to {enclosing}.{}",
                        column.name(),
                        found.name()
                    );
                    return Ok(found);
                }
            }
            former = enclosing;
        }

        Err(Error::InaccessibleColumn {
            column: column.name().clone(),
            table: stale_alias,
            candidates: self.scopes.visible_aliases(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::convert::select_to_sql;
    use crate::sql::helpers;

    fn alias(unique_index: u32) -> TableAlias {
        TableAlias { unique_index }
    }

    fn name(name: &str) -> ColumnName {
        ColumnName(name.to_string())
    }

    fn table(name: &str, unique_index: u32, scalar: &[&str], foreign_keys: &[&str]) -> Table {
        Table {
            resource_type: name.to_lowercase(),
            name: TableName(name.to_string()),
            alias: alias(unique_index),
            scalar_columns: scalar.iter().map(|c| ColumnName(c.to_string())).collect(),
            foreign_key_columns: foreign_keys
                .iter()
                .map(|c| ColumnName(c.to_string()))
                .collect(),
        }
    }

    /// `SELECT <columns of t1> FROM People AS t1` wrapped as derived table `t2`.
    fn derived_people() -> (Table, TableSource) {
        let people = table("People", 1, &["Id", "LastName"], &["AccountId"]);
        let mut columns = people.scalar_columns();
        columns.extend(people.foreign_key_columns());
        let inner = helpers::simple_select(
            TableSource::Table(people.clone()),
            columns.into_iter().map(helpers::select_column).collect(),
        );
        (people, helpers::derived_table(inner, alias(2)).unwrap())
    }

    #[test]
    fn stale_references_are_redirected_to_the_derived_table() {
        let (people, derived) = derived_people();
        let items = table("TodoItems", 3, &["Id"], &["OwnerId"]);

        let join = Join::new(
            JoinType::Left,
            TableSource::Table(items.clone()),
            people.id_column(),
            items.find_column(&name("OwnerId")).unwrap(),
        )
        .unwrap();
        let last_name = derived.get_column(&name("LastName"), Some(alias(1))).unwrap();
        let mut select =
            helpers::simple_select(derived, vec![helpers::select_column(last_name)]);
        select.selectors.push(TableSelectors {
            accessor: TableAccessor::Join(join),
            selectors: vec![],
        });
        select.order_by = Some(OrderBy {
            terms: vec![OrderByTerm {
                target: OrderByTarget::Column(people.find_column(&name("LastName")).unwrap()),
                direction: OrderByDirection::Asc,
            }],
        });

        let mut remap = AliasRemap::new();
        remap.insert(alias(1), alias(2));
        let repaired = repair_stale_columns(select, &remap).unwrap();

        insta::assert_snapshot!(select_to_sql(&repaired).sql, @r#"
        SELECT t2."LastName"
        FROM (
            SELECT t1."Id", t1."LastName", t1."AccountId"
            FROM "People" AS t1
        ) AS t2
        LEFT JOIN "TodoItems" AS t3 ON t2."Id" = t3."OwnerId"
        ORDER BY t2."LastName"
        "#);
    }

    #[test]
    fn remap_chains_are_followed_until_a_visible_table() {
        let (people, derived) = derived_people();
        let outer = helpers::derived_table(
            helpers::simple_select(
                derived.clone(),
                vec![helpers::select_column(
                    derived.get_column(&name("LastName"), Some(alias(1))).unwrap(),
                )],
            ),
            alias(3),
        )
        .unwrap();

        let mut select = helpers::simple_select(outer, vec![Selector::One]);
        select.where_ = Some(Where(Filter::Comparison {
            left: Operand::Column(people.find_column(&name("LastName")).unwrap()),
            operator: ComparisonOperator::Equal,
            right: Operand::Null,
        }));

        let mut remap = AliasRemap::new();
        remap.insert(alias(1), alias(2));
        remap.insert(alias(2), alias(3));
        let repaired = repair_stale_columns(select, &remap).unwrap();

        let mut sql = crate::sql::string::SQL::new();
        repaired.where_.unwrap().to_sql(&mut sql);
        assert_eq!(sql.sql, r#"WHERE t3."LastName" IS NULL"#);
    }

    #[test]
    fn stale_references_inside_deeply_nested_sub_selects_are_repaired() {
        let (people, derived) = derived_people();
        let items = table("TodoItems", 3, &["Id"], &["OwnerId"]);
        let tags = table("Tags", 4, &["Id"], &["TodoItemId"]);

        // EXISTS (SELECT 1 FROM TodoItems t3 WHERE t1.Id = t3.OwnerId
        //   AND EXISTS (SELECT 1 FROM Tags t4 WHERE t3.Id = t4.TodoItemId AND t1.LastName = NULL))
        let mut tags_exists =
            helpers::simple_select(TableSource::Table(tags.clone()), vec![Selector::One]);
        tags_exists.where_ = Some(Where(helpers::and(vec![
            helpers::column_equals(items.id_column(), tags.find_column(&name("TodoItemId")).unwrap()),
            Filter::Comparison {
                left: Operand::Column(people.find_column(&name("LastName")).unwrap()),
                operator: ComparisonOperator::NotEqual,
                right: Operand::Null,
            },
        ])));
        let mut items_exists =
            helpers::simple_select(TableSource::Table(items.clone()), vec![Selector::One]);
        items_exists.where_ = Some(Where(helpers::and(vec![
            helpers::column_equals(people.id_column(), items.find_column(&name("OwnerId")).unwrap()),
            Filter::Exists(Box::new(tags_exists)),
        ])));

        let mut select = helpers::simple_select(derived, vec![Selector::One]);
        select.where_ = Some(Where(Filter::Exists(Box::new(items_exists))));

        let mut remap = AliasRemap::new();
        remap.insert(alias(1), alias(2));
        let repaired = repair_stale_columns(select, &remap).unwrap();

        insta::assert_snapshot!(select_to_sql(&repaired).sql, @r#"
        SELECT 1
        FROM (
            SELECT t1."Id", t1."LastName", t1."AccountId"
            FROM "People" AS t1
        ) AS t2
        WHERE EXISTS (
            SELECT 1
            FROM "TodoItems" AS t3
            WHERE (t2."Id" = t3."OwnerId") AND (EXISTS (
                SELECT 1
                FROM "Tags" AS t4
                WHERE (t3."Id" = t4."TodoItemId") AND (t2."LastName" IS NOT NULL)
            ))
        )
        "#);
    }

    #[test]
    fn a_column_that_cannot_be_reached_is_an_error() {
        let (_, derived) = derived_people();
        let items = table("TodoItems", 5, &["Id", "Description"], &[]);

        let mut select = helpers::simple_select(derived, vec![Selector::One]);
        select.where_ = Some(Where(Filter::Like {
            column: items.find_column(&name("Description")).unwrap(),
            text: "x".to_string(),
            match_kind: TextMatchKind::Contains,
        }));

        let mut remap = AliasRemap::new();
        remap.insert(alias(5), alias(2));

        assert_eq!(
            repair_stale_columns(select, &remap),
            Err(Error::InaccessibleColumn {
                column: name("Description"),
                table: alias(5),
                candidates: vec![alias(2)],
            })
        );
    }

    #[test]
    fn scopes_are_copied_on_push_and_discarded_on_pop() {
        let (people, _) = derived_people();
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare(&TableSource::Table(people));
        scopes.push();
        assert!(scopes.lookup(alias(1)).is_some());
        assert_eq!(scopes.depth(), 2);
        scopes.pop();
        scopes.pop();
        assert!(scopes.lookup(alias(1)).is_none());
        assert_eq!(scopes.depth(), 0);
    }
}
