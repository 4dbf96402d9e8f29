//! Convert a SQL AST to a low-level SQL string.

use super::ast::*;
use super::string::SQL;

/// Render a statement together with its parameters.
pub fn statement_to_sql(statement: &Statement) -> SQL {
    let mut sql = SQL::new();
    statement.to_sql(&mut sql);
    sql
}

/// Render a select together with its parameters.
pub fn select_to_sql(select: &Select) -> SQL {
    let mut sql = SQL::new();
    select.to_sql(&mut sql);
    sql
}

// Convert to SQL strings

impl Statement {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Statement::Select(select) => select.to_sql(sql),
            Statement::Insert(insert) => insert.to_sql(sql),
            Statement::Update(update) => update.to_sql(sql),
            Statement::Delete(delete) => delete.to_sql(sql),
        }
    }
}

impl Select {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("SELECT ");

        for (index, selector) in self.all_selectors().enumerate() {
            if index > 0 {
                sql.append_syntax(", ");
            }
            selector.to_sql(sql);
        }

        for table_selectors in &self.selectors {
            sql.new_line();
            table_selectors.accessor.to_sql(sql);
        }

        if let Some(where_) = &self.where_ {
            sql.new_line();
            where_.to_sql(sql);
        }

        if let Some(order_by) = &self.order_by {
            sql.new_line();
            order_by.to_sql(sql);
        }

        if let Some(limit) = &self.limit {
            sql.new_line();
            limit.to_sql(sql);
        }
    }
}

/// A select nested inside another statement, on its own indented lines.
fn nested_select_to_sql(select: &Select, sql: &mut SQL) {
    sql.append_syntax("(");
    sql.indent();
    sql.new_line();
    select.to_sql(sql);
    sql.unindent();
    sql.new_line();
    sql.append_syntax(")");
}

impl TableAccessor {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            TableAccessor::From(source) => {
                sql.append_syntax("FROM ");
                source.to_sql(sql);
            }
            TableAccessor::Join(join) => join.to_sql(sql),
        }
    }
}

impl TableSource {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            TableSource::Table(table) => {
                sql.append_identifier(&table.name.0);
                sql.append_syntax(" AS ");
                table.alias.to_sql(sql);
            }
            TableSource::Select(select) => {
                nested_select_to_sql(select, sql);
                if let Some(alias) = &select.alias {
                    sql.append_syntax(" AS ");
                    alias.to_sql(sql);
                }
            }
        }
    }
}

impl Join {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self.join_type {
            JoinType::Inner => sql.append_syntax("INNER JOIN "),
            JoinType::Left => sql.append_syntax("LEFT JOIN "),
        }
        self.source.to_sql(sql);
        sql.append_syntax(" ON ");
        self.outer_column.to_sql(sql);
        sql.append_syntax(" = ");
        self.inner_column.to_sql(sql);
    }
}

impl Selector {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Selector::Column(column_selector) => {
                column_selector.column.to_sql(sql);
                if let Some(alias) = &column_selector.alias {
                    sql.append_syntax(" AS ");
                    sql.append_identifier(&alias.0);
                }
            }
            Selector::One => sql.append_syntax("1"),
            Selector::CountStar => sql.append_syntax("COUNT(*)"),
            Selector::RowNumber(row_number) => {
                sql.append_syntax("ROW_NUMBER() OVER (");
                row_number.order_by.to_sql(sql);
                sql.append_syntax(") AS ");
                sql.append_identifier(&row_number.alias.0);
            }
        }
    }
}

impl Column {
    pub fn to_sql(&self, sql: &mut SQL) {
        if let Some(alias) = self.table_alias() {
            alias.to_sql(sql);
            sql.append_syntax(".");
        }
        sql.append_identifier(&self.name().0);
    }
}

impl TableAlias {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax(&self.to_string());
    }
}

impl Where {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("WHERE ");
        self.0.to_sql(sql);
    }
}

impl Filter {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Filter::Comparison {
                left,
                operator,
                right,
            } => {
                // keep a null operand on the right so it renders as `x IS NULL`
                let (left, right) = match (left, right) {
                    (Operand::Null, right) if *right != Operand::Null => (right, left),
                    _ => (left, right),
                };
                left.to_sql(sql);
                match (right, operator) {
                    (Operand::Null, ComparisonOperator::Equal) => sql.append_syntax(" IS "),
                    (Operand::Null, ComparisonOperator::NotEqual) => {
                        sql.append_syntax(" IS NOT ")
                    }
                    _ => {
                        sql.append_syntax(" ");
                        operator.to_sql(sql);
                        sql.append_syntax(" ");
                    }
                }
                right.to_sql(sql);
            }
            Filter::Logical { operator, terms } => {
                for (index, term) in terms.iter().enumerate() {
                    if index > 0 {
                        sql.append_syntax(" ");
                        operator.to_sql(sql);
                        sql.append_syntax(" ");
                    }
                    sql.append_syntax("(");
                    term.to_sql(sql);
                    sql.append_syntax(")");
                }
            }
            Filter::Not(filter) => {
                sql.append_syntax("NOT (");
                filter.to_sql(sql);
                sql.append_syntax(")");
            }
            Filter::Like {
                column,
                text,
                match_kind,
            } => {
                column.to_sql(sql);
                sql.append_syntax(" LIKE ");
                sql.append_string_literal(&like_pattern(text, *match_kind));
            }
            Filter::In { column, values } => {
                column.to_sql(sql);
                sql.append_syntax(" IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        sql.append_syntax(", ");
                    }
                    sql.append_param(value);
                }
                sql.append_syntax(")");
            }
            Filter::Exists(select) => {
                sql.append_syntax("EXISTS ");
                nested_select_to_sql(select, sql);
            }
        }
    }
}

/// Escape the `LIKE` wildcards in `text` and add wildcards around it.
///
/// `%` becomes `\%` and `_` becomes `\_`. A backslash in the text is doubled as well:
/// backslash is the escape character of `LIKE`, so a lone one would escape whatever
/// follows it instead of matching itself.
fn like_pattern(text: &str, match_kind: TextMatchKind) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    match match_kind {
        TextMatchKind::StartsWith => format!("{escaped}%"),
        TextMatchKind::EndsWith => format!("%{escaped}"),
        TextMatchKind::Contains => format!("%{escaped}%"),
    }
}

impl Operand {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            Operand::Column(column) => column.to_sql(sql),
            Operand::Parameter(parameter) => sql.append_param(parameter),
            Operand::Null => sql.append_syntax("NULL"),
            Operand::Count(select) => nested_select_to_sql(select, sql),
        }
    }
}

impl ComparisonOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        let operator = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
        };
        sql.append_syntax(operator);
    }
}

impl LogicalOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            LogicalOperator::And => sql.append_syntax("AND"),
            LogicalOperator::Or => sql.append_syntax("OR"),
        }
    }
}

impl OrderBy {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("ORDER BY ");
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                sql.append_syntax(", ");
            }
            term.to_sql(sql);
        }
    }
}

impl OrderByTerm {
    pub fn to_sql(&self, sql: &mut SQL) {
        match &self.target {
            OrderByTarget::Column(column) => column.to_sql(sql),
            OrderByTarget::Count(select) => nested_select_to_sql(select, sql),
        }
        if self.direction == OrderByDirection::Desc {
            sql.append_syntax(" DESC");
        }
    }
}

impl Limit {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("LIMIT ");
        sql.append_param(&self.limit);
        if let Some(offset) = &self.offset {
            sql.append_syntax(" OFFSET ");
            sql.append_param(offset);
        }
    }
}

impl Insert {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("INSERT INTO ");
        sql.append_identifier(&self.table.0);
        if self.assignments.is_empty() {
            sql.new_line();
            sql.append_syntax("DEFAULT VALUES");
        } else {
            sql.append_syntax(" (");
            for (index, assignment) in self.assignments.iter().enumerate() {
                if index > 0 {
                    sql.append_syntax(", ");
                }
                sql.append_identifier(&assignment.column.0);
            }
            sql.append_syntax(")");
            sql.new_line();
            sql.append_syntax("VALUES (");
            for (index, assignment) in self.assignments.iter().enumerate() {
                if index > 0 {
                    sql.append_syntax(", ");
                }
                assignment.value.to_sql(sql);
            }
            sql.append_syntax(")");
        }
        sql.new_line();
        sql.append_syntax("RETURNING ");
        sql.append_identifier(&self.returning.0);
    }
}

impl Update {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("UPDATE ");
        sql.append_identifier(&self.table.0);
        sql.new_line();
        sql.append_syntax("SET ");
        for (index, assignment) in self.assignments.iter().enumerate() {
            if index > 0 {
                sql.append_syntax(", ");
            }
            sql.append_identifier(&assignment.column.0);
            sql.append_syntax(" = ");
            assignment.value.to_sql(sql);
        }
        sql.new_line();
        self.where_.to_sql(sql);
    }
}

impl Delete {
    pub fn to_sql(&self, sql: &mut SQL) {
        sql.append_syntax("DELETE FROM ");
        sql.append_identifier(&self.table.0);
        sql.new_line();
        self.where_.to_sql(sql);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::helpers;

    fn alias(unique_index: u32) -> TableAlias {
        TableAlias { unique_index }
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

    fn param(index: u32, value: ParameterValue) -> Parameter {
        Parameter {
            name: ParameterName(format!("@p{index}")),
            value,
        }
    }

    fn column_of(table: &Table, name: &str) -> Column {
        table
            .find_column(&ColumnName(name.to_string()))
            .expect("column exists")
    }

    #[test]
    fn renders_identifiers_with_doubled_quotes() {
        let mut sql = SQL::new();
        sql.append_identifier("Odd\"Name");
        assert_eq!(sql.sql, "\"Odd\"\"Name\"");
    }

    #[test]
    fn renders_a_row_number() {
        let items = table("TodoItems", 1, &["Id", "Description"], &[]);
        let selector = Selector::RowNumber(RowNumber {
            order_by: OrderBy {
                terms: vec![OrderByTerm {
                    target: OrderByTarget::Column(column_of(&items, "Description")),
                    direction: OrderByDirection::Desc,
                }],
            },
            alias: ColumnName("Ordinal".to_string()),
        });

        let mut sql = SQL::new();
        selector.to_sql(&mut sql);

        assert_eq!(
            sql.sql,
            r#"ROW_NUMBER() OVER (ORDER BY t1."Description" DESC) AS "Ordinal""#
        );
    }

    #[test]
    fn renders_a_paginated_select() {
        let items = table("TodoItems", 1, &["Id", "Description"], &["OwnerId"]);
        let mut select = helpers::simple_select(
            TableSource::Table(items.clone()),
            items
                .scalar_columns()
                .into_iter()
                .map(helpers::select_column)
                .collect(),
        );
        select.where_ = Some(Where(Filter::Comparison {
            left: Operand::Column(column_of(&items, "Description")),
            operator: ComparisonOperator::NotEqual,
            right: Operand::Parameter(param(1, ParameterValue::String("x".to_string()))),
        }));
        select.order_by = Some(OrderBy {
            terms: vec![OrderByTerm {
                target: OrderByTarget::Column(items.id_column()),
                direction: OrderByDirection::Desc,
            }],
        });
        select.limit = Some(Limit {
            limit: param(2, ParameterValue::Int(10)),
            offset: Some(param(3, ParameterValue::Int(20))),
        });

        let sql = select_to_sql(&select);

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT t1."Id", t1."Description"
        FROM "TodoItems" AS t1
        WHERE t1."Description" <> @p1
        ORDER BY t1."Id" DESC
        LIMIT @p2 OFFSET @p3
        "#);
        assert_eq!(
            sql.params.into_iter().collect::<Vec<_>>(),
            vec![
                ("@p1".to_string(), ParameterValue::String("x".to_string())),
                ("@p2".to_string(), ParameterValue::Int(10)),
                ("@p3".to_string(), ParameterValue::Int(20)),
            ]
        );
    }

    #[test]
    fn comparison_with_null_renders_is_and_is_not() {
        let items = table("TodoItems", 1, &["Id"], &["AssigneeId"]);
        let filter = helpers::and(vec![
            Filter::Comparison {
                left: Operand::Null,
                operator: ComparisonOperator::Equal,
                right: Operand::Column(column_of(&items, "AssigneeId")),
            },
            Filter::Not(Box::new(Filter::Comparison {
                left: Operand::Column(column_of(&items, "AssigneeId")),
                operator: ComparisonOperator::NotEqual,
                right: Operand::Null,
            })),
        ]);

        let mut sql = SQL::new();
        filter.to_sql(&mut sql);

        assert_eq!(
            sql.sql,
            r#"(t1."AssigneeId" IS NULL) AND (NOT (t1."AssigneeId" IS NOT NULL))"#
        );
    }

    #[test]
    fn like_escapes_wildcards_and_quotes() {
        let items = table("TodoItems", 1, &["Id", "Description"], &[]);
        let filter = helpers::or(vec![
            Filter::Like {
                column: column_of(&items, "Description"),
                text: "100%_it's".to_string(),
                match_kind: TextMatchKind::StartsWith,
            },
            Filter::Like {
                column: column_of(&items, "Description"),
                text: "Cook".to_string(),
                match_kind: TextMatchKind::Contains,
            },
        ]);

        let mut sql = SQL::new();
        filter.to_sql(&mut sql);

        assert_eq!(
            sql.sql,
            r#"(t1."Description" LIKE '100\%\_it''s%') OR (t1."Description" LIKE '%Cook%')"#
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn like_doubles_backslashes() {
        assert_eq!(
            like_pattern(r"C:\temp_", TextMatchKind::EndsWith),
            r"%C:\\temp\_"
        );
    }

    #[test]
    fn joins_equate_an_outer_column_with_an_inner_one() {
        let items = table("TodoItems", 1, &["Id"], &["OwnerId"]);
        let people = table("People", 2, &["Id"], &[]);

        let join = Join::new(
            JoinType::Left,
            TableSource::Table(people.clone()),
            column_of(&items, "OwnerId"),
            people.id_column(),
        );
        assert!(join.is_ok());

        let swapped = Join::new(
            JoinType::Left,
            TableSource::Table(people.clone()),
            people.id_column(),
            column_of(&items, "OwnerId"),
        );
        assert_eq!(
            swapped,
            Err(crate::sql::error::Error::InvalidJoinColumns {
                outer: ColumnName("Id".to_string()),
                inner: ColumnName("OwnerId".to_string()),
                table: Some(alias(2)),
            })
        );

        let both_inside = Join::new(
            JoinType::Inner,
            TableSource::Table(people.clone()),
            people.id_column(),
            people.id_column(),
        );
        assert!(matches!(
            both_inside,
            Err(crate::sql::error::Error::InvalidJoinColumns { .. })
        ));
    }

    #[test]
    fn a_parameter_visited_twice_is_registered_once() {
        let items = table("TodoItems", 1, &["Id"], &[]);
        let shared = param(1, ParameterValue::Int(7));
        let filter = helpers::or(vec![
            helpers::equals_any(items.id_column(), vec![shared.clone()]),
            helpers::equals_any(
                items.id_column(),
                vec![shared, param(2, ParameterValue::Int(8))],
            ),
        ]);

        let mut sql = SQL::new();
        filter.to_sql(&mut sql);

        assert_eq!(
            sql.sql,
            r#"(t1."Id" = @p1) OR (t1."Id" IN (@p1, @p2))"#
        );
        assert_eq!(
            sql.params.keys().cloned().collect::<Vec<_>>(),
            vec!["@p1".to_string(), "@p2".to_string()]
        );
    }

    #[test]
    fn renders_exists_and_derived_tables_indented() {
        let people = table("People", 1, &["Id", "LastName"], &[]);
        let items = table("TodoItems", 2, &["Id"], &["OwnerId"]);

        let mut exists = helpers::simple_select(TableSource::Table(items.clone()), vec![Selector::One]);
        exists.where_ = Some(Where(helpers::column_equals(
            people.id_column(),
            column_of(&items, "OwnerId"),
        )));

        let mut inner = helpers::simple_select(
            TableSource::Table(people.clone()),
            vec![
                helpers::select_column(people.id_column()),
                helpers::select_column(column_of(&people, "LastName")),
            ],
        );
        inner.where_ = Some(Where(Filter::Exists(Box::new(exists))));
        let derived = helpers::derived_table(inner, alias(3)).unwrap();

        let outer = helpers::simple_select(
            derived.clone(),
            vec![helpers::select_column(
                derived.get_column(&ColumnName("LastName".to_string()), None).unwrap(),
            )],
        );

        insta::assert_snapshot!(select_to_sql(&outer).sql, @r#"
        SELECT t3."LastName"
        FROM (
            SELECT t1."Id", t1."LastName"
            FROM "People" AS t1
            WHERE EXISTS (
                SELECT 1
                FROM "TodoItems" AS t2
                WHERE t1."Id" = t2."OwnerId"
            )
        ) AS t3
        "#);
    }

    #[test]
    fn renders_mutation_statements() {
        let insert = Statement::Insert(Insert {
            table: TableName("TodoItems".to_string()),
            assignments: vec![
                ColumnAssignment {
                    column: ColumnName("Description".to_string()),
                    value: Operand::Parameter(param(1, ParameterValue::String("a".to_string()))),
                },
                ColumnAssignment {
                    column: ColumnName("AssigneeId".to_string()),
                    value: Operand::Null,
                },
            ],
            returning: ColumnName("Id".to_string()),
        });
        let empty_insert = Statement::Insert(Insert {
            table: TableName("Tags".to_string()),
            assignments: vec![],
            returning: ColumnName("Id".to_string()),
        });
        let id = Column::InTable(ColumnInTable {
            name: ColumnName("Id".to_string()),
            r#type: ColumnType::Scalar,
            table_alias: None,
        });
        let update = Statement::Update(Update {
            table: TableName("TodoItems".to_string()),
            assignments: vec![ColumnAssignment {
                column: ColumnName("OwnerId".to_string()),
                value: Operand::Parameter(param(1, ParameterValue::Int(4))),
            }],
            where_: Where(helpers::equals_any(
                id.clone(),
                vec![param(2, ParameterValue::Int(9))],
            )),
        });
        let delete = Statement::Delete(Delete {
            table: TableName("TodoItems".to_string()),
            where_: Where(helpers::equals_any(
                id,
                vec![
                    param(1, ParameterValue::Int(1)),
                    param(2, ParameterValue::Int(2)),
                ],
            )),
        });

        insta::assert_snapshot!(statement_to_sql(&insert).sql, @r#"
        INSERT INTO "TodoItems" ("Description", "AssigneeId")
        VALUES (@p1, NULL)
        RETURNING "Id"
        "#);
        insta::assert_snapshot!(statement_to_sql(&empty_insert).sql, @r#"
        INSERT INTO "Tags"
        DEFAULT VALUES
        RETURNING "Id"
        "#);
        insta::assert_snapshot!(statement_to_sql(&update).sql, @r#"
        UPDATE "TodoItems"
        SET "OwnerId" = @p1
        WHERE "Id" = @p2
        "#);
        insta::assert_snapshot!(statement_to_sql(&delete).sql, @r#"
        DELETE FROM "TodoItems"
        WHERE "Id" IN (@p1, @p2)
        "#);
    }
}
