//! Translate filter expressions into WHERE conditions.

use query_engine_metadata::metadata::database;
use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{CurrentStatement, Env, FieldInfo, State};
use super::relationships::{correlated_select, follow_to_many_chain, follow_to_one_chain};
use super::request::{ComparisonOperator, FieldChain, FilterExpression, QueryExpression};
use super::root::SelectionShape;
use super::values;

/// Translate a filter expression over the rows of `table` into a SQL boolean condition.
pub fn translate_expression(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    expression: &FilterExpression,
) -> Result<sql::ast::Filter, Error> {
    match expression {
        FilterExpression::Comparison {
            operator,
            left,
            right,
        } => translate_comparison(env, state, current, table, *operator, left, right),
        FilterExpression::And { terms } => {
            let terms = translate_terms(env, state, current, table, terms, "and")?;
            Ok(sql::helpers::and(terms))
        }
        FilterExpression::Or { terms } => {
            let terms = translate_terms(env, state, current, table, terms, "or")?;
            Ok(sql::helpers::or(terms))
        }
        FilterExpression::Not { expression } => {
            let filter = translate_expression(env, state, current, table, expression)?;
            Ok(sql::ast::Filter::Not(Box::new(filter)))
        }
        FilterExpression::TextMatch {
            field,
            text,
            match_kind,
        } => {
            let (column, info) = translate_field(env, state, current, table, field)?;
            if !info.scalar_type.supports_text_matching() {
                return Err(Error::TypeMismatch(
                    serde_json::Value::String(text.clone()),
                    info.scalar_type,
                ));
            }
            Ok(sql::ast::Filter::Like {
                column,
                text: text.clone(),
                match_kind: *match_kind,
            })
        }
        FilterExpression::Any { field, values } => {
            if values.is_empty() {
                return Err(Error::NotSupported("'any' without values".to_string()));
            }
            let (column, info) = translate_field(env, state, current, table, field)?;
            let (nulls, values): (Vec<_>, Vec<_>) =
                values.iter().partition(|value| value.is_null());
            let parameters = values
                .into_iter()
                .map(|value| {
                    let value = translate_constant(env, value, &OperandType::Field(info.clone()))?;
                    Ok(state.make_parameter(value))
                })
                .collect::<Result<Vec<_>, Error>>()?;

            // a null never equals anything, so it becomes an IS NULL test
            let mut terms = Vec::with_capacity(2);
            if !parameters.is_empty() {
                terms.push(sql::helpers::equals_any(column.clone(), parameters));
            }
            if !nulls.is_empty() {
                terms.push(sql::ast::Filter::Comparison {
                    left: sql::ast::Operand::Column(column),
                    operator: sql::ast::ComparisonOperator::Equal,
                    right: sql::ast::Operand::Null,
                });
            }
            Ok(sql::helpers::or(terms))
        }
        FilterExpression::Has {
            relationship,
            filter,
        } => {
            let (owner, relationship) =
                follow_to_many_chain(env, state, current, table, relationship, "has")?;
            let select = correlated_select(
                env,
                state,
                &owner,
                relationship,
                filter.as_deref(),
                SelectionShape::One,
            )?;
            Ok(sql::ast::Filter::Exists(Box::new(select)))
        }
        FilterExpression::IsType { .. } => {
            Err(Error::NotSupported("resource type narrowing".to_string()))
        }
    }
}

fn translate_terms(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    terms: &[FilterExpression],
    operator: &str,
) -> Result<Vec<sql::ast::Filter>, Error> {
    if terms.is_empty() {
        return Err(Error::NotSupported(format!("'{operator}' without terms")));
    }
    terms
        .iter()
        .map(|term| translate_expression(env, state, current, table, term))
        .collect()
}

/// What a constant on the other side of a comparison is compared with.
#[derive(Debug, Clone)]
enum OperandType {
    Field(FieldInfo),
    Count,
}

/// A comparison operand whose constants have not been typed yet.
enum PendingOperand {
    Resolved(sql::ast::Operand, OperandType),
    Constant(serde_json::Value),
    Null,
}

fn translate_comparison(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    operator: ComparisonOperator,
    left: &QueryExpression,
    right: &QueryExpression,
) -> Result<sql::ast::Filter, Error> {
    // columns and sub-selects first, left to right, then the constants they type
    let left = resolve_operand(env, state, current, table, left)?;
    let right = resolve_operand(env, state, current, table, right)?;

    let operand_type = match (&left, &right) {
        (PendingOperand::Resolved(_, operand_type), _)
        | (_, PendingOperand::Resolved(_, operand_type)) => operand_type.clone(),
        _ => {
            return Err(Error::NotSupported(
                "comparisons without a field or count".to_string(),
            ))
        }
    };

    let left = finish_operand(env, state, left, &operand_type)?;
    let right = finish_operand(env, state, right, &operand_type)?;

    let operator = translate_operator(operator);
    if (left == sql::ast::Operand::Null || right == sql::ast::Operand::Null)
        && operator != sql::ast::ComparisonOperator::Equal
    {
        return Err(Error::NotSupported(
            "ordering comparisons with null".to_string(),
        ));
    }

    Ok(sql::ast::Filter::Comparison {
        left,
        operator,
        right,
    })
}

fn resolve_operand(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    expression: &QueryExpression,
) -> Result<PendingOperand, Error> {
    match expression {
        QueryExpression::Field { path } => {
            let (column, info) = translate_field(env, state, current, table, path)?;
            Ok(PendingOperand::Resolved(
                sql::ast::Operand::Column(column),
                OperandType::Field(info),
            ))
        }
        QueryExpression::Count { relationship } => {
            let (owner, relationship) =
                follow_to_many_chain(env, state, current, table, relationship, "count")?;
            let select = correlated_select(
                env,
                state,
                &owner,
                relationship,
                None,
                SelectionShape::Count,
            )?;
            Ok(PendingOperand::Resolved(
                sql::ast::Operand::Count(Box::new(select)),
                OperandType::Count,
            ))
        }
        QueryExpression::Constant { value } if value.is_null() => Ok(PendingOperand::Null),
        QueryExpression::Constant { value } => Ok(PendingOperand::Constant(value.clone())),
        QueryExpression::Null => Ok(PendingOperand::Null),
    }
}

fn finish_operand(
    env: &Env,
    state: &mut State,
    operand: PendingOperand,
    operand_type: &OperandType,
) -> Result<sql::ast::Operand, Error> {
    match operand {
        PendingOperand::Resolved(operand, _) => Ok(operand),
        PendingOperand::Null => Ok(sql::ast::Operand::Null),
        PendingOperand::Constant(value) => {
            let value = translate_constant(env, &value, operand_type)?;
            Ok(sql::ast::Operand::Parameter(state.make_parameter(value)))
        }
    }
}

fn translate_constant(
    env: &Env,
    value: &serde_json::Value,
    operand_type: &OperandType,
) -> Result<sql::ast::ParameterValue, Error> {
    let enum_types = &env.metadata().enum_types;
    match operand_type {
        OperandType::Field(info) => values::translate_json_value(
            enum_types,
            value,
            info.scalar_type,
            info.enum_type.as_deref(),
        ),
        OperandType::Count => {
            values::translate_json_value(enum_types, value, database::ScalarType::Bigint, None)
        }
    }
}

fn translate_operator(operator: ComparisonOperator) -> sql::ast::ComparisonOperator {
    match operator {
        ComparisonOperator::Equals => sql::ast::ComparisonOperator::Equal,
        ComparisonOperator::LessThan => sql::ast::ComparisonOperator::LessThan,
        ComparisonOperator::LessOrEqual => sql::ast::ComparisonOperator::LessThanOrEqual,
        ComparisonOperator::GreaterThan => sql::ast::ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterOrEqual => sql::ast::ComparisonOperator::GreaterThanOrEqual,
    }
}

/// Resolve a field chain to its column, joining the to-one relationships on the way.
pub fn translate_field(
    env: &Env,
    state: &mut State,
    current: &mut CurrentStatement,
    table: &sql::ast::Table,
    path: &FieldChain,
) -> Result<(sql::ast::Column, FieldInfo), Error> {
    let (field, chain) = path.split_last().ok_or(Error::EmptyPath("field"))?;
    let owner = follow_to_one_chain(env, state, current, table, chain)?;
    let info = env.lookup_field(&owner.resource_type, field)?;
    let column = owner.get_column(&info.column)?;
    Ok((column, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_sql::sql::convert::select_to_sql;
    use resource_sql_configuration::QuerySettings;
    use tests_common::todo_model;

    use crate::translation::query::root::translate_query;

    fn count_matching(filter: serde_json::Value) -> Result<sql::string::SQL, Error> {
        let metadata = todo_model::metadata();
        let settings = QuerySettings::default();
        let env = Env::new(&metadata, &settings);
        let filter: FilterExpression = serde_json::from_value(filter).unwrap();

        let select = translate_query(
            &env,
            &mut State::new(),
            "todoItems",
            Some(&filter),
            SelectionShape::Count,
        )?;
        Ok(select_to_sql(&select))
    }

    #[test]
    fn to_one_paths_are_joined_once() {
        let sql = count_matching(serde_json::json!({
            "type": "or",
            "terms": [
                {
                    "type": "comparison",
                    "operator": "equals",
                    "left": { "type": "field", "path": ["owner", "lastName"] },
                    "right": { "type": "constant", "value": "Smith" }
                },
                {
                    "type": "textMatch",
                    "field": ["owner", "firstName"],
                    "text": "Jo",
                    "matchKind": "startsWith"
                }
            ]
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        INNER JOIN "People" AS t2 ON t1."OwnerId" = t2."Id"
        WHERE (t2."LastName" = @p1) OR (t2."FirstName" LIKE 'Jo%')
        "#);
    }

    #[test]
    fn has_becomes_a_correlated_exists() {
        let sql = count_matching(serde_json::json!({
            "type": "has",
            "relationship": ["tags"],
            "filter": {
                "type": "comparison",
                "operator": "equals",
                "left": { "type": "field", "path": ["name"] },
                "right": { "type": "constant", "value": "home" }
            }
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        WHERE EXISTS (
            SELECT 1
            FROM "Tags" AS t2
            WHERE (t1."Id" = t2."TodoItemId") AND (t2."Name" = @p1)
        )
        "#);
    }

    #[test]
    fn constants_compared_with_a_count_are_integers() {
        let sql = count_matching(serde_json::json!({
            "type": "comparison",
            "operator": "greaterThan",
            "left": { "type": "count", "relationship": ["tags"] },
            "right": { "type": "constant", "value": "2" }
        }))
        .unwrap();

        assert_eq!(
            sql.params.get("@p1"),
            Some(&sql::ast::ParameterValue::Int(2))
        );
        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        WHERE (
            SELECT COUNT(*)
            FROM "Tags" AS t2
            WHERE t1."Id" = t2."TodoItemId"
        ) > @p1
        "#);
    }

    #[test]
    fn null_constants_render_as_is_null() {
        let sql = count_matching(serde_json::json!({
            "type": "not",
            "expression": {
                "type": "comparison",
                "operator": "equals",
                "left": { "type": "null" },
                "right": { "type": "field", "path": ["assignee", "id"] }
            }
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        LEFT JOIN "People" AS t2 ON t1."AssigneeId" = t2."Id"
        WHERE NOT (t2."Id" IS NULL)
        "#);
    }

    #[test]
    fn any_with_one_value_is_an_equality() {
        let sql = count_matching(serde_json::json!({
            "type": "any",
            "field": ["description"],
            "values": ["Cook"]
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        WHERE t1."Description" = @p1
        "#);
    }

    #[test]
    fn any_with_several_values_is_a_membership_test() {
        let sql = count_matching(serde_json::json!({
            "type": "any",
            "field": ["priority"],
            "values": ["High", "Low"]
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        WHERE t1."Priority" IN (@p1, @p2)
        "#);
        assert_eq!(
            sql.params.values().cloned().collect::<Vec<_>>(),
            vec![
                sql::ast::ParameterValue::Int(0),
                sql::ast::ParameterValue::Int(2)
            ]
        );
    }

    #[test]
    fn null_among_any_values_is_tested_separately() {
        let sql = count_matching(serde_json::json!({
            "type": "any",
            "field": ["assignee", "id"],
            "values": [3, null, 4]
        }))
        .unwrap();

        insta::assert_snapshot!(sql.sql, @r#"
        SELECT COUNT(*)
        FROM "TodoItems" AS t1
        LEFT JOIN "People" AS t2 ON t1."AssigneeId" = t2."Id"
        WHERE (t2."Id" IN (@p1, @p2)) OR (t2."Id" IS NULL)
        "#);
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn ordering_comparisons_with_null_are_rejected() {
        let result = count_matching(serde_json::json!({
            "type": "comparison",
            "operator": "lessThan",
            "left": { "type": "field", "path": ["durationInHours"] },
            "right": { "type": "null" }
        }));

        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn comparing_two_constants_is_rejected() {
        let result = count_matching(serde_json::json!({
            "type": "comparison",
            "operator": "equals",
            "left": { "type": "constant", "value": 1 },
            "right": { "type": "constant", "value": 1 }
        }));

        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn text_matching_requires_a_text_column() {
        let result = count_matching(serde_json::json!({
            "type": "textMatch",
            "field": ["durationInHours"],
            "text": "1",
            "matchKind": "contains"
        }));

        assert!(matches!(result, Err(Error::TypeMismatch(_, _))));
    }

    #[test]
    fn has_requires_a_to_many_relationship() {
        let result = count_matching(serde_json::json!({
            "type": "has",
            "relationship": ["owner"]
        }));

        assert_eq!(
            result,
            Err(Error::ExpectedToManyRelationship {
                resource_type: "todoItems".to_string(),
                relationship: "owner".to_string()
            })
        );
    }

    #[test]
    fn empty_logical_terms_are_rejected() {
        let result = count_matching(serde_json::json!({ "type": "and", "terms": [] }));

        assert!(matches!(result, Err(Error::NotSupported(_))));
    }
}
