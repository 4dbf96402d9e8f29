//! Handle the translation of literal values.

use super::super::error::Error;
use query_engine_metadata::metadata::database;
use query_engine_sql::sql;

/// Convert a JSON value into a SQL parameter value of the given column type.
/// Values of an enum-typed attribute are member names, stored by their underlying value.
pub fn translate_json_value(
    enum_types: &database::EnumTypes,
    value: &serde_json::Value,
    scalar_type: database::ScalarType,
    enum_type: Option<&str>,
) -> Result<sql::ast::ParameterValue, Error> {
    let mismatch = || Error::TypeMismatch(value.clone(), scalar_type);

    if value.is_null() {
        return Ok(sql::ast::ParameterValue::Null);
    }

    if let Some(enum_type) = enum_type {
        return match value {
            serde_json::Value::String(member) => {
                let members = enum_types
                    .0
                    .get(enum_type)
                    .ok_or_else(|| Error::EnumTypeNotFound(enum_type.to_string()))?;
                members
                    .underlying_value(member)
                    .map(sql::ast::ParameterValue::Int)
                    .ok_or_else(|| Error::UnknownEnumMember {
                        enum_type: enum_type.to_string(),
                        member: member.clone(),
                    })
            }
            serde_json::Value::Number(num) => num
                .as_i64()
                .map(sql::ast::ParameterValue::Int)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        };
    }

    match value {
        // numbers
        serde_json::Value::Number(num) => match scalar_type {
            // integers
            database::ScalarType::Smallint
            | database::ScalarType::Integer
            | database::ScalarType::Bigint => num
                .as_i64()
                .map(sql::ast::ParameterValue::Int)
                .ok_or_else(mismatch),

            // floats
            database::ScalarType::Real
            | database::ScalarType::DoublePrecision
            | database::ScalarType::Numeric => num
                .as_f64()
                .map(sql::ast::ParameterValue::Float)
                .ok_or_else(mismatch),

            _ => Err(mismatch()),
        },

        // strings
        serde_json::Value::String(str) => match scalar_type {
            database::ScalarType::Smallint
            | database::ScalarType::Integer
            | database::ScalarType::Bigint => str
                .parse::<i64>()
                .map(sql::ast::ParameterValue::Int)
                .map_err(|_| mismatch()),

            database::ScalarType::Real
            | database::ScalarType::DoublePrecision
            | database::ScalarType::Numeric => str
                .parse::<f64>()
                .map(sql::ast::ParameterValue::Float)
                .map_err(|_| mismatch()),

            database::ScalarType::CharacterVarying | database::ScalarType::Text => {
                Ok(sql::ast::ParameterValue::String(str.clone()))
            }

            database::ScalarType::Date => Ok(cast(str, sql::ast::CastType::Date)),
            database::ScalarType::TimestampWithoutTimeZone => {
                Ok(cast(str, sql::ast::CastType::Timestamp))
            }
            database::ScalarType::TimestampWithTimeZone => {
                Ok(cast(str, sql::ast::CastType::TimestampWithTimeZone))
            }
            database::ScalarType::Uuid => Ok(cast(str, sql::ast::CastType::Uuid)),

            database::ScalarType::Boolean => Err(mismatch()),
        },

        // booleans
        serde_json::Value::Bool(b) => match scalar_type {
            database::ScalarType::Boolean => Ok(sql::ast::ParameterValue::Bool(*b)),
            _ => Err(mismatch()),
        },

        serde_json::Value::Null
        | serde_json::Value::Array(_)
        | serde_json::Value::Object(_) => Err(mismatch()),
    }
}

fn cast(value: &str, cast_type: sql::ast::CastType) -> sql::ast::ParameterValue {
    sql::ast::ParameterValue::Cast(value.to_string(), cast_type)
}
