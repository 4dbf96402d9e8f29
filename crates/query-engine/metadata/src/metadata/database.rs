//! Metadata information regarding the database tables backing resource types.

use std::collections::BTreeMap;

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The scalar types supported by the Engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Smallint,
    Integer,
    Bigint,
    Real,
    #[serde(rename = "double precision")]
    DoublePrecision,
    Numeric,
    #[serde(rename = "character varying")]
    CharacterVarying,
    Text,
    Date,
    #[serde(rename = "timestamp with time zone")]
    TimestampWithTimeZone,
    #[serde(rename = "timestamp without time zone")]
    TimestampWithoutTimeZone,
    Uuid,
}

impl ScalarType {
    /// Can values of this type be matched against text patterns (`LIKE`).
    pub fn supports_text_matching(self) -> bool {
        matches!(self, ScalarType::CharacterVarying | ScalarType::Text)
    }

    /// Is this one of the integral types.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ScalarType::Smallint | ScalarType::Integer | ScalarType::Bigint
        )
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ScalarType::DoublePrecision => write!(f, "double precision"),
            ScalarType::CharacterVarying => write!(f, "character varying"),
            ScalarType::TimestampWithTimeZone => write!(f, "timestamp with time zone"),
            ScalarType::TimestampWithoutTimeZone => write!(f, "timestamp without time zone"),
            _ => write!(f, "{}", format!("{self:?}").to_lowercase()),
        }
    }
}

/// Can this column contain null values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Nullable {
    #[default]
    Nullable,
    NonNullable,
}

/// Information about a database column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub r#type: ScalarType,
    #[serde(default)]
    pub nullable: Nullable,
}

/// The columns of a table, keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ColumnsInfo(pub BTreeMap<String, ColumnInfo>);

/// Mapping from an enum type name to its members.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EnumTypes(pub BTreeMap<String, EnumType>);

/// An enum stored by its underlying integral value.
/// Maps the member name exposed in queries to the value stored in the column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EnumType(pub BTreeMap<String, i64>);

impl EnumType {
    /// The underlying value of a member, if there is one.
    pub fn underlying_value(&self, member: &str) -> Option<i64> {
        self.0.get(member).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_names_round_trip_through_serde() {
        for scalar_type in enum_iterator::all::<ScalarType>() {
            let serialized = serde_json::to_value(scalar_type).unwrap();
            assert_eq!(
                serialized,
                serde_json::Value::String(scalar_type.to_string()),
                "The type {scalar_type:?} does not serialize to its display name."
            );
        }
    }

    #[test]
    fn test_only_character_types_support_text_matching() {
        let text_types = enum_iterator::all::<ScalarType>()
            .filter(|scalar_type| scalar_type.supports_text_matching())
            .collect::<Vec<_>>();

        assert_eq!(
            text_types,
            vec![ScalarType::CharacterVarying, ScalarType::Text]
        );
    }
}
