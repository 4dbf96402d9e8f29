//! Helpers for processing requests and building SQL.

use std::collections::BTreeMap;

use query_engine_metadata::metadata::{
    self, database, DataModelService, ForeignKey, RelationshipInfo, ResourceField,
    ResourceTypeInfo,
};
use query_engine_sql::sql;
use resource_sql_configuration::QuerySettings;

use super::error::Error;

/// The name of the field holding a resource's identifier.
pub const ID_FIELD: &str = "id";

/// Static information from the configuration.
pub struct Env<'a> {
    metadata: &'a metadata::Metadata,
    settings: &'a QuerySettings,
}

/// What we know about a field we filter or sort on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub column: sql::ast::ColumnName,
    pub scalar_type: database::ScalarType,
    pub enum_type: Option<String>,
}

impl<'a> Env<'a> {
    /// Create a new Env by supplying the metadata and query settings.
    pub fn new(metadata: &'a metadata::Metadata, settings: &'a QuerySettings) -> Env<'a> {
        Env { metadata, settings }
    }

    pub fn metadata(&self) -> &'a metadata::Metadata {
        self.metadata
    }

    pub fn settings(&self) -> &'a QuerySettings {
        self.settings
    }

    /// Lookup a resource type's information in the metadata.
    pub fn lookup_resource_type(&self, resource_type: &str) -> Result<&'a ResourceTypeInfo, Error> {
        Ok(self.metadata.lookup_resource_type(resource_type)?)
    }

    /// Lookup a relationship declared on a resource type.
    pub fn lookup_relationship(
        &self,
        resource_type: &str,
        relationship: &str,
    ) -> Result<&'a RelationshipInfo, Error> {
        Ok(self
            .metadata
            .lookup_relationship(resource_type, relationship)?)
    }

    pub fn foreign_key_for(&self, resource_type: &str, relationship: &str) -> Result<ForeignKey, Error> {
        Ok(self.metadata.foreign_key_for(resource_type, relationship)?)
    }

    /// Lookup an enum type in the metadata.
    pub fn lookup_enum_type(&self, enum_type: &str) -> Result<&'a database::EnumType, Error> {
        self.metadata
            .enum_types
            .0
            .get(enum_type)
            .ok_or_else(|| Error::EnumTypeNotFound(enum_type.to_string()))
    }

    /// Lookup the column behind a field. Calculated attributes have no column and
    /// cannot be used for sorting or filtering.
    pub fn lookup_field(&self, resource_type: &str, field: &str) -> Result<FieldInfo, Error> {
        let info = self.lookup_resource_type(resource_type)?;

        let (column, enum_type) = if field == ID_FIELD {
            (info.id_column.clone(), None)
        } else {
            let attribute =
                info.attributes
                    .get(field)
                    .ok_or_else(|| Error::AttributeNotFound {
                        resource_type: resource_type.to_string(),
                        attribute: field.to_string(),
                    })?;
            let column = attribute
                .column
                .clone()
                .ok_or_else(|| Error::FieldUnavailable {
                    resource_type: resource_type.to_string(),
                    field: field.to_string(),
                })?;
            (column, attribute.enum_type.clone())
        };

        let column_info = info
            .columns
            .0
            .get(&column)
            .ok_or_else(|| Error::FieldUnavailable {
                resource_type: resource_type.to_string(),
                field: field.to_string(),
            })?;

        Ok(FieldInfo {
            column: sql::ast::ColumnName(column),
            scalar_type: column_info.r#type,
            enum_type,
        })
    }

    /// Build the table source for a resource type. Columns backing a relationship are
    /// foreign keys. All others are scalar columns, including those no field is mapped to.
    pub fn make_table(
        &self,
        resource_type: &str,
        alias: sql::ast::TableAlias,
    ) -> Result<sql::ast::Table, Error> {
        let mappings = self.metadata.column_mappings_for(resource_type)?;

        let mut scalar_columns = vec![];
        let mut foreign_key_columns = vec![];
        for (column, field) in mappings {
            match field {
                Some(ResourceField::Relationship { .. }) => {
                    foreign_key_columns.push(sql::ast::ColumnName(column));
                }
                Some(ResourceField::Id | ResourceField::Attribute(_)) | None => {
                    scalar_columns.push(sql::ast::ColumnName(column));
                }
            }
        }

        Ok(sql::ast::Table {
            resource_type: resource_type.to_string(),
            name: sql::ast::TableName(self.metadata.table_name_for(resource_type)?),
            alias,
            scalar_columns,
            foreign_key_columns,
        })
    }
}

/// Stateful information changed throughout the translation process.
/// Table aliases and parameter names are unique within one compiled statement; start
/// a new `State` for every statement.
#[derive(Debug, Default)]
pub struct State {
    table_index: u32,
    parameter_index: u32,
}

impl State {
    /// Build a new state.
    pub fn new() -> State {
        State::default()
    }

    /// Provide a fresh table alias: `t1`, `t2`, ...
    pub fn make_table_alias(&mut self) -> sql::ast::TableAlias {
        self.table_index += 1;
        sql::ast::TableAlias {
            unique_index: self.table_index,
        }
    }

    /// Provide a fresh parameter: `@p1`, `@p2`, ...
    pub fn make_parameter(&mut self, value: sql::ast::ParameterValue) -> sql::ast::Parameter {
        self.parameter_index += 1;
        sql::ast::Parameter {
            name: sql::ast::ParameterName(format!("@p{}", self.parameter_index)),
            value,
        }
    }
}

/// The joins and selectors collected while building one SELECT.
#[derive(Debug, Default)]
pub struct CurrentStatement {
    joins: Vec<sql::ast::Join>,
    /// The table joined for a relationship, by the alias of the table it was joined from.
    join_lookup: BTreeMap<(sql::ast::TableAlias, String), sql::ast::Table>,
    selectors: BTreeMap<sql::ast::TableAlias, Vec<sql::ast::Selector>>,
    /// Joined columns the ORDER BY refers to.
    sort_columns: Vec<sql::ast::Column>,
    pub remap: sql::rewrite::AliasRemap,
}

impl CurrentStatement {
    pub fn new() -> CurrentStatement {
        CurrentStatement::default()
    }

    pub fn lookup_join(
        &self,
        from: sql::ast::TableAlias,
        relationship: &str,
    ) -> Option<&sql::ast::Table> {
        self.join_lookup.get(&(from, relationship.to_string()))
    }

    /// Add a join that can be found again by the table and relationship it follows.
    pub fn add_relationship_join(
        &mut self,
        from: sql::ast::TableAlias,
        relationship: &str,
        table: sql::ast::Table,
        join: sql::ast::Join,
    ) {
        self.join_lookup
            .insert((from, relationship.to_string()), table);
        self.joins.push(join);
    }

    /// Add a join that is never reused.
    pub fn add_join(&mut self, join: sql::ast::Join) {
        self.joins.push(join);
    }

    pub fn join_aliases(&self) -> Vec<sql::ast::TableAlias> {
        self.joins
            .iter()
            .filter_map(|join| join.source.alias())
            .collect()
    }

    pub fn add_selectors(
        &mut self,
        source: sql::ast::TableAlias,
        selectors: impl IntoIterator<Item = sql::ast::Selector>,
    ) {
        self.selectors.entry(source).or_default().extend(selectors);
    }

    pub fn add_sort_column(&mut self, column: sql::ast::Column) {
        if !self.sort_columns.contains(&column) {
            self.sort_columns.push(column);
        }
    }

    pub fn sort_columns(&self) -> &[sql::ast::Column] {
        &self.sort_columns
    }

    /// Assemble the SELECT and repair the column references made stale by pushing
    /// tables down into derived tables.
    pub fn into_select(
        mut self,
        from: sql::ast::TableSource,
        from_selectors: Vec<sql::ast::Selector>,
        where_: Option<sql::ast::Where>,
        order_by: Option<sql::ast::OrderBy>,
        limit: Option<sql::ast::Limit>,
    ) -> Result<sql::ast::Select, Error> {
        let mut selectors = vec![sql::ast::TableSelectors {
            accessor: sql::ast::TableAccessor::From(from),
            selectors: from_selectors,
        }];
        for join in self.joins {
            let join_selectors = join
                .source
                .alias()
                .and_then(|alias| self.selectors.remove(&alias))
                .unwrap_or_default();
            selectors.push(sql::ast::TableSelectors {
                accessor: sql::ast::TableAccessor::Join(join),
                selectors: join_selectors,
            });
        }

        let select = sql::ast::Select {
            selectors,
            where_,
            order_by,
            limit,
            alias: None,
        };

        Ok(sql::rewrite::repair_stale_columns(select, &self.remap)?)
    }
}
