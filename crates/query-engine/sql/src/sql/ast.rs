//! Type definitions of a SQL AST representation.
//!
//! Nodes own their children. A node needed in two places is cloned, and
//! transformations build new trees instead of mutating existing ones.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A statement we can render and execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

/// A SELECT clause.
///
/// The selectors are grouped per table source: the first group belongs to the
/// FROM source, every following group belongs to a join.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub selectors: Vec<TableSelectors>,
    pub where_: Option<Where>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
    /// Set when this select is used as a table source.
    pub alias: Option<TableAlias>,
}

/// A table source together with the selectors it contributes to the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSelectors {
    pub accessor: TableAccessor,
    pub selectors: Vec<Selector>,
}

/// How a table source is brought into a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum TableAccessor {
    From(TableSource),
    Join(Join),
}

/// Something rows can be selected from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// A base table.
    Table(Table),
    /// A derived table. Only its declared selectors are visible from outside.
    Select(Box<Select>),
}

/// A base table that stores a resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub resource_type: String,
    pub name: TableName,
    pub alias: TableAlias,
    /// The identifier column comes first, the rest in alphabetical order.
    pub scalar_columns: Vec<ColumnName>,
    pub foreign_key_columns: Vec<ColumnName>,
}

/// The kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause equating a column of the table being joined into with a column
/// of the joined table source.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub source: TableSource,
    pub outer_column: Column,
    pub inner_column: Column,
}

/// A WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where(pub Filter);

/// A boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison {
        left: Operand,
        operator: ComparisonOperator,
        right: Operand,
    },
    Logical {
        operator: LogicalOperator,
        terms: Vec<Filter>,
    },
    Not(Box<Filter>),
    Like {
        column: Column,
        text: String,
        match_kind: TextMatchKind,
    },
    In {
        column: Column,
        values: Vec<Parameter>,
    },
    Exists(Box<Select>),
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(Column),
    Parameter(Parameter),
    Null,
    /// A correlated scalar sub-select returning `COUNT(*)`.
    Count(Box<Select>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Where the text must occur in a column value for `LIKE` to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMatchKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// An entry in the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Column(ColumnSelector),
    /// The constant `1`, used to test for existence.
    One,
    CountStar,
    RowNumber(RowNumber),
}

/// A column in a select list, optionally renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelector {
    pub column: Column,
    pub alias: Option<ColumnName>,
}

/// A windowed ordinal: `ROW_NUMBER() OVER (ORDER BY ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowNumber {
    pub order_by: OrderBy,
    pub alias: ColumnName,
}

/// A reference to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// A column of a base table.
    InTable(ColumnInTable),
    /// A column exposed by a selector of a derived table.
    InSelect(ColumnInSelect),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInTable {
    pub name: ColumnName,
    pub r#type: ColumnType,
    pub table_alias: Option<TableAlias>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInSelect {
    pub selector: Box<ColumnSelector>,
    pub table_alias: Option<TableAlias>,
}

/// Whether a column stores a value of the resource itself or a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Scalar,
    ForeignKey,
}

/// An ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub terms: Vec<OrderByTerm>,
}

/// A single element in an ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByTerm {
    pub target: OrderByTarget,
    pub direction: OrderByDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderByTarget {
    Column(Column),
    /// A correlated sub-select returning `COUNT(*)`.
    Count(Box<Select>),
}

/// A direction for a single ORDER BY element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByDirection {
    Asc,
    Desc,
}

/// LIMIT and OFFSET clauses. The offset is omitted when it is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub limit: Parameter,
    pub offset: Option<Parameter>,
}

/// An INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableName,
    pub assignments: Vec<ColumnAssignment>,
    pub returning: ColumnName,
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TableName,
    pub assignments: Vec<ColumnAssignment>,
    pub where_: Where,
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TableName,
    pub where_: Where,
}

/// `column = value` inside INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAssignment {
    pub column: ColumnName,
    pub value: Operand,
}

/// A bound parameter. The name is used verbatim in the rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: ParameterName,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterName(pub String);

/// The typed value of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Text the database converts to the given type when it binds it.
    Cast(String, CastType),
}

/// Column types whose values are sent as text and cast on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastType {
    Date,
    Timestamp,
    TimestampWithTimeZone,
    Uuid,
}

impl CastType {
    /// The PostgreSQL name of the type.
    pub fn type_name(self) -> &'static str {
        match self {
            CastType::Date => "date",
            CastType::Timestamp => "timestamp",
            CastType::TimestampWithTimeZone => "timestamptz",
            CastType::Uuid => "uuid",
        }
    }
}

/// A database table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(pub String);

/// A database table's column name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName(pub String);

/// aliases that we give to relations, rendered as `t<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableAlias {
    pub unique_index: u32,
}

impl fmt::Display for TableAlias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.unique_index)
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterValue::Null => write!(f, "null"),
            ParameterValue::Bool(b) => write!(f, "{b}"),
            ParameterValue::Int(i) => write!(f, "{i}"),
            ParameterValue::Float(x) => write!(f, "{x}"),
            ParameterValue::String(s) => write!(f, "'{s}'"),
            ParameterValue::Cast(s, cast) => write!(f, "'{s}'::{}", cast.type_name()),
        }
    }
}

// Structural accessors //

impl Table {
    /// The identifier column, which is always the first scalar column.
    pub fn id_column(&self) -> Column {
        self.make_column(&self.scalar_columns[0], ColumnType::Scalar)
    }

    pub fn scalar_columns(&self) -> Vec<Column> {
        self.scalar_columns
            .iter()
            .map(|name| self.make_column(name, ColumnType::Scalar))
            .collect()
    }

    pub fn foreign_key_columns(&self) -> Vec<Column> {
        self.foreign_key_columns
            .iter()
            .map(|name| self.make_column(name, ColumnType::ForeignKey))
            .collect()
    }

    pub fn find_column(&self, name: &ColumnName) -> Option<Column> {
        if self.scalar_columns.contains(name) {
            Some(self.make_column(name, ColumnType::Scalar))
        } else if self.foreign_key_columns.contains(name) {
            Some(self.make_column(name, ColumnType::ForeignKey))
        } else {
            None
        }
    }

    /// Like `find_column`, but a missing column is an error.
    pub fn get_column(&self, name: &ColumnName) -> Result<Column, super::error::Error> {
        self.find_column(name)
            .ok_or_else(|| super::error::Error::ColumnNotFound {
                column: name.clone(),
                table: Some(self.alias),
            })
    }

    fn make_column(&self, name: &ColumnName, r#type: ColumnType) -> Column {
        Column::InTable(ColumnInTable {
            name: name.clone(),
            r#type,
            table_alias: Some(self.alias),
        })
    }
}

impl TableSource {
    pub fn alias(&self) -> Option<TableAlias> {
        match self {
            TableSource::Table(table) => Some(table.alias),
            TableSource::Select(select) => select.alias,
        }
    }

    /// Find a column by its name. For a derived table the column is looked up among
    /// the selectors; `inner_table_alias` selects the table inside the derived table
    /// the column originally came from.
    pub fn find_column(
        &self,
        name: &ColumnName,
        inner_table_alias: Option<TableAlias>,
    ) -> Option<Column> {
        match self {
            TableSource::Table(table) => match inner_table_alias {
                Some(alias) if alias != table.alias => None,
                _ => table.find_column(name),
            },
            TableSource::Select(select) => select.find_column(name, inner_table_alias),
        }
    }

    /// Like `find_column`, but a missing column is an error.
    pub fn get_column(
        &self,
        name: &ColumnName,
        inner_table_alias: Option<TableAlias>,
    ) -> Result<Column, super::error::Error> {
        self.find_column(name, inner_table_alias)
            .ok_or_else(|| super::error::Error::ColumnNotFound {
                column: name.clone(),
                table: self.alias(),
            })
    }

    /// The identifier column. For a derived table this is the first column selected
    /// from the table with the given alias.
    pub fn id_column(
        &self,
        inner_table_alias: Option<TableAlias>,
    ) -> Result<Column, super::error::Error> {
        match self {
            TableSource::Table(table) => Ok(table.id_column()),
            TableSource::Select(select) => select
                .column_selectors()
                .find(|selector| {
                    inner_table_alias.is_none()
                        || selector.column.origin_table_alias() == inner_table_alias
                })
                .map(|selector| select.expose(selector))
                .ok_or(super::error::Error::SelectWithoutSelectors {
                    alias: select.alias,
                }),
        }
    }

    /// Is a table with this alias this source or nested inside it.
    pub fn declares(&self, alias: TableAlias) -> bool {
        match self {
            TableSource::Table(table) => table.alias == alias,
            TableSource::Select(select) => {
                select.alias == Some(alias)
                    || select
                        .selectors
                        .iter()
                        .any(|table_selectors| table_selectors.accessor.source().declares(alias))
            }
        }
    }
}

impl TableAccessor {
    pub fn source(&self) -> &TableSource {
        match self {
            TableAccessor::From(source) => source,
            TableAccessor::Join(join) => &join.source,
        }
    }
}

impl Join {
    /// Create a join, checking that the inner column belongs to the joined source
    /// and the outer column does not.
    pub fn new(
        join_type: JoinType,
        source: TableSource,
        outer_column: Column,
        inner_column: Column,
    ) -> Result<Join, super::error::Error> {
        let belongs_to_source =
            |column: &Column| column.table_alias().is_some_and(|alias| source.declares(alias));

        if !belongs_to_source(&inner_column) || belongs_to_source(&outer_column) {
            return Err(super::error::Error::InvalidJoinColumns {
                outer: outer_column.name().clone(),
                inner: inner_column.name().clone(),
                table: source.alias(),
            });
        }

        Ok(Join {
            join_type,
            source,
            outer_column,
            inner_column,
        })
    }
}

impl Select {
    /// All selectors, in select list order.
    pub fn all_selectors(&self) -> impl Iterator<Item = &Selector> {
        self.selectors
            .iter()
            .flat_map(|table_selectors| table_selectors.selectors.iter())
    }

    pub fn column_selectors(&self) -> impl Iterator<Item = &ColumnSelector> {
        self.all_selectors().filter_map(|selector| match selector {
            Selector::Column(column_selector) => Some(column_selector),
            _ => None,
        })
    }

    /// The FROM table source.
    pub fn from(&self) -> Option<&TableSource> {
        self.selectors
            .iter()
            .find_map(|table_selectors| match &table_selectors.accessor {
                TableAccessor::From(source) => Some(source),
                TableAccessor::Join(_) => None,
            })
    }

    /// Find one of our output columns that originates from `name` (of the table
    /// `inner_table_alias`, when given).
    pub fn find_column(
        &self,
        name: &ColumnName,
        inner_table_alias: Option<TableAlias>,
    ) -> Option<Column> {
        self.column_selectors()
            .find(|selector| {
                (selector.identity() == name && inner_table_alias.is_none())
                    || selector.column.refers_to(name, inner_table_alias)
            })
            .map(|selector| self.expose(selector))
    }

    /// Reference one of our selectors from outside.
    fn expose(&self, selector: &ColumnSelector) -> Column {
        Column::InSelect(ColumnInSelect {
            selector: Box::new(selector.clone()),
            table_alias: self.alias,
        })
    }
}

impl ColumnSelector {
    /// The name this selector is known by outside its select.
    pub fn identity(&self) -> &ColumnName {
        self.alias.as_ref().unwrap_or_else(|| self.column.name())
    }
}

impl Column {
    pub fn name(&self) -> &ColumnName {
        match self {
            Column::InTable(column) => &column.name,
            Column::InSelect(column) => column.selector.identity(),
        }
    }

    pub fn table_alias(&self) -> Option<TableAlias> {
        match self {
            Column::InTable(column) => column.table_alias,
            Column::InSelect(column) => column.table_alias,
        }
    }

    pub fn r#type(&self) -> ColumnType {
        match self {
            Column::InTable(column) => column.r#type,
            Column::InSelect(column) => column.selector.column.r#type(),
        }
    }

    /// The alias of the base table this column ultimately comes from.
    pub fn origin_table_alias(&self) -> Option<TableAlias> {
        match self {
            Column::InTable(column) => column.table_alias,
            Column::InSelect(column) => column.selector.column.origin_table_alias(),
        }
    }

    /// Is this column, or the column it was selected from, named `name` in the table
    /// `table_alias`.
    pub fn refers_to(&self, name: &ColumnName, table_alias: Option<TableAlias>) -> bool {
        let matches_here =
            self.name() == name && (table_alias.is_none() || self.table_alias() == table_alias);
        match self {
            Column::InTable(_) => matches_here,
            Column::InSelect(column) => {
                matches_here || column.selector.column.refers_to(name, table_alias)
            }
        }
    }
}
