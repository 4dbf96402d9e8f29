//! Run rendered statements against PostgreSQL using sqlx.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use sqlx::{Column, Postgres, Row as _, TypeInfo};

use query_engine_sql::sql;
use query_engine_sql::sql::ast::ParameterValue;

use crate::error::{Error, QueryError};
use crate::store::{Row, Store, Transaction};

/// Rewrite the named `@pN` parameters of a statement into the positional `$N`
/// placeholders PostgreSQL expects, numbered in the order of `sql.params`.
/// A parameter sent as text for a typed column is cast on the spot, as in `$1::timestamptz`.
/// Text inside string literals and quoted identifiers is left alone.
pub fn to_positional(sql: &sql::string::SQL) -> Result<String, Error> {
    let mut output = String::with_capacity(sql.sql.len());
    let mut chars = sql.sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(open) => {
                if c == open {
                    quote = None;
                }
                output.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                output.push(c);
            }
            None if c == '@' && chars.peek() == Some(&'p') => {
                chars.next();
                let mut name = String::from("@p");
                while let Some(digit) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    name.push(*digit);
                    chars.next();
                }
                let position = sql
                    .params
                    .get_index_of(&name)
                    .ok_or_else(|| Error::Query(QueryError::UnboundParameter(name.clone())))?;
                output.push('$');
                output.push_str(&(position + 1).to_string());
                if let Some((_, ParameterValue::Cast(_, cast_type))) = sql.params.get_index(position) {
                    output.push_str("::");
                    output.push_str(cast_type.type_name());
                }
            }
            None => output.push(c),
        }
    }

    Ok(output)
}

/// Attach the parameter values, in positional order.
fn bind_parameters<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &IndexMap<String, ParameterValue>,
) -> Query<'q, Postgres, PgArguments> {
    for value in params.values() {
        query = match value {
            // compiled statements render nulls as NULL literals or IS NULL tests
            ParameterValue::Null => query.bind(None::<String>),
            ParameterValue::Bool(b) => query.bind(*b),
            ParameterValue::Int(i) => query.bind(*i),
            ParameterValue::Float(f) => query.bind(*f),
            ParameterValue::String(s) | ParameterValue::Cast(s, _) => query.bind(s.clone()),
        };
    }
    query
}

fn decode_with<'r, T, F>(row: &'r PgRow, index: usize, convert: F) -> Result<serde_json::Value, Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> serde_json::Value,
{
    let value: Option<T> = row.try_get(index)?;
    Ok(value.map_or(serde_json::Value::Null, convert))
}

/// Read one column of a row as JSON, based on the database type of the column.
fn decode_column(row: &PgRow, index: usize) -> Result<serde_json::Value, Error> {
    let column = &row.columns()[index];
    match column.type_info().name() {
        "INT2" => decode_with::<i16, _>(row, index, Into::into),
        "INT4" => decode_with::<i32, _>(row, index, Into::into),
        "INT8" => decode_with::<i64, _>(row, index, Into::into),
        "FLOAT4" => decode_with::<f32, _>(row, index, Into::into),
        "FLOAT8" => decode_with::<f64, _>(row, index, Into::into),
        "BOOL" => decode_with::<bool, _>(row, index, Into::into),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => decode_with::<String, _>(row, index, Into::into),
        "UUID" => decode_with::<sqlx::types::Uuid, _>(row, index, |uuid| uuid.to_string().into()),
        "DATE" => decode_with::<Date, _>(row, index, |date| date.to_string().into()),
        "TIMESTAMP" => decode_with::<PrimitiveDateTime, _>(row, index, |timestamp| {
            iso_timestamp(timestamp).into()
        }),
        "TIMESTAMPTZ" => decode_with::<OffsetDateTime, _>(row, index, |timestamp| {
            let utc = timestamp.to_offset(UtcOffset::UTC);
            format!("{}Z", iso_timestamp(PrimitiveDateTime::new(utc.date(), utc.time()))).into()
        }),
        "JSON" | "JSONB" => decode_with::<serde_json::Value, _>(row, index, |json| json),
        type_name => Err(Error::Query(QueryError::UnsupportedColumnType {
            column: column.name().to_string(),
            type_name: type_name.to_string(),
        })),
    }
}

// yyyy-mm-ddThh:mm:ss.ffffff
fn iso_timestamp(timestamp: PrimitiveDateTime) -> String {
    format!(
        "{}T{:02}:{:02}:{:02}.{:06}",
        timestamp.date(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second(),
        timestamp.microsecond()
    )
}

fn decode_row(row: &PgRow) -> Result<Row, Error> {
    (0..row.columns().len())
        .map(|index| decode_column(row, index))
        .collect()
}

fn decode_id(row: &PgRow) -> Result<ParameterValue, Error> {
    match decode_column(row, 0)? {
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(id) => Ok(ParameterValue::Int(id)),
            None => Ok(ParameterValue::String(number.to_string())),
        },
        serde_json::Value::String(id) => Ok(ParameterValue::String(id)),
        serde_json::Value::Null => Err(Error::Query(QueryError::MissingReturnedId)),
        other => Ok(ParameterValue::String(other.to_string())),
    }
}

/// A PostgreSQL database reached through a connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: sqlx::PgPool,
}

impl PostgresStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        PostgresStore { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn fetch_rows(&self, sql: &sql::string::SQL) -> Result<Vec<Row>, Error> {
        let text = to_positional(sql)?;
        let rows = bind_parameters(sqlx::query(&text), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_count(&self, sql: &sql::string::SQL) -> Result<u64, Error> {
        let text = to_positional(sql)?;
        let rows = bind_parameters(sqlx::query(&text), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        match rows.as_slice() {
            [row] => {
                let count: i64 = row.try_get(0)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            _ => Err(Error::Query(QueryError::UnexpectedCountResult(rows.len()))),
        }
    }

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        let transaction = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { transaction }))
    }
}

/// A transaction on a pooled PostgreSQL connection.
pub struct PostgresTransaction {
    transaction: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&mut self, sql: &sql::string::SQL) -> Result<u64, Error> {
        let text = to_positional(sql)?;
        let result = bind_parameters(sqlx::query(&text), &sql.params)
            .execute(&mut *self.transaction)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_id(&mut self, sql: &sql::string::SQL) -> Result<ParameterValue, Error> {
        let text = to_positional(sql)?;
        let row = bind_parameters(sqlx::query(&text), &sql.params)
            .fetch_optional(&mut *self.transaction)
            .await?;
        match row {
            Some(row) => decode_id(&row),
            None => Err(Error::Query(QueryError::MissingReturnedId)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let PostgresTransaction { transaction } = *self;
        Ok(transaction.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        let PostgresTransaction { transaction } = *self;
        Ok(transaction.rollback().await?)
    }
}
