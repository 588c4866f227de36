use pg_escape::quote_identifier;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::schema::TableName;
use crate::types::{OrderValue, UnsupportedOrderTypeError};

/// Binds an [`OrderValue`] with the Postgres type matching its variant.
pub fn bind_order_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &OrderValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        OrderValue::Int(value) => query.bind(*value),
        OrderValue::Date(value) => query.bind(*value),
        OrderValue::Timestamp(value) => query.bind(*value),
        OrderValue::TimestampTz(value) => query.bind(*value),
        OrderValue::Text(value) => query.bind(value.clone()),
    }
}

/// Decodes the first column of `row` into an [`OrderValue`], `None` for `NULL`.
fn decode_order_value(row: &PgRow) -> sqlx::Result<Option<OrderValue>> {
    let raw = row.try_get_raw(0)?;
    if raw.is_null() {
        return Ok(None);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => OrderValue::Int(row.try_get::<i16, _>(0)?.into()),
        "INT4" => OrderValue::Int(row.try_get::<i32, _>(0)?.into()),
        "INT8" => OrderValue::Int(row.try_get(0)?),
        "DATE" => OrderValue::Date(row.try_get(0)?),
        "TIMESTAMP" => OrderValue::Timestamp(row.try_get(0)?),
        "TIMESTAMPTZ" => OrderValue::TimestampTz(row.try_get(0)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => OrderValue::Text(row.try_get(0)?),
        _ => {
            return Err(sqlx::Error::Decode(Box::new(UnsupportedOrderTypeError(
                type_name,
            ))));
        }
    };

    Ok(Some(value))
}

/// Counts all rows of `table`.
pub async fn count_rows(pool: &PgPool, table: &TableName) -> sqlx::Result<u64> {
    let sql = format!("select count(*) from {}", table.as_quoted_identifier());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;

    Ok(count as u64)
}

/// Counts the rows of `table` whose `column` is strictly below `value`.
pub async fn count_rows_below(
    pool: &PgPool,
    table: &TableName,
    column: &str,
    value: &OrderValue,
) -> sqlx::Result<u64> {
    let sql = format!(
        "select count(*) from {} where {} < $1",
        table.as_quoted_identifier(),
        quote_identifier(column)
    );
    let row = bind_order_value(sqlx::query(&sql), value)
        .fetch_one(pool)
        .await?;
    let count: i64 = row.try_get(0)?;

    Ok(count as u64)
}

/// Returns the value of `column` at the 1-based `offset` in ascending order.
///
/// Returns `None` when the table holds fewer than `offset` non-null values.
pub async fn order_value_at_offset(
    pool: &PgPool,
    table: &TableName,
    column: &str,
    offset: u64,
) -> sqlx::Result<Option<OrderValue>> {
    let column = quote_identifier(column);
    let sql = format!(
        r#"
        select {column}
        from {}
        where {column} is not null
        order by {column} asc
        offset $1 limit 1
        "#,
        table.as_quoted_identifier()
    );
    let skip = offset.saturating_sub(1) as i64;

    match sqlx::query(&sql).bind(skip).fetch_optional(pool).await? {
        Some(row) => decode_order_value(&row),
        None => Ok(None),
    }
}

/// Returns the smallest value of `column`, `None` when the table is empty.
pub async fn min_order_value(
    pool: &PgPool,
    table: &TableName,
    column: &str,
) -> sqlx::Result<Option<OrderValue>> {
    let sql = format!(
        "select min({}) from {}",
        quote_identifier(column),
        table.as_quoted_identifier()
    );
    let row = sqlx::query(&sql).fetch_one(pool).await?;

    decode_order_value(&row)
}

/// Deletes the rows of `table` whose `column` is strictly below `value`.
pub async fn delete_rows_below(
    pool: &PgPool,
    table: &TableName,
    column: &str,
    value: &OrderValue,
) -> sqlx::Result<u64> {
    let sql = format!(
        "delete from {} where {} < $1",
        table.as_quoted_identifier(),
        quote_identifier(column)
    );
    let result = bind_order_value(sqlx::query(&sql), value)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes every row of `table`.
pub async fn delete_all_rows(pool: &PgPool, table: &TableName) -> sqlx::Result<u64> {
    let sql = format!("delete from {}", table.as_quoted_identifier());
    let result = sqlx::query(&sql).execute(pool).await?;

    Ok(result.rows_affected())
}

/// Drops `table` if it exists.
pub async fn drop_table(pool: &PgPool, table: &TableName) -> sqlx::Result<()> {
    let sql = format!("drop table if exists {}", table.as_quoted_identifier());
    debug!(%table, "dropping table");
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

/// Lists the column names of `table` in ordinal order.
pub async fn get_column_names(pool: &PgPool, table: &TableName) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        select column_name::text
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.name)
    .fetch_all(pool)
    .await
}

/// Lists the primary key columns of `table` in key order.
///
/// Returns an empty list when the table has no primary key.
pub async fn get_primary_key_columns(
    pool: &PgPool,
    table: &TableName,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        select a.attname::text
        from pg_index i
        join pg_attribute a on a.attrelid = i.indrelid and a.attnum = any(i.indkey)
        where i.indrelid = $1::regclass and i.indisprimary
        order by array_position(i.indkey::int2[], a.attnum)
        "#,
    )
    .bind(table.as_quoted_identifier())
    .fetch_all(pool)
    .await
}

/// Executes `sql`, binding `value` as `$1` when present.
///
/// Returns the number of affected rows.
pub async fn execute_with_order_value(
    pool: &PgPool,
    sql: &str,
    value: Option<&OrderValue>,
) -> sqlx::Result<u64> {
    let query = sqlx::query(sql);
    let query = match value {
        Some(value) => bind_order_value(query, value),
        None => query,
    };

    Ok(query.execute(pool).await?.rows_affected())
}

/// Executes an administrative statement without parameters.
pub async fn execute_statement(pool: &PgPool, sql: &str) -> sqlx::Result<u64> {
    debug!(%sql, "executing statement");

    Ok(sqlx::query(sql).execute(pool).await?.rows_affected())
}
