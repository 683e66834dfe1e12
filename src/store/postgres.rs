//! PostgreSQL [`Store`] backed by a `sqlx` pool.
//!
//! Rows travel as `jsonb`: inserts go through `jsonb_populate_record` and
//! reads come back through `to_jsonb`, so one set of statements serves every
//! table. Table and column names only ever come from [`Table`] and
//! [`Relation`], never from request input.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};

use super::{Filter, Page, Reader, Relation, Row, Store, StoreError, Table, Transaction};

/// `accountId` -> `account_id`
pub fn column_name(field: &str) -> String {
    let mut column = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            column.push('_');
            column.push(ch.to_ascii_lowercase());
        } else {
            column.push(ch);
        }
    }
    column
}

/// `account_id` -> `accountId`
pub fn field_name(column: &str) -> String {
    let mut field = String::with_capacity(column.len());
    let mut upper = false;
    for ch in column.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            field.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            field.push(ch);
        }
    }
    field
}

fn to_columns(table: Table, row: Row) -> Result<Value, StoreError> {
    let mut columns = serde_json::Map::with_capacity(row.len());
    for (field, value) in row {
        if !table.has_column(&field) {
            return Err(StoreError::UnknownColumn {
                table: table.name(),
                column: field,
            });
        }
        columns.insert(column_name(&field), value);
    }
    Ok(Value::Object(columns))
}

fn to_row(value: Value) -> Result<Row, StoreError> {
    match value {
        Value::Object(columns) => Ok(columns
            .into_iter()
            .map(|(column, value)| (field_name(&column), value))
            .collect()),
        other => Err(StoreError::Mapping(serde::de::Error::custom(format!(
            "expected a row object, got {other}"
        )))),
    }
}

fn map_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message().to_string();
        match db_err.code().as_deref() {
            Some("23503") => return StoreError::ForeignKey(message),
            Some("23505") => return StoreError::UniqueViolation(message),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
    builder.push(" WHERE TRUE");
    for filter in filters {
        if !table.has_column(filter.column) {
            return Err(StoreError::UnknownColumn {
                table: table.name(),
                column: filter.column.to_string(),
            });
        }
        if filter.value.is_null() {
            builder.push(format!(" AND t.{} IS NULL", column_name(filter.column)));
        } else {
            builder.push(format!(" AND to_jsonb(t.{}) = ", column_name(filter.column)));
            builder.push_bind(filter.value.clone());
        }
    }
    Ok(())
}

fn select_query(table: Table, filters: &[Filter], page: Option<Page>) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut builder = QueryBuilder::new(format!("SELECT to_jsonb(t.*) FROM {} t", table.name()));
    push_filters(&mut builder, table, filters)?;
    builder.push(format!(" ORDER BY t.{}, t.id", column_name(table.order_column())));
    if let Some(page) = page {
        builder.push(" LIMIT ");
        builder.push_bind(page.take.min(i64::MAX as u64) as i64);
        builder.push(" OFFSET ");
        builder.push_bind(page.skip.min(i64::MAX as u64) as i64);
    }
    Ok(builder)
}

async fn fetch_row<'e, E>(executor: E, table: Table, id: &str) -> Result<Option<Row>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("SELECT to_jsonb(t.*) FROM {} t WHERE t.id = $1", table.name());
    let value = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_error)?;

    value.map(to_row).transpose()
}

async fn fetch_rows<'e, E>(executor: E, table: Table, filters: &[Filter], page: Option<Page>) -> Result<Vec<Row>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = select_query(table, filters, page)?;
    let values = builder
        .build_query_scalar::<Value>()
        .fetch_all(executor)
        .await
        .map_err(map_error)?;

    values.into_iter().map(to_row).collect()
}

async fn linked_ids<'e, E>(executor: E, relation: Relation, parent_id: &str) -> Result<Vec<String>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT child_id FROM {} WHERE parent_id = $1 ORDER BY seq",
        relation.name()
    );
    sqlx::query_scalar::<_, String>(&sql)
        .bind(parent_id)
        .fetch_all(executor)
        .await
        .map_err(map_error)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Reader for PgStore {
    async fn fetch(&self, table: Table, id: &str) -> Result<Option<Row>, StoreError> {
        fetch_row(&self.pool, table, id).await
    }

    async fn fetch_all(&self, table: Table, filters: &[Filter], page: Page) -> Result<Vec<Row>, StoreError> {
        fetch_rows(&self.pool, table, filters, Some(page)).await
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} t", table.name()));
        push_filters(&mut builder, table, filters)?;
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_error)?;

        Ok(count.max(0) as u64)
    }

    async fn linked(&self, relation: Relation, parent_id: &str) -> Result<Vec<String>, StoreError> {
        linked_ids(&self.pool, relation, parent_id).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Wraps a `sqlx` transaction, which rolls back when dropped.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn insert(&mut self, table: Table, row: Row) -> Result<Row, StoreError> {
        let sql = format!(
            "INSERT INTO {name} SELECT * FROM jsonb_populate_record(NULL::{name}, $1) t RETURNING to_jsonb({name}.*)",
            name = table.name()
        );
        let value = sqlx::query_scalar::<_, Value>(&sql)
            .bind(to_columns(table, row)?)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_error)?;

        to_row(value)
    }

    async fn update(&mut self, table: Table, id: &str, changes: Row) -> Result<Option<Row>, StoreError> {
        self.update_where(table, id, &[], changes).await
    }

    async fn update_where(
        &mut self,
        table: Table,
        id: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Option<Row>, StoreError> {
        let columns: Vec<String> = changes
            .keys()
            .filter(|field| field.as_str() != "id")
            .map(|field| column_name(field))
            .collect();
        let changes = to_columns(table, changes)?;

        if columns.is_empty() {
            let mut filters = filters.to_vec();
            filters.push(Filter::equals("id", id));
            let rows = fetch_rows(&mut *self.tx, table, &filters, None).await?;
            return Ok(rows.into_iter().next());
        }

        // Under READ COMMITTED a blocked writer re-checks the filters once the
        // row lock is released, so a row claimed meanwhile is skipped.
        let list = columns.join(", ");
        let mut builder = QueryBuilder::new(format!(
            "UPDATE {name} AS t SET ({list}) = (SELECT {list} FROM jsonb_populate_record(NULL::{name}, ",
            name = table.name(),
        ));
        builder.push_bind(changes);
        builder.push("))");
        push_filters(&mut builder, table, filters)?;
        builder.push(" AND t.id = ");
        builder.push_bind(id.to_string());
        builder.push(" RETURNING to_jsonb(t.*)");

        let value = builder
            .build_query_scalar::<Value>()
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_error)?;

        value.map(to_row).transpose()
    }

    async fn delete(&mut self, table: Table, id: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table.name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_where(&mut self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::new(format!("DELETE FROM {} t", table.name()));
        push_filters(&mut builder, table, filters)?;
        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(map_error)?;

        Ok(result.rows_affected())
    }

    async fn fetch(&mut self, table: Table, id: &str) -> Result<Option<Row>, StoreError> {
        fetch_row(&mut *self.tx, table, id).await
    }

    async fn fetch_all(&mut self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        fetch_rows(&mut *self.tx, table, filters, None).await
    }

    async fn link(&mut self, relation: Relation, parent_id: &str, child_ids: &[String]) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (parent_id, child_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            relation.name()
        );
        for child_id in child_ids {
            sqlx::query(&sql)
                .bind(parent_id)
                .bind(child_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_error)?;
        }
        Ok(())
    }

    async fn unlink_all(&mut self, relation: Relation, parent_id: &str) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE parent_id = $1", relation.name());
        let result = sqlx::query(&sql)
            .bind(parent_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_error)?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_name_mapping() {
        assert_eq!(column_name("accountId"), "account_id");
        assert_eq!(column_name("concentrationUnit"), "concentration_unit");
        assert_eq!(column_name("name"), "name");
        assert_eq!(field_name("account_id"), "accountId");
        assert_eq!(field_name("created_at"), "createdAt");
    }

    #[test]
    fn test_every_column_round_trips() {
        for table in Table::ALL {
            for field in table.columns() {
                assert_eq!(field_name(&column_name(field)), *field);
            }
        }
    }

    #[test]
    fn test_to_columns_rejects_unknown_fields() {
        let mut row = Row::new();
        row.insert("mealType".to_string(), json!("LUNCH"));
        assert!(to_columns(Table::Meals, row.clone()).is_ok());
        assert!(to_columns(Table::Foods, row).is_err());
    }
}
