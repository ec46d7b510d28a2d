//! `ColumnSampler`: draws a bounded sample of values from one column and
//! computes its Shannon entropy.

use crate::connection::ScopedConnection;
use crate::error::{DbError, Result};
use crate::types::DbKind;
use pii_protocol::{ColumnDescriptor, SampleData, SamplingMethod};
use sqlx::Row;
use tracing::debug;

pub struct ColumnSampler;

impl ColumnSampler {
    pub fn new() -> Self {
        Self
    }

    /// Sample `sample_size` values from `column`, using `method`. Always
    /// succeeds with a `SampleData`; a query failure is recorded in
    /// `SampleData::error` rather than propagated, so one bad column never
    /// aborts the whole `SAMPLING` phase.
    pub async fn sample(
        &self,
        conn: &ScopedConnection,
        column: &ColumnDescriptor,
        sample_size: u32,
        method: SamplingMethod,
        entropy_enabled: bool,
    ) -> SampleData {
        match self.sample_inner(conn, column, sample_size, method).await {
            Ok(mut data) => {
                if entropy_enabled {
                    data.entropy = Some(shannon_entropy(&data));
                }
                data
            }
            Err(e) => {
                debug!(column = %column.column_ref, error = %e, "column sampling failed");
                SampleData::failed(column.column_ref.clone(), e.to_string())
            }
        }
    }

    async fn sample_inner(
        &self,
        conn: &ScopedConnection,
        column: &ColumnDescriptor,
        sample_size: u32,
        method: SamplingMethod,
    ) -> Result<SampleData> {
        let qualified_table = quote_table(conn.kind, &column.column_ref.schema, &column.column_ref.table);
        let qualified_column = quote_ident(conn.kind, &column.column_ref.column);

        let total_row_count = count_rows(conn, &qualified_table).await?;
        let null_count = count_nulls(conn, &qualified_table, &qualified_column).await?;

        let query = match method {
            SamplingMethod::FirstN => format!(
                "SELECT {col} FROM {tbl} LIMIT {n}",
                col = qualified_column,
                tbl = qualified_table,
                n = sample_size
            ),
            SamplingMethod::Random => random_sample_query(conn.kind, &qualified_table, &qualified_column, sample_size),
            SamplingMethod::Stratified => stratified_sample_query(conn.kind, &qualified_table, &qualified_column, sample_size),
        };

        let rows = sqlx::query(&query).fetch_all(&conn.pool).await.map_err(DbError::Sqlx)?;

        let samples = rows
            .into_iter()
            .map(|r| r.try_get::<Option<String>, _>(0).unwrap_or(None))
            .collect();

        Ok(SampleData {
            column_ref: column.column_ref.clone(),
            samples,
            total_row_count,
            null_count,
            entropy: None,
            error: None,
        })
    }
}

impl Default for ColumnSampler {
    fn default() -> Self {
        Self::new()
    }
}

async fn count_rows(conn: &ScopedConnection, qualified_table: &str) -> Result<u64> {
    let row = sqlx::query(&format!("SELECT COUNT(*) FROM {}", qualified_table))
        .fetch_one(&conn.pool)
        .await
        .map_err(DbError::Sqlx)?;
    count_from_row(&row)
}

async fn count_nulls(conn: &ScopedConnection, qualified_table: &str, qualified_column: &str) -> Result<u64> {
    let row = sqlx::query(&format!(
        "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
        qualified_table, qualified_column
    ))
    .fetch_one(&conn.pool)
    .await
    .map_err(DbError::Sqlx)?;
    count_from_row(&row)
}

fn count_from_row(row: &sqlx::any::AnyRow) -> Result<u64> {
    // COUNT(*) comes back as i64 on Postgres/MySQL and i32 on some SQLite
    // builds; try the wide type first and fall back.
    if let Ok(n) = row.try_get::<i64, _>(0) {
        return Ok(n as u64);
    }
    row.try_get::<i32, _>(0).map(|n| n as u64).map_err(DbError::Sqlx)
}

/// Random sampling via each dialect's native "order by random" idiom. This
/// is a full-table-scan approach, acceptable at the sample sizes
/// `SamplingConfig::sample_size` is meant for; a reservoir-sampling
/// alternative isn't needed until sample sizes grow far past what a PII
/// scan's default config would ever request.
fn random_sample_query(kind: DbKind, table: &str, column: &str, n: u32) -> String {
    match kind {
        DbKind::Postgres => format!("SELECT {col} FROM {tbl} ORDER BY RANDOM() LIMIT {n}", col = column, tbl = table, n = n),
        DbKind::MySql => format!("SELECT {col} FROM {tbl} ORDER BY RAND() LIMIT {n}", col = column, tbl = table, n = n),
        DbKind::Sqlite => format!("SELECT {col} FROM {tbl} ORDER BY RANDOM() LIMIT {n}", col = column, tbl = table, n = n),
    }
}

/// Stratified sampling buckets rows by `NTILE` over the column's own value
/// ordering and pulls an even share from each bucket, so rare values at
/// either end of the distribution aren't starved the way plain random
/// sampling can starve them on skewed columns.
fn stratified_sample_query(kind: DbKind, table: &str, column: &str, n: u32) -> String {
    let buckets = n.max(1).min(20);
    let per_bucket = (n / buckets).max(1);

    match kind {
        DbKind::Sqlite => {
            // SQLite has no window functions pre-3.25 in some embedded builds;
            // fall back to plain random sampling for stratification.
            random_sample_query(kind, table, column, n)
        }
        _ => format!(
            "SELECT {col} FROM ( \
                SELECT {col}, NTILE({buckets}) OVER (ORDER BY {col}) AS bucket, \
                       ROW_NUMBER() OVER (PARTITION BY NTILE({buckets}) OVER (ORDER BY {col}) ORDER BY {col}) AS rn \
                FROM {tbl} \
             ) strata WHERE rn <= {per_bucket}",
            col = column,
            buckets = buckets,
            tbl = table,
            per_bucket = per_bucket,
        ),
    }
}

fn quote_ident(kind: DbKind, ident: &str) -> String {
    match kind {
        DbKind::MySql => format!("`{}`", ident.replace('`', "``")),
        DbKind::Postgres | DbKind::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

fn quote_table(kind: DbKind, schema: &str, table: &str) -> String {
    match kind {
        DbKind::Sqlite => quote_ident(kind, table),
        _ => format!("{}.{}", quote_ident(kind, schema), quote_ident(kind, table)),
    }
}

/// Shannon entropy in bits over the column's non-null sampled values.
/// `0.0` when there are fewer than two distinct non-null values, matching
/// the "no information content" edge case rather than `NaN`.
fn shannon_entropy(data: &SampleData) -> f64 {
    let dist = data.value_distribution();
    if dist.len() < 2 {
        return 0.0;
    }

    let total: u64 = dist.values().sum();
    if total == 0 {
        return 0.0;
    }

    dist.values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pii_protocol::ColumnRef;

    fn sample(values: &[Option<&str>]) -> SampleData {
        SampleData {
            column_ref: ColumnRef::new("public", "users", "col"),
            samples: values.iter().map(|v| v.map(String::from)).collect(),
            total_row_count: values.len() as u64,
            null_count: values.iter().filter(|v| v.is_none()).count() as u64,
            entropy: None,
            error: None,
        }
    }

    #[test]
    fn entropy_is_zero_for_constant_column() {
        let data = sample(&[Some("a"), Some("a"), Some("a")]);
        assert_eq!(shannon_entropy(&data), 0.0);
    }

    #[test]
    fn entropy_is_zero_when_all_null() {
        let data = sample(&[None, None]);
        assert_eq!(shannon_entropy(&data), 0.0);
    }

    #[test]
    fn entropy_is_positive_for_varied_column() {
        let data = sample(&[Some("a"), Some("b"), Some("c"), Some("a")]);
        assert!(shannon_entropy(&data) > 0.0);
    }

    #[test]
    fn entropy_is_maximal_for_uniform_distribution() {
        let uniform = sample(&[Some("a"), Some("b"), Some("c"), Some("d")]);
        let skewed = sample(&[Some("a"), Some("a"), Some("a"), Some("b")]);
        assert!(shannon_entropy(&uniform) > shannon_entropy(&skewed));
    }

    #[test]
    fn quote_ident_uses_backticks_for_mysql() {
        assert_eq!(quote_ident(DbKind::MySql, "order"), "`order`");
        assert_eq!(quote_ident(DbKind::Postgres, "order"), "\"order\"");
    }
}
