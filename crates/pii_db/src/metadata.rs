//! `MetadataExtractor`: turns a live connection into a `SchemaSnapshot`.
//!
//! Introspection is dialect-specific (Postgres/MySQL read `information_schema`,
//! SQLite reads `sqlite_master` + `PRAGMA`), but the output is the single
//! dialect-neutral arena the rest of the engine works against.

use crate::connection::ScopedConnection;
use crate::error::{DbError, Result};
use crate::types::DbKind;
use pii_protocol::{ColumnDescriptor, ColumnId, ColumnRef, Relationship, SchemaSnapshot, TableDescriptor, TableId, TableKind, TypeCategory};
use sqlx::any::AnyPool;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A `(schema, table)` filter. Empty means "every table visible to the connection".
pub type TableFilter = [(String, String)];

pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build a `SchemaSnapshot` restricted to `target_tables` (empty = all
    /// tables in the connection's default catalog/schema).
    pub async fn extract(&self, conn: &ScopedConnection, target_tables: &TableFilter) -> Result<SchemaSnapshot> {
        let (catalog, schema) = match conn.kind {
            DbKind::Postgres => (current_database(&conn.pool).await?, "public".to_string()),
            DbKind::MySql => {
                let db = current_database(&conn.pool).await?;
                (db.clone(), db)
            }
            DbKind::Sqlite => ("main".to_string(), "main".to_string()),
        };

        let mut snapshot = SchemaSnapshot::new(catalog, schema);
        let table_names = self.list_tables(conn, target_tables).await?;

        let mut table_ids: HashMap<(String, String), TableId> = HashMap::new();
        let mut column_ids: HashMap<(String, String, String), ColumnId> = HashMap::new();

        for (schema_name, table_name, kind) in &table_names {
            let table_id = TableId(snapshot.tables.len() as u32);
            table_ids.insert((schema_name.clone(), table_name.clone()), table_id);
            snapshot.tables.push(TableDescriptor {
                id: table_id,
                schema: schema_name.clone(),
                name: table_name.clone(),
                kind: *kind,
                columns: Vec::new(),
                outbound: Vec::new(),
                inbound: Vec::new(),
            });
        }

        for (schema_name, table_name, _kind) in &table_names {
            let table_id = table_ids[&(schema_name.clone(), table_name.clone())];
            let columns = self.list_columns(conn, schema_name, table_name).await?;

            for col in columns {
                let column_id = ColumnId(snapshot.columns.len() as u32);
                column_ids.insert((schema_name.clone(), table_name.clone(), col.name.clone()), column_id);

                snapshot.columns.push(ColumnDescriptor {
                    id: column_id,
                    table_id,
                    column_ref: ColumnRef {
                        schema: schema_name.clone(),
                        table: table_name.clone(),
                        column: col.name,
                    },
                    type_category: col.type_category,
                    native_type: col.native_type,
                    nullable: col.nullable,
                    primary_key: col.primary_key,
                    size: col.size,
                    scale: col.scale,
                    comment: col.comment,
                    is_foreign_key: false,
                });
                snapshot.tables[table_id.0 as usize].columns.push(column_id);
            }
        }

        for (schema_name, table_name, _kind) in &table_names {
            let fks = self.list_foreign_keys(conn, schema_name, table_name).await?;
            for fk in fks {
                let from_key = (schema_name.clone(), table_name.clone(), fk.from_column.clone());
                let to_key = (fk.to_schema.clone(), fk.to_table.clone(), fk.to_column.clone());

                let (Some(&from_id), Some(&to_id)) = (column_ids.get(&from_key), column_ids.get(&to_key)) else {
                    debug!(
                        table = %table_name,
                        column = %fk.from_column,
                        "dropping foreign key referencing a column outside the scan scope"
                    );
                    continue;
                };

                let rel_idx = snapshot.relationships.len();

                snapshot.relationships.push(Relationship {
                    from_column: from_id,
                    to_column: to_id,
                    constraint_name: fk.constraint_name,
                });

                snapshot.columns[from_id.0 as usize].is_foreign_key = true;

                let from_table = snapshot.columns[from_id.0 as usize].table_id;
                let to_table = snapshot.columns[to_id.0 as usize].table_id;
                snapshot.tables[from_table.0 as usize].outbound.push(rel_idx);
                snapshot.tables[to_table.0 as usize].inbound.push(rel_idx);
            }
        }

        Ok(snapshot)
    }

    async fn list_tables(
        &self,
        conn: &ScopedConnection,
        target_tables: &TableFilter,
    ) -> Result<Vec<(String, String, TableKind)>> {
        let rows: Vec<(String, String, String)> = match conn.kind {
            DbKind::Postgres => {
                sqlx::query(
                    "SELECT table_schema, table_name, table_type FROM information_schema.tables \
                     WHERE table_schema NOT IN ('pg_catalog', 'information_schema')",
                )
                .fetch_all(&conn.pool)
                .await
                .map_err(DbError::Sqlx)?
                .iter()
                .map(|r| (r.get(0), r.get(1), r.get::<String, _>(2)))
                .collect()
            }
            DbKind::MySql => {
                sqlx::query(
                    "SELECT table_schema, table_name, table_type FROM information_schema.tables \
                     WHERE table_schema = DATABASE()",
                )
                .fetch_all(&conn.pool)
                .await
                .map_err(DbError::Sqlx)?
                .iter()
                .map(|r| (r.get(0), r.get(1), r.get::<String, _>(2)))
                .collect()
            }
            DbKind::Sqlite => sqlx::query(
                "SELECT 'main', name, type FROM sqlite_master WHERE type IN ('table', 'view') \
                 AND name NOT LIKE 'sqlite_%'",
            )
            .fetch_all(&conn.pool)
            .await
            .map_err(DbError::Sqlx)?
            .iter()
            .map(|r| (r.get(0), r.get(1), r.get::<String, _>(2)))
            .collect(),
        };

        let wanted: Vec<&(String, String)> = target_tables.iter().collect();

        Ok(rows
            .into_iter()
            .filter(|(schema, table, _)| {
                wanted.is_empty() || wanted.iter().any(|(s, t)| s == schema && t == table)
            })
            .map(|(schema, table, raw_kind)| {
                let kind = if raw_kind.eq_ignore_ascii_case("view") || raw_kind.eq_ignore_ascii_case("VIEW") {
                    TableKind::View
                } else {
                    TableKind::Table
                };
                (schema, table, kind)
            })
            .collect())
    }

    async fn list_columns(&self, conn: &ScopedConnection, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
        match conn.kind {
            DbKind::Postgres => list_columns_postgres(&conn.pool, schema, table).await,
            DbKind::MySql => list_columns_mysql(&conn.pool, schema, table).await,
            DbKind::Sqlite => list_columns_sqlite(&conn.pool, table).await,
        }
    }

    async fn list_foreign_keys(&self, conn: &ScopedConnection, schema: &str, table: &str) -> Result<Vec<RawForeignKey>> {
        match conn.kind {
            DbKind::Postgres => list_foreign_keys_postgres(&conn.pool, schema, table).await,
            DbKind::MySql => list_foreign_keys_mysql(&conn.pool, schema, table).await,
            DbKind::Sqlite => list_foreign_keys_sqlite(&conn.pool, schema, table).await,
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

struct RawColumn {
    name: String,
    native_type: String,
    type_category: TypeCategory,
    nullable: bool,
    primary_key: bool,
    size: Option<u32>,
    scale: Option<u32>,
    comment: Option<String>,
}

struct RawForeignKey {
    from_column: String,
    to_schema: String,
    to_table: String,
    to_column: String,
    constraint_name: Option<String>,
}

async fn current_database(pool: &AnyPool) -> Result<String> {
    let row = sqlx::query("SELECT current_database()")
        .fetch_one(pool)
        .await
        .map_err(DbError::Sqlx)?;
    Ok(row.get(0))
}

async fn list_columns_postgres(pool: &AnyPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query(
        "SELECT c.column_name, c.data_type, c.is_nullable, c.character_maximum_length, \
                c.numeric_scale, \
                COALESCE((SELECT true FROM information_schema.table_constraints tc \
                          JOIN information_schema.key_column_usage kcu \
                            ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                          WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = c.table_schema \
                            AND tc.table_name = c.table_name AND kcu.column_name = c.column_name), false) AS is_pk \
         FROM information_schema.columns c \
         WHERE c.table_schema = $1 AND c.table_name = $2 \
         ORDER BY c.ordinal_position",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let native_type: String = r.get(1);
            let nullable: String = r.get(2);
            RawColumn {
                name: r.get(0),
                type_category: classify_postgres_type(&native_type),
                native_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                primary_key: r.get::<bool, _>(5),
                size: r.get::<Option<i32>, _>(3).map(|n| n as u32),
                scale: r.get::<Option<i32>, _>(4).map(|n| n as u32),
                comment: None,
            }
        })
        .collect())
}

async fn list_columns_mysql(pool: &AnyPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query(
        "SELECT column_name, data_type, is_nullable, character_maximum_length, numeric_scale, \
                column_key, column_comment \
         FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? \
         ORDER BY ordinal_position",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let native_type: String = r.get(1);
            let nullable: String = r.get(2);
            let column_key: String = r.get(5);
            let comment: String = r.get(6);
            RawColumn {
                name: r.get(0),
                type_category: classify_mysql_type(&native_type),
                native_type,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                primary_key: column_key.eq_ignore_ascii_case("PRI"),
                size: r.get::<Option<i64>, _>(3).map(|n| n as u32),
                scale: r.get::<Option<i64>, _>(4).map(|n| n as u32),
                comment: if comment.is_empty() { None } else { Some(comment) },
            }
        })
        .collect())
}

async fn list_columns_sqlite(pool: &AnyPool, table: &str) -> Result<Vec<RawColumn>> {
    let pragma = format!("PRAGMA table_info({})", quote_ident(table));
    let rows = sqlx::query(&pragma).fetch_all(pool).await.map_err(DbError::Sqlx)?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let native_type: String = r.get(2);
            let notnull: i32 = r.get(3);
            let pk: i32 = r.get(5);
            RawColumn {
                name: r.get(1),
                type_category: classify_sqlite_type(&native_type),
                native_type,
                nullable: notnull == 0,
                primary_key: pk != 0,
                size: None,
                scale: None,
                comment: None,
            }
        })
        .collect())
}

async fn list_foreign_keys_postgres(pool: &AnyPool, schema: &str, table: &str) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query(
        "SELECT kcu.column_name, ccu.table_schema, ccu.table_name, ccu.column_name, tc.constraint_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
         WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 AND tc.table_name = $2",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await;

    to_foreign_keys(rows)
}

async fn list_foreign_keys_mysql(pool: &AnyPool, schema: &str, table: &str) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query(
        "SELECT column_name, referenced_table_schema, referenced_table_name, referenced_column_name, constraint_name \
         FROM information_schema.key_column_usage \
         WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await;

    to_foreign_keys(rows)
}

async fn list_foreign_keys_sqlite(pool: &AnyPool, schema: &str, table: &str) -> Result<Vec<RawForeignKey>> {
    let pragma = format!("PRAGMA foreign_key_list({})", quote_ident(table));
    let rows = sqlx::query(&pragma).fetch_all(pool).await.map_err(DbError::Sqlx)?;

    Ok(rows
        .into_iter()
        .map(|r| RawForeignKey {
            from_column: r.get(3),
            to_schema: schema.to_string(),
            to_table: r.get(2),
            to_column: r.get(4),
            constraint_name: None,
        })
        .collect())
}

fn to_foreign_keys(rows: std::result::Result<Vec<sqlx::any::AnyRow>, sqlx::Error>) -> Result<Vec<RawForeignKey>> {
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "foreign key introspection query failed, continuing without relationships");
            return Ok(Vec::new());
        }
    };

    Ok(rows
        .into_iter()
        .map(|r| RawForeignKey {
            from_column: r.get(0),
            to_schema: r.get(1),
            to_table: r.get(2),
            to_column: r.get(3),
            constraint_name: r.get::<Option<String>, _>(4),
        })
        .collect())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn classify_postgres_type(native: &str) -> TypeCategory {
    let t = native.to_ascii_lowercase();
    if t.contains("char") || t.contains("text") || t == "uuid" || t == "xml" || t == "json" || t == "jsonb" {
        TypeCategory::String
    } else if t.contains("int") || t.contains("numeric") || t.contains("decimal") || t.contains("real") || t.contains("double") || t.contains("float") {
        TypeCategory::Numeric
    } else if t.contains("timestamp") || t.contains("date") || t.contains("time") {
        TypeCategory::Datetime
    } else if t.contains("bytea") {
        TypeCategory::Binary
    } else if t == "boolean" {
        TypeCategory::Boolean
    } else {
        TypeCategory::String
    }
}

fn classify_mysql_type(native: &str) -> TypeCategory {
    let t = native.to_ascii_lowercase();
    if t.contains("char") || t.contains("text") || t.contains("enum") || t.contains("json") {
        TypeCategory::String
    } else if t.contains("int") || t.contains("decimal") || t.contains("float") || t.contains("double") {
        TypeCategory::Numeric
    } else if t.contains("timestamp") || t.contains("date") || t.contains("time") {
        TypeCategory::Datetime
    } else if t.contains("blob") || t.contains("binary") {
        TypeCategory::Binary
    } else if t == "bool" || t == "boolean" {
        TypeCategory::Boolean
    } else {
        TypeCategory::String
    }
}

fn classify_sqlite_type(native: &str) -> TypeCategory {
    let t = native.to_ascii_lowercase();
    if t.contains("char") || t.contains("text") || t.contains("clob") {
        TypeCategory::String
    } else if t.contains("int") || t.contains("real") || t.contains("floa") || t.contains("doub") || t.contains("num") || t.contains("dec") {
        TypeCategory::Numeric
    } else if t.contains("date") || t.contains("time") {
        TypeCategory::Datetime
    } else if t.contains("blob") {
        TypeCategory::Binary
    } else if t.contains("bool") {
        TypeCategory::Boolean
    } else {
        TypeCategory::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_type_classification() {
        assert_eq!(classify_postgres_type("character varying"), TypeCategory::String);
        assert_eq!(classify_postgres_type("numeric"), TypeCategory::Numeric);
        assert_eq!(classify_postgres_type("timestamp without time zone"), TypeCategory::Datetime);
        assert_eq!(classify_postgres_type("boolean"), TypeCategory::Boolean);
    }

    #[test]
    fn sqlite_type_classification_is_affinity_based() {
        assert_eq!(classify_sqlite_type("VARCHAR(255)"), TypeCategory::String);
        assert_eq!(classify_sqlite_type("INTEGER"), TypeCategory::Numeric);
        assert_eq!(classify_sqlite_type("BLOB"), TypeCategory::Binary);
    }

    #[test]
    fn quote_ident_escapes_double_quotes() {
        assert_eq!(quote_ident(r#"weird"name"#), r#""weird""name""#);
    }
}
