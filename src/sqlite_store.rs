//! SQLite-backed [`Collection`] implementation.
//!
//! Every collection shares one `records` table, keyed by
//! `(collection, id)`. Metadata is stored as JSON and filtered in SQL via
//! `json_extract`; vectors are little-endian f32 BLOBs compared brute force
//! in Rust under the collection's [`DistanceSpace`].

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use travel_search_core::embedding::{
    blob_to_vec, embed_one, vec_to_blob, DistanceSpace, EmbeddingProvider,
};
use travel_search_core::filter::{MetaValue, Where};
use travel_search_core::models::{Metadata, NormalizedRecord};
use travel_search_core::store::{Collection, QueryCandidate, StoredRecord};

use crate::migrate;

/// SQLite implementation of the [`Collection`] trait.
pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
    space: DistanceSpace,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SqliteCollection {
    /// Open collection `name`, creating it with `space` if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the collection already exists with a different distance
    /// space, since stored scores would no longer be comparable.
    pub async fn get_or_create(
        pool: SqlitePool,
        name: &str,
        space: DistanceSpace,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        migrate::ensure_schema(&pool).await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT space FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&pool)
                .await?;

        match existing {
            Some(stored) if stored != space.as_str() => bail!(
                "collection '{}' uses distance space '{}', not '{}'",
                name,
                stored,
                space
            ),
            Some(_) => {}
            None => {
                sqlx::query("INSERT INTO collections (name, space, created_at) VALUES (?, ?, ?)")
                    .bind(name)
                    .bind(space.as_str())
                    .bind(chrono::Utc::now().timestamp())
                    .execute(&pool)
                    .await?;
                tracing::info!(collection = name, %space, "collection created");
            }
        }

        Ok(Self {
            pool,
            name: name.to_string(),
            space,
            provider,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Build a `SELECT` over this collection's rows, optionally filtered.
    fn select(&self, columns: &str, filter: Option<&Where>, binds: &mut Vec<MetaValue>) -> String {
        let mut sql = format!("SELECT {} FROM records WHERE collection = ?", columns);
        if let Some(w) = filter {
            sql.push_str(" AND ");
            sql.push_str(&where_to_sql(w, binds));
        }
        sql.push_str(" ORDER BY id");
        sql
    }

    async fn fetch(
        &self,
        columns: &str,
        filter: Option<&Where>,
    ) -> Result<Vec<SqliteRow>> {
        let mut binds = Vec::new();
        let sql = self.select(columns, filter, &mut binds);
        let mut query = sqlx::query(&sql).bind(self.name.clone());
        for value in binds {
            query = bind_value(query, value);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: MetaValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        MetaValue::Str(s) => query.bind(s),
        MetaValue::Int(i) => query.bind(i),
    }
}

/// Translate a predicate into a SQL boolean expression over
/// `metadata_json`, appending its parameters to `binds` in order.
pub fn where_to_sql(w: &Where, binds: &mut Vec<MetaValue>) -> String {
    let column = |key: &str| format!("json_extract(metadata_json, '$.{}')", key);
    match w {
        Where::Eq(field, value) => {
            binds.push(value.clone());
            format!("{} = ?", column(field.key()))
        }
        Where::In(field, values) => {
            if values.is_empty() {
                return "0".to_string();
            }
            binds.extend(values.iter().cloned());
            let marks = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", column(field.key()), marks)
        }
        Where::Gte(field, bound) => {
            binds.push(MetaValue::Int(*bound));
            format!("{} >= ?", column(field.key()))
        }
        Where::Lte(field, bound) => {
            binds.push(MetaValue::Int(*bound));
            format!("{} <= ?", column(field.key()))
        }
        Where::And(parts) => {
            if parts.is_empty() {
                return "1".to_string();
            }
            let clauses: Vec<String> = parts.iter().map(|p| where_to_sql(p, binds)).collect();
            format!("({})", clauses.join(" AND "))
        }
    }
}

fn parse_metadata(row: &SqliteRow) -> Result<Metadata> {
    let raw: String = row.try_get("metadata_json")?;
    serde_json::from_str(&raw).context("corrupt metadata_json")
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn space(&self) -> DistanceSpace {
        self.space
    }

    async fn ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = records.iter().map(|r| r.body.clone()).collect();
        let vectors = self.provider.embed(&texts).await?;
        if vectors.len() != records.len() {
            bail!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            );
        }

        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors.iter()) {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, document, metadata_json, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims
                "#,
            )
            .bind(&self.name)
            .bind(&record.id)
            .bind(&record.body)
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .bind(self.provider.model_name())
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_filter(&self, filter: Option<&Where>) -> Result<Vec<StoredRecord>> {
        let rows = self.fetch("id, metadata_json", filter).await?;
        rows.iter()
            .map(|row| -> Result<StoredRecord> {
                Ok(StoredRecord {
                    id: row.try_get("id")?,
                    metadata: parse_metadata(row)?,
                })
            })
            .collect()
    }

    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)?;
        let result =
            sqlx::query("UPDATE records SET metadata_json = ? WHERE collection = ? AND id = ?")
                .bind(&metadata_json)
                .bind(&self.name)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            bail!("no record with id '{}' in '{}'", id, self.name);
        }
        Ok(())
    }

    async fn query_by_text(
        &self,
        text: &str,
        filter: Option<&Where>,
        n: usize,
    ) -> Result<Vec<QueryCandidate>> {
        let query_vec = embed_one(self.provider.as_ref(), text).await?;
        let rows = self.fetch("id, metadata_json, embedding", filter).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            candidates.push(QueryCandidate {
                id: row.try_get("id")?,
                distance: self.space.distance(&query_vec, &blob_to_vec(&blob)),
                metadata: parse_metadata(row)?,
            });
        }

        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(n);
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
