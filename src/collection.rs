//! Opens the configured collection.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteCollection;

/// Connect to the database and get or create `collection.name` with the
/// configured distance space and embedding provider.
pub async fn open_collection(config: &Config) -> Result<SqliteCollection> {
    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    SqliteCollection::get_or_create(
        pool,
        &config.collection.name,
        config.collection.distance_space()?,
        provider,
    )
    .await
}
