//! Collection statistics.
//!
//! A quick summary of what's stored: record counts per collection and,
//! for the configured collection, per city and per type. Used by
//! `travel stats` to confirm an ingestion landed. Reads SQL directly, so it
//! works without an embedding provider.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let name = &config.collection.name;
    let space: Option<String> =
        sqlx::query_scalar("SELECT space FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&pool)
            .await?;
    let total = record_count(&pool, name).await?;

    println!("Travel Search — Collection Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", name);
    println!(
        "  Space:       {}",
        space.as_deref().unwrap_or("(not created)")
    );
    println!("  Records:     {}", total);

    print_breakdown(&pool, name, "city", "CITY").await?;
    print_breakdown(&pool, name, "type", "TYPE").await?;

    println!();
    pool.close().await;
    Ok(())
}

/// Number of records stored in collection `name`.
pub async fn record_count(pool: &SqlitePool, name: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

async fn print_breakdown(pool: &SqlitePool, name: &str, key: &str, label: &str) -> Result<()> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT json_extract(metadata_json, '$.{key}') AS value, COUNT(*) AS n
        FROM records
        WHERE collection = ?
        GROUP BY value
        ORDER BY n DESC, value ASC
        "#
    ))
    .bind(name)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(());
    }

    println!();
    println!("  {:<24} {:>8}", label, "RECORDS");
    println!("  {}", "-".repeat(34));
    for row in &rows {
        let value: Option<String> = row.get("value");
        let n: i64 = row.get("n");
        println!("  {:<24} {:>8}", value.unwrap_or_default(), n);
    }
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
