use crate::errors::StorageError;
use crate::model::TelemetryRecord;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Opens the database, creating file and `telemetry` table when absent.
///
/// The pool holds a single connection so appends are serialized.
pub async fn make_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    info!("Opening database...");
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(StorageError::Open)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .map_err(StorageError::Open)?;

    info!("Database opened, running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Appends one record in a single statement.
pub async fn append(pool: &SqlitePool, record: &TelemetryRecord) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO telemetry (topic, value, received_at) VALUES (?, ?, ?)")
        .bind(&record.topic)
        .bind(&record.value)
        .bind(record.received_at_text())
        .execute(pool)
        .await
        .map_err(StorageError::Append)?;
    Ok(())
}

/// Every row in append order.
pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<TelemetryRecord>, StorageError> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT topic, value, received_at FROM telemetry ORDER BY rowid")
            .fetch_all(pool)
            .await
            .map_err(StorageError::Read)?;

    rows.into_iter()
        .map(|(topic, value, received_at)| -> Result<TelemetryRecord, StorageError> {
            let received_at = DateTime::parse_from_rfc3339(&received_at)
                .map_err(|e| StorageError::Corrupt(format!("received_at {:?}: {}", received_at, e)))?
                .with_timezone(&Utc);
            Ok(TelemetryRecord {
                topic,
                value,
                received_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_table_created_on_first_use() {
        let pool = make_pool("sqlite::memory:").await.unwrap();
        assert!(fetch_all(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_duplicates() {
        let pool = make_pool("sqlite::memory:").await.unwrap();
        let record = TelemetryRecord::received_now("base/state/pm25", "12.5");
        append(&pool, &record).await.unwrap();
        append(&pool, &record).await.unwrap();

        let rows = fetch_all(&pool).await.unwrap();
        assert_eq!(rows, vec![record.clone(), record]);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let path = std::env::temp_dir().join(format!("airq-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());

        let pool = make_pool(&url).await.unwrap();
        append(&pool, &TelemetryRecord::received_now("base/state/co2", "640"))
            .await
            .unwrap();
        pool.close().await;

        let pool = make_pool(&url).await.unwrap();
        let rows = fetch_all(&pool).await.unwrap();
        pool.close().await;
        let _ = std::fs::remove_file(&path);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "640");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_to_open() {
        assert!(matches!(
            make_pool("sqlite:///nonexistent-airq-dir/nested/telemetry.db").await,
            Err(StorageError::Open(_))
        ));
    }
}
