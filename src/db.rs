//! Database module
//!
//! Database connection and schema verification utilities.

use sqlx::PgPool;

/// Tables created by `migrations/`
const REQUIRED_TABLES: [&str; 4] = ["users", "currencies", "accounts", "transactions"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let currencies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM currencies")
        .fetch_one(pool)
        .await?;
    if currencies == 0 {
        tracing::warn!("No currencies seeded; accounts cannot be created until they are");
    }

    tracing::info!(currencies, "Schema verified");
    Ok(true)
}
