use crate::error::DbError;
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database.
///
/// `DATABASE_URL` is read from the environment, after loading a `.env` file
/// when one exists.
pub async fn connect() -> Result<PgPool, DbError> {
    // A missing .env file is fine as long as the variable is set some other way.
    dotenv().ok();

    let database_url = env::var("DATABASE_URL")
        .map_err(|_e| DbError::ConnectionConfigError("DATABASE_URL must be set.".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to the database.");
    Ok(pool)
}

/// The table the embedded migrations create.
pub const MANAGED_TABLE: &str = "stock_data";

/// Whether the migrations own `table`. Any other configured table is expected
/// to exist already and is left alone.
pub fn is_managed_table(table: &str) -> bool {
    table == MANAGED_TABLE
}

/// Applies the embedded migrations so the `stock_data` table exists.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_default_table_is_migrated() {
        assert!(is_managed_table("stock_data"));
        assert!(!is_managed_table("prices_2024"));
    }
}
