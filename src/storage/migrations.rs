// storage/migrations.rs
// Schema migrations

use sqlx::SqlitePool;

use crate::error_handling::StoreError;

/// Runs SQLx migrations located in the `migrations/` directory.
///
/// Applied migrations are recorded by sqlx, so calling this on every start
/// is safe.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    let migrations_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir.as_path()).await?;
    migrator.run(pool).await?;
    Ok(())
}
