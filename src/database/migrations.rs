use anyhow::{Context, Result};
use sqlx::postgres::PgPool;
use sqlx::Executor;

/// Schema migrations, applied in order
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_init.sql",
    include_str!("../../migrations/0001_init.sql"),
)];

/// Run all pending migrations in order.
///
/// Each migration runs in its own transaction together with its entry in the
/// tracker table, so a failed migration leaves nothing behind.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    init_migrations_tracker(pool).await?;

    for (name, sql) in MIGRATIONS {
        if is_applied(pool, name).await? {
            tracing::debug!(migration = %name, "migration already applied");
            continue;
        }

        tracing::info!(migration = %name, "running migration");

        let mut tx = pool.begin().await?;
        (&mut *tx)
            .execute(*sql)
            .await
            .with_context(|| format!("migration {} failed", name))?;
        sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    tracing::info!("all migrations applied");
    Ok(())
}

/// Create the tracker table if it does not exist
async fn init_migrations_tracker(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_applied(pool: &PgPool, name: &str) -> Result<bool> {
    let applied: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = $1)")
            .bind(name)
            .fetch_one(pool)
            .await?;

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_named() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.iter().all(|n| n.ends_with(".sql")));
    }

    #[test]
    fn test_initial_schema_defines_core_tables() {
        let (_, sql) = MIGRATIONS[0];
        for table in [
            "physicians",
            "patients",
            "drugs",
            "patient_physicians",
            "prescriptions",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
    }
}
