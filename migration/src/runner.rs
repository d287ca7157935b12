use colored::*;
use futures::FutureExt;
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use std::io::{self, Write};
use std::time::Instant;

use crate::Migrator;

const STATUS_COLUMN: usize = 80;

/// Connects to `url` and applies every migration in order.
pub async fn run_all_migrations(url: &str) -> bool {
    let db = match sea_orm::Database::connect(url).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("DB connection to {url} failed: {e}");
            println!("{} {}", "DB connection failed:".red(), e);
            return false;
        }
    };

    apply_migrations(&db).await
}

/// Applies every migration in order, printing one status line per migration.
/// Returns `false` as soon as one fails. Every migration tolerates objects that
/// already exist, so re-running against an up-to-date database succeeds.
pub async fn apply_migrations(db: &DatabaseConnection) -> bool {
    println!("Running migrations...");
    let schema_manager = SchemaManager::new(db);

    for migration in Migrator::migrations() {
        if !run_migration(&schema_manager, migration).await {
            return false;
        }
    }
    log::info!("All migrations applied");
    true
}

async fn run_migration(schema_manager: &SchemaManager<'_>, migration: Box<dyn MigrationTrait>) -> bool {
    let name = migration.name().to_owned();
    let name_str = format!("Applying {}", name.bold());
    let dots = ".".repeat(STATUS_COLUMN.saturating_sub(name_str.len()));
    print!("{}{} ", name_str, dots);
    let _ = io::stdout().flush();

    let start = Instant::now();
    let result = std::panic::AssertUnwindSafe(migration.up(schema_manager))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(())) => {
            let elapsed = start.elapsed();
            println!("{} {}", "done".green(), format!("({elapsed:.2?})").dimmed());
            log::info!("Applied {name} in {elapsed:.2?}");
            true
        }
        Ok(Err(e)) => {
            println!("{}", "failed".red());
            log::error!("Migration {name} failed: {e}");
            false
        }
        Err(_) => {
            println!("{}", "panicked".red());
            log::error!("Migration {name} panicked");
            false
        }
    }
}
