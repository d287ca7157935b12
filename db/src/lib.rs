pub mod models;
pub mod test_utils;

use common::config::AppConfig;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;

/// Converts a configured database path into a connection URL.
///
/// Anything already shaped like a DSN is used as-is; otherwise the value is
/// treated as a SQLite file path that is created on first use.
pub fn database_url(path_or_url: &str) -> String {
    if path_or_url.starts_with("sqlite:")
        || path_or_url.starts_with("postgres://")
        || path_or_url.starts_with("mysql://")
    {
        path_or_url.to_owned()
    } else {
        format!("sqlite://{path_or_url}?mode=rwc")
    }
}

pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let path_or_url = AppConfig::global().database_path.clone();
    let url = database_url(&path_or_url);

    if !path_or_url.contains("://") && !path_or_url.starts_with("sqlite:") {
        // SQLite won't create intermediate directories.
        if let Some(parent) = Path::new(&path_or_url).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    log::warn!("Could not create DB directory {}: {e}", parent.display());
                }
            }
        }
    }

    log::debug!("Connecting to {url}");
    Database::connect(&url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::Migrator;
    use sea_orm_migration::MigratorTrait;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn plain_paths_become_sqlite_urls() {
        assert_eq!(database_url("data/a.db"), "sqlite://data/a.db?mode=rwc");
        assert_eq!(database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(database_url("postgres://u@h/db"), "postgres://u@h/db");
    }

    #[tokio::test]
    #[serial]
    async fn connect_creates_missing_directories_from_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("attendance.db");
        AppConfig::set_database_path(path.to_string_lossy());

        let db = connect().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        assert!(path.exists());

        AppConfig::reset();
    }

    #[tokio::test]
    #[serial]
    async fn connect_reports_unusable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "not a directory").unwrap();
        AppConfig::set_database_path(blocker.join("attendance.db").to_string_lossy());

        assert!(connect().await.is_err());

        AppConfig::reset();
    }
}
