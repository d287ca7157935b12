use common::config::AppConfig;
use common::logger::init_logger;
use migration::runner;
use std::{fs, path::Path, process::ExitCode};

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::global().clone();
    if let Err(e) = init_logger(&config.log_level, &config.log_file, config.log_to_stdout) {
        eprintln!("Failed to initialise logger at {}: {e}", config.log_file);
    }
    log::info!(
        "{} migration tool ({} environment)",
        config.project_name,
        config.env
    );

    let db_path = config.database_path;
    let url = format!("sqlite://{}?mode=rwc", db_path);
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(&db_path);
            return ExitCode::SUCCESS;
        }
        Some("fresh") => {
            remove_db_file(&db_path);
        }
        Some(other) => {
            log::error!("Unknown command '{other}'");
            eprintln!("Unknown command '{other}'. Use: migration [fresh|clean]");
            return ExitCode::FAILURE;
        }
        None => {}
    }

    if let Err(e) = create_db_dir(&db_path) {
        log::error!("Failed to create DB directory for {db_path}: {e}");
        return ExitCode::FAILURE;
    }

    if runner::run_all_migrations(&url).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn remove_db_file(path: &str) {
    let db_path = Path::new(path);
    if !db_path.exists() {
        log::info!("DB file does not exist: {}", db_path.display());
        return;
    }
    match fs::remove_file(db_path) {
        Ok(()) => log::info!("Deleted DB: {}", db_path.display()),
        Err(e) => log::error!("Failed to delete {}: {e}", db_path.display()),
    }
}

fn create_db_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
