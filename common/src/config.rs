//! Global application configuration.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton holding
//! runtime values loaded from `.env` and the process environment. Setters exist
//! so tests can override individual fields.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub prefill_store_path: String,
    pub code_rotation_seconds: u64,
    pub default_radius_meters: f64,
    pub default_late_threshold_minutes: u32,
}

static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: var_or("APP_ENV", "development"),
            project_name: var_or("PROJECT_NAME", "attendance"),
            log_level: var_or("LOG_LEVEL", "info"),
            log_file: var_or("LOG_FILE", "logs/attendance.log"),
            log_to_stdout: var_or("LOG_TO_STDOUT", "false") == "true",
            database_path: var_or("DATABASE_PATH", "data/attendance.db"),
            prefill_store_path: var_or("PREFILL_STORE_PATH", "data/student_prefill.json"),
            code_rotation_seconds: parsed_or("CODE_ROTATION_SECONDS", 30),
            default_radius_meters: parsed_or("DEFAULT_RADIUS_METERS", 100.0),
            default_late_threshold_minutes: parsed_or("DEFAULT_LATE_THRESHOLD_MINUTES", 15),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Reloads the configuration from the environment, dropping overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock
                .write()
                .expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_prefill_store_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.prefill_store_path = value.into());
    }

    pub fn set_code_rotation_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.code_rotation_seconds = value);
    }

    pub fn set_default_radius_meters(value: f64) {
        AppConfig::set_field(|cfg| cfg.default_radius_meters = value);
    }

    pub fn set_default_late_threshold_minutes(value: u32) {
        AppConfig::set_field(|cfg| cfg.default_late_threshold_minutes = value);
    }
}
