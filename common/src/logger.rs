use chrono::Local;
use colored::Colorize;
use fern::Dispatch;
use log::LevelFilter;
use std::fs::{OpenOptions, create_dir_all};
use std::io;
use std::path::Path;

pub fn parse_level(log_level: &str) -> LevelFilter {
    match log_level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn plain_level(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN",
        log::Level::Info => "INFO",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

/// Installs the global logger: plain lines to `log_file_path`, coloured lines
/// to stdout when `to_stdout` is set.
///
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn init_logger(log_level: &str, log_file_path: &str, to_stdout: bool) -> io::Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)?;
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                plain_level(record.level()),
                record.target(),
                message
            ))
        })
        .chain(log_file);

    let mut root = Dispatch::new().level(parse_level(log_level)).chain(file_dispatch);

    if to_stdout {
        let stdout_dispatch = Dispatch::new()
            .format(|out, message, record| {
                let level_str = match record.level() {
                    log::Level::Error => "ERROR".red(),
                    log::Level::Warn => "WARN".yellow(),
                    log::Level::Info => "INFO".green(),
                    log::Level::Debug => "DEBUG".cyan(),
                    log::Level::Trace => "TRACE".normal(),
                };

                out.finish(format_args!(
                    "[{}][{}][{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    level_str,
                    record.target(),
                    message
                ))
            })
            .chain(io::stdout());
        root = root.chain(stdout_dispatch);
    }

    root.apply()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}
