//! Logging initialization built on flexi_logger
//!
//! Text and JSON record formats, optional file output, and runtime log
//! level changes. Format and output destination are fixed at
//! initialization; only the level can change afterwards - a flexi_logger
//! design constraint.

use std::sync::{Mutex, OnceLock};

// Global logger handle; kept so the level can be adjusted at runtime
static LOGGER_HANDLE: OnceLock<Mutex<flexi_logger::LoggerHandle>> = OnceLock::new();

/// Initialize logging for the process.
///
/// `log_level` defaults to "info", `log_format` to "text" ("json" is the
/// alternative). When `log_file` is given, records go to that file instead
/// of stderr. Calling this twice is an error from flexi_logger.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level)?;

    logger = match log_format.unwrap_or("text") {
        "json" => logger.format(json_format),
        _ => logger.format(text_format),
    };

    if let Some(path) = log_file {
        logger = logger.log_to_file(FileSpec::try_from(std::path::Path::new(path))?);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));
    Ok(())
}

/// Change the active log level at runtime.
///
/// Fails if `init_logging` has not run yet.
pub fn set_log_level(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle_mutex = LOGGER_HANDLE
        .get()
        .ok_or("Logger handle not initialised. Call init_logging first.")?;
    let mut handle = handle_mutex
        .lock()
        .map_err(|_| "Could not acquire logger handle lock")?;
    let _ = handle.parse_and_push_temp_spec(log_level);
    Ok(())
}

// "YYYY-MM-DD HH:mm:ss.fff INF message (target)"
fn text_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let level_abbr = match record.level() {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    };

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr,
        record.args(),
        record.target()
    )
}

// One JSON object per record
fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let entry = serde_json::json!({
        "ts": now.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        "level": record.level().to_string(),
        "target": record.target(),
        "message": record.args().to_string(),
    });
    write!(w, "{}", entry)
}
