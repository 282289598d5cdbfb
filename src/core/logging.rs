//! Logging setup for applications embedding the audit engine
//!
//! The engine itself only uses the `log` facade. Hosts that want the
//! engine's standard output format call [`init_logging`] once at startup.

use std::str::FromStr;

// Global static logger handle for flexi_logger
static LOGGER_HANDLE: std::sync::OnceLock<std::sync::Mutex<flexi_logger::LoggerHandle>> =
    std::sync::OnceLock::new();

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// `timestamp LVL message`
    Text,
    /// `timestamp LVL message (module/file.rs:line)`
    Ext,
    /// One compact JSON object per line
    Json,
}

/// Initialise the global logger
///
/// `log_format` accepts `text`, `ext` or `json`; unknown values fall back to
/// `text`. When `log_file` is given, output goes to that file instead of
/// stderr.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = configure_logger(log_level, log_format, log_file, color_enabled)?.start()?;
    let _ = LOGGER_HANDLE.set(std::sync::Mutex::new(handle));
    Ok(())
}

fn configure_logger(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<flexi_logger::Logger, Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let format = log_format
        .and_then(|f| LogFormat::from_str(f).ok())
        .unwrap_or(LogFormat::Text);
    let mut logger =
        Logger::try_with_str(log_level.unwrap_or("info"))?.format(formatter(format, color_enabled));

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }
    Ok(logger)
}

fn formatter(format: LogFormat, color_enabled: bool) -> flexi_logger::FormatFunction {
    match (format, color_enabled) {
        (LogFormat::Json, _) => json_format,
        (LogFormat::Ext, true) => extended_color_format,
        (LogFormat::Ext, false) => extended_format,
        (LogFormat::Text, true) => simple_color_format,
        (LogFormat::Text, false) => simple_format,
    }
}

/// Change the active log level at runtime
///
/// Only the level can change after initialisation; format, colour and file
/// output are fixed by flexi_logger once the logger has started.
pub fn reconfigure_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle_mutex = LOGGER_HANDLE
        .get()
        .ok_or("Logger handle not initialised. Call init_logging first.")?;
    let mut handle = handle_mutex
        .lock()
        .map_err(|_| "Could not acquire logger handle lock")?;
    handle.parse_and_push_temp_spec(log_level)?;
    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    use colored::Colorize;

    let abbr = level_abbr(level);
    match level {
        log::Level::Error => abbr.red().bold(),
        log::Level::Warn => abbr.yellow(),
        log::Level::Info => abbr.green(),
        log::Level::Debug => abbr.blue(),
        log::Level::Trace => abbr.magenta(),
    }
}

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        now.format(TIMESTAMP),
        level_abbr(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {}",
        now.format(TIMESTAMP).to_string().dimmed(),
        level_colored(record.level()),
        record.args()
    )
}

fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    // 2026-01-01 12:00:00.000 INF message (scheduler/executor.rs:42)
    write!(
        w,
        "{} {} {} ({})",
        now.format(TIMESTAMP),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {} ({})",
        now.format(TIMESTAMP).to_string().dimmed(),
        level_colored(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let line = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line())
    });
    serde_json::to_writer(&mut *w, &line).map_err(std::io::Error::other)
}

// pageaudit::scheduler::executor -> scheduler/executor.rs:42
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = if let Some(without_prefix) = target.strip_prefix("pageaudit::") {
        without_prefix.replace("::", "/") + ".rs"
    } else {
        target.replace("::", "/")
    };

    match line {
        Some(line_num) => format!("{}:{}", path_like, line_num),
        None => path_like,
    }
}
