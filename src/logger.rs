//! log4rs setup: `app.log` for everything, plus non-additive `audit.log`
//! (every write the datastore issues) and `query.log` (rendered wire
//! documents).

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::config::DatastoreOptions;
use crate::errors::OdmError;

pub const AUDIT_TARGET: &str = "odmlite::audit";
pub const QUERY_TARGET: &str = "odmlite::query";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

static HANDLE: Mutex<Option<log4rs::Handle>> = Mutex::new(None);

/// Initializes logging from a log4rs YAML/TOML file.
///
/// # Errors
/// Returns an error when the file cannot be loaded.
pub fn init_path(path: &Path) -> Result<(), OdmError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| OdmError::Config(format!("log4rs {}: {e}", path.display())))
}

/// Parses `error|warn|info|debug|trace|off`; anything else is `Info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, OdmError> {
    let pattern = base.join(format!("{stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&pattern.display().to_string(), keep)
        .map_err(|e| OdmError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Configures logging for the process. A second call replaces the active
/// configuration.
/// - dir: base directory for logs; if None, current directory.
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error when the directory or appenders cannot be created.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), OdmError> {
    let base = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("query", Box::new(rolling(&base, "query", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("query").additive(false).build(QUERY_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| OdmError::Config(e.to_string()))?;

    let mut handle = HANDLE.lock();
    if let Some(h) = handle.as_ref() {
        h.set_config(config);
        return Ok(());
    }
    match log4rs::init_config(config) {
        Ok(h) => {
            *handle = Some(h);
            Ok(())
        }
        // Another logger owns the facade; leave it in place.
        Err(e) => Err(OdmError::Config(e.to_string())),
    }
}

/// Configures logging from the `log_*` fields of the datastore options.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_options(options: &DatastoreOptions) -> Result<(), OdmError> {
    configure_logging(options.log_dir.as_deref(), options.log_level.as_deref(), options.log_retention)
}

/// Configure logging from environment variables if present:
/// - ODMLITE_LOG_DIR
/// - ODMLITE_LOG_LEVEL
/// - ODMLITE_LOG_RETENTION
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), OdmError> {
    let dir = std::env::var("ODMLITE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("ODMLITE_LOG_LEVEL").ok();
    let retention =
        std::env::var("ODMLITE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
