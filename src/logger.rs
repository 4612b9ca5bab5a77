//! log4rs setup: a console appender plus a size-rolled `app.log`.
//!
//! `dev6!` records (target `nexuswire::dev6`) are routed to a separate
//! `dev6.log` when enabled and dropped from the app log otherwise.

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;
pub const DEV6_TARGET: &str = "nexuswire::dev6";

pub type LogResult<T> = Result<T, Box<dyn std::error::Error>>;

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

fn rolling(base: &Path, name: &str, keep: u32) -> LogResult<RollingFileAppender> {
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?)
}

/// Builds the log4rs configuration without installing it.
///
/// # Errors
/// Returns an error when the log directory or files cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> LogResult<Config> {
    let base = dir.map_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")), PathBuf::from);
    std::fs::create_dir_all(&base)?;
    let keep = retention.and_then(|r| u32::try_from(r).ok()).unwrap_or(DEFAULT_RETENTION);
    let lvl = parse_level(level);

    let console = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(PATTERN))).build();
    let mut builder = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    Ok(builder.build(Root::builder().appender("console").appender("app").build(lvl))?)
}

/// Installs the global logger.
///
/// # Errors
/// Returns an error when the configuration cannot be built or a logger is
/// already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult<()> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// [`configure_logging`] with optional routing of `dev6!` records to `dev6.log`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> LogResult<()> {
    let config = build_config(dir, level, retention, enable_dev6)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from `NEXUSWIRE_LOG_DIR`, `NEXUSWIRE_LOG_LEVEL`,
/// `NEXUSWIRE_LOG_RETENTION` and `NEXUSWIRE_DEV6`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> LogResult<()> {
    let dir = std::env::var("NEXUSWIRE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("NEXUSWIRE_LOG_LEVEL").ok();
    let retention = std::env::var("NEXUSWIRE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    let dev6 = std::env::var("NEXUSWIRE_DEV6")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    configure_logging_with_dev(dir.as_deref(), level.as_deref(), retention, dev6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let cfg = build_config(Some(&logs), Some("warn"), Some(3), true).unwrap();
        assert_eq!(cfg.root().level(), LevelFilter::Warn);
        assert!(logs.join("app.log").exists());
        assert!(logs.join("dev6.log").exists());
    }
}
