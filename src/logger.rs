use log::{LevelFilter, Log, Metadata, Record};
use std::{sync::OnceLock, time::Instant};

/// Installs the console logger.
///
/// The level can be changed afterwards with [`log::set_max_level`].
///
/// Every line is prefixed with the time since boot, so that log output from
/// the scheduler can be lined up against task periods.
pub fn init(max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();
    let logger = LOGGER.get_or_init(|| Logger {
        start: Instant::now(),
    });

    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}

/// The default log level for this build profile.
pub const fn default_level() -> LevelFilter {
    #[cfg(debug_assertions)]
    let max_level = LevelFilter::Debug;
    #[cfg(not(debug_assertions))]
    let max_level = LevelFilter::Info;
    max_level
}

#[derive(Debug)]
struct Logger {
    start: Instant,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        static LEVEL_STRS: [&str; 5] = ["[x]", "[!]", "[i]", "[?]", "[.]"];
        let level = LEVEL_STRS[record.level() as usize - 1];
        let uptime = self.start.elapsed();
        println!(
            "[{:>6}.{:03}] {level} {}: {}",
            uptime.as_secs(),
            uptime.subsec_millis(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
