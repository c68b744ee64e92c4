use core::fmt::Arguments;
use log::{Level, LevelFilter, Log, Metadata, Record, set_logger, set_max_level};
use spin::Once;

use crate::error::{DmError, DmResult};

/// Console output used by the logger; the console driver lives outside the device model.
pub type ConsoleSink = fn(Arguments);

static SINK: Once<ConsoleSink> = Once::new();

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        SINK.is_completed()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 20,  // White
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        if let Some(sink) = SINK.get() {
            sink(format_args!(
                "\u{1B}[{}m[{:}] {}\u{1B}[0m\n",
                color,
                record.level(),
                record.args(),
            ));
        }
    }

    fn flush(&self) {}
}

/// Route `log` records to `sink`. Only the first call installs a logger.
pub fn init(sink: ConsoleSink, level: LevelFilter) -> DmResult<()> {
    static LOGGER: Logger = Logger;
    SINK.call_once(|| sink);
    set_logger(&LOGGER).map_err(|_| DmError::InvalidArgument)?;
    set_max_level(level);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug!(target: "my_target", key1 = 42, key2 = true; "a {} event", "log")
    // debug!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log,Level};
            log!(target: $target, Level::Debug, $($arg)+)
        }
    };

    // debug!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            use log::{log,Level};
            log!(Level::Debug, $($arg)+)
        }
    }
}
