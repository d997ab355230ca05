use crate::sink::{DebugSink, Debugcon, SinkWriter};
use core::fmt::Write;
use kernel_sync::SyncOnceCell;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Formats records as `[LEVEL] target: message\n` into a [`DebugSink`].
pub struct QemuLogger<S> {
    max_level: LevelFilter,
    sink: S,
}

impl<S: DebugSink> QemuLogger<S> {
    #[must_use]
    pub const fn new(max_level: LevelFilter, sink: S) -> Self {
        Self { max_level, sink }
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl<S: DebugSink + Send + Sync> QemuLogger<S> {
    /// Install this logger as the global `log` backend.
    ///
    /// # Errors
    /// If another logger was installed first.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl<S: DebugSink + Send + Sync> Log for QemuLogger<S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(
            SinkWriter(&self.sink),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // no-op for qemu debug port
    }
}

static DEBUGCON_LOGGER: SyncOnceCell<QemuLogger<Debugcon>> = SyncOnceCell::new();

/// Route `log` output to the QEMU debug console. Call once during early init.
///
/// # Errors
/// If another logger was installed first.
pub fn init_debugcon(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    DEBUGCON_LOGGER
        .get_or_init(|| QemuLogger::new(max_level, Debugcon))
        .install()
}
