use kernel_qemu::{DebugSink, QemuLogger};
use kernel_sync::{SpinMutex, SyncOnceCell};
use log::LevelFilter;

/// A sink that keeps everything written to it.
#[derive(Default)]
pub struct CaptureSink {
    buf: SpinMutex<Vec<u8>>,
}

impl CaptureSink {
    /// Everything captured so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// `true` if any captured line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.contents().lines().any(|l| l.contains(needle))
    }
}

impl DebugSink for CaptureSink {
    fn write_bytes(&self, bytes: &[u8]) {
        self.buf.lock().extend_from_slice(bytes);
    }
}

static CAPTURE: SyncOnceCell<QemuLogger<CaptureSink>> = SyncOnceCell::new();

/// Install a capturing logger at `Trace` level (once per process) and return
/// its sink. Tests of one binary share the sink.
pub fn capture_logs() -> &'static CaptureSink {
    let logger = CAPTURE.get_or_init(|| QemuLogger::new(LevelFilter::Trace, CaptureSink::default()));
    // Another logger may already be installed; capturing is best effort.
    let _ = logger.install();
    logger.sink()
}
