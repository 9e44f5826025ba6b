use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub searches: IntCounter,
    pub files_scanned: IntCounter,
    pub lines_matched: IntCounter,
    pub file_failures: IntCounter,
    pub read_timeouts: IntCounter,
    pub consistency_retries: IntCounter,
    pub consistency_failures: IntCounter,
    registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        Ok(Metrics {
            searches: counter("searches_total", "Number of search requests executed")?,
            files_scanned: counter("files_scanned", "Number of candidate files scanned")?,
            lines_matched: counter("lines_matched", "Number of lines returned to callers")?,
            file_failures: counter(
                "file_failures",
                "Number of candidate files that could not be read",
            )?,
            read_timeouts: counter("read_timeouts", "Number of file reads that timed out")?,
            consistency_retries: counter(
                "consistency_retries",
                "Number of searches repeated because the file set changed",
            )?,
            consistency_failures: counter(
                "consistency_failures",
                "Number of searches failed because the file set kept changing",
            )?,
            registry: Arc::new(registry),
        })
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            log::warn!("Failed to encode metrics: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
