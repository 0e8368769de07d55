use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,   // Warnings and per-domain results only (default)
    Detailed = 1,  // Per-domain crawl outcomes
    Debug = 2,     // Every page, finding and store access
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "warn,dpofinder=info",
            VerbosityLevel::Debug => "info,dpofinder=debug",
        }
    }
}

/// Holds the active progress bar, if any, so log lines can be printed
/// above it instead of tearing it.
#[derive(Clone, Default)]
pub struct ProgressSlot {
    bar: Arc<RwLock<Option<ProgressBar>>>,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<ProgressBar> {
        self.bar.read().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, bar: Option<ProgressBar>) {
        if let Ok(mut guard) = self.bar.write() {
            *guard = bar;
        }
    }
}

/// Buffers one formatted event and writes it to stderr on drop.
pub struct ProgressWriter {
    bar: Option<ProgressBar>,
    buf: Vec<u8>,
}

impl Write for ProgressWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        match &self.bar {
            Some(bar) => bar.suspend(|| {
                let _ = io::stderr().write_all(&buf);
            }),
            None => {
                let _ = io::stderr().write_all(&buf);
            }
        }
    }
}

impl<'a> MakeWriter<'a> for ProgressSlot {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ProgressWriter {
            bar: self.current(),
            buf: Vec::new(),
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: VerbosityLevel, slot: ProgressSlot) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(slot)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

/// Progress bar for a batch run.
pub struct BatchProgress {
    bar: ProgressBar,
    slot: ProgressSlot,
}

impl BatchProgress {
    pub fn start(slot: &ProgressSlot, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| {
                    // Fallback to a simpler template if the complex one fails
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );
        bar.set_message("Resolving...");
        slot.set(Some(bar.clone()));

        Self {
            bar,
            slot: slot.clone(),
        }
    }

    /// A bar that draws nothing, for tests and non-interactive runs.
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total);
        Self {
            bar,
            slot: ProgressSlot::new(),
        }
    }

    pub fn advance(&self, domain: &str) {
        self.bar.set_message(domain.to_string());
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
        self.slot.set(None);
    }
}
