//! Run logging and progress display
//!
//! Console output for a pipeline run: leveled messages plus an indicatif
//! progress bar over the per-installer phase. Messages are routed through the
//! bar while it is active so the two do not interleave.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,
    Summary = 1,
    Detailed = 2,
    Debug = 3,
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

pub struct PipelineLogger {
    verbosity: VerbosityLevel,
    progress: Mutex<Option<ProgressBar>>,
}

impl PipelineLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress: Mutex::new(None),
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Errors are always shown regardless of verbosity.
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    pub fn start_progress(&self, total: u64) {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        if let Ok(mut guard) = self.progress.lock() {
            *guard = Some(bar);
        }
    }

    pub fn advance(&self, message: &str) {
        if let Ok(guard) = self.progress.lock() {
            if let Some(bar) = guard.as_ref() {
                bar.set_message(message.to_string());
                bar.inc(1);
            }
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", final_message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let line = format!("[{}] {}: {}", timestamp(), level, message);
        if let Ok(guard) = self.progress.lock() {
            if let Some(bar) = guard.as_ref() {
                bar.println(line);
                return;
            }
        }
        eprintln!("{}", line);
    }
}

fn timestamp() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs / 3600) % 24,
        (secs % 3600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}
