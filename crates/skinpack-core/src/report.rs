//! User-facing progress and status sink.
//!
//! Install and lifecycle code report through this trait so that they stay
//! independent of how (or whether) the messages reach a terminal.

use std::sync::Mutex;

pub trait Reporter {
    fn error(&self, message: &str);

    fn warning(&self, message: &str);

    fn info(&self, message: &str);

    fn success(&self, message: &str);

    /// Reports progress through a sequence of `total` steps.
    fn progress(&self, current: usize, total: usize, message: &str);
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn error(&self, message: &str) {
        (**self).error(message)
    }
    fn warning(&self, message: &str) {
        (**self).warning(message)
    }
    fn info(&self, message: &str) {
        (**self).info(message)
    }
    fn success(&self, message: &str) {
        (**self).success(message)
    }
    fn progress(&self, current: usize, total: usize, message: &str) {
        (**self).progress(current, total, message)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn error(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn progress(&self, _: usize, _: usize, _: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Error,
    Warning,
    Info,
    Success,
    Progress,
}

/// Keeps every message in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    messages: Mutex<Vec<(ReportLevel, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(ReportLevel, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: ReportLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(found, _)| *found == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn push(&self, level: ReportLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

impl Reporter for RecordingReporter {
    fn error(&self, message: &str) {
        self.push(ReportLevel::Error, message);
    }
    fn warning(&self, message: &str) {
        self.push(ReportLevel::Warning, message);
    }
    fn info(&self, message: &str) {
        self.push(ReportLevel::Info, message);
    }
    fn success(&self, message: &str) {
        self.push(ReportLevel::Success, message);
    }
    fn progress(&self, _current: usize, _total: usize, message: &str) {
        self.push(ReportLevel::Progress, message);
    }
}
