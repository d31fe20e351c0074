//! Recording collaborators shared by unit tests

use parking_lot::Mutex;
use std::sync::Arc;

use crate::execution::{LogSink, Notifier, Severity};

/// Captures every delivered notification
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

/// Captures every log line with its severity
#[derive(Default, Clone)]
pub struct RecordingLog {
    pub entries: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl LogSink for RecordingLog {
    fn log(&self, severity: Severity, line: &str) {
        self.entries.lock().push((severity, line.to_string()));
    }
}

impl RecordingLog {
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, line)| line.clone()).collect()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.entries.lock().iter().map(|(severity, _)| *severity).collect()
    }
}
