use tracing::info;

use crate::error::StoreError;
use crate::store::settings::{SettingsStore, TASK_STATUS_KEY};

/// Status lines produced during one monitor pass. Every line is logged; only
/// the last one is written to settings, once, by `persist`.
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: Vec<String>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(status = %message, "background task status");
        self.lines.push(message);
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn persist<S: SettingsStore + ?Sized>(&self, settings: &S) -> Result<(), StoreError> {
        match self.last() {
            Some(message) => settings.set_string(TASK_STATUS_KEY, message),
            None => Ok(()),
        }
    }
}
