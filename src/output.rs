// ABOUTME: Status reporting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, all on stderr.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Warnings and errors as plain text
    Normal,
    /// Errors only
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Reports rexec's own status. Stdout is left to the remote command.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Report a non-fatal warning (suppressed in quiet mode).
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit(&self.event("warning", message, None)),
        }
    }

    /// Report an error.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.emit(&self.event("error", message, None)),
        }
    }

    /// Report how the remote command ended (JSON mode only).
    pub fn finished(&self, exit_code: i32) {
        if self.mode == OutputMode::Json {
            self.emit(&self.event("exit", "command finished", Some(exit_code)));
        }
    }

    fn event<'a>(&self, event: &'a str, message: &'a str, exit_code: Option<i32>) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            exit_code,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        }
    }

    fn emit(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            eprintln!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
