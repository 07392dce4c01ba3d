// ABOUTME: Diagnostics accumulator for non-fatal warnings during command execution.
// ABOUTME: Collects absorbed failures that shouldn't fail a command but should be shown to users.

/// Collects non-fatal warnings during a command run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check for a warning of the given kind.
    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// A non-fatal warning collected during a command run.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a raw mode warning.
    pub fn raw_mode(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RawMode, message)
    }

    /// Create a stream copy warning.
    pub fn stream_copy(message: impl Into<String>) -> Self {
        Self::new(WarningKind::StreamCopy, message)
    }
}

/// Categories of warnings that can occur during a command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Agent forwarding could not be set up.
    AgentForwarding,
    /// X11 forwarding could not be set up.
    X11Forwarding,
    /// Local terminal could not be put into (or restored from) raw mode.
    RawMode,
    /// An output pipeline failed to deliver bytes to its destination.
    StreamCopy,
}
