// ABOUTME: Session feature negotiation ahead of command execution.
// ABOUTME: Applies pty, agent and X11 requests under an explicit fatal/non-fatal policy table.

use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::ssh::{Error, ExecSession, PtyRequest, Result};

/// Session-level features requested before a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Pty,
    AgentForwarding,
    X11Forwarding,
}

/// What a failed feature request does to the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort before execution and return the error.
    Abort,
    /// Record a warning of this kind and carry on as if it had succeeded.
    Warn(WarningKind),
}

impl Feature {
    /// The policy table.
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Feature::Pty => FailurePolicy::Abort,
            Feature::AgentForwarding => FailurePolicy::Warn(WarningKind::AgentForwarding),
            Feature::X11Forwarding => FailurePolicy::Warn(WarningKind::X11Forwarding),
        }
    }
}

/// Result of a single feature request.
#[derive(Debug)]
pub enum Outcome {
    Ok,
    Failed(Error),
}

impl From<Result<()>> for Outcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Ok,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Which features to request for a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Allocate a pseudo-terminal.
    pub tty: bool,
    /// Forward the local authentication agent.
    pub forward_agent: bool,
    /// Forward X11 display traffic.
    pub forward_x11: bool,
}

impl ExecOptions {
    /// Requested features in negotiation order.
    pub fn requested(&self) -> impl Iterator<Item = Feature> + use<> {
        [
            (self.tty, Feature::Pty),
            (self.forward_agent, Feature::AgentForwarding),
            (self.forward_x11, Feature::X11Forwarding),
        ]
        .into_iter()
        .filter_map(|(wanted, feature)| wanted.then_some(feature))
    }
}

/// Apply the requested features to `session`.
///
/// Every requested feature is attempted; a failure stops negotiation only
/// when the policy table says [`FailurePolicy::Abort`].
pub async fn negotiate<S: ExecSession + ?Sized>(
    session: &mut S,
    options: &ExecOptions,
    pty: &PtyRequest,
    diag: &mut Diagnostics,
) -> Result<()> {
    for feature in options.requested() {
        let outcome: Outcome = match feature {
            Feature::Pty => session.request_pty(pty).await,
            Feature::AgentForwarding => session.attach_agent_forwarding().await,
            Feature::X11Forwarding => session.attach_x11_forwarding().await,
        }
        .into();

        match (outcome, feature.failure_policy()) {
            (Outcome::Ok, _) => tracing::debug!("Negotiated {:?}", feature),
            (Outcome::Failed(e), FailurePolicy::Abort) => return Err(e),
            (Outcome::Failed(e), FailurePolicy::Warn(kind)) => {
                diag.warn(Warning::new(kind, e.to_string()))
            }
        }
    }
    Ok(())
}
