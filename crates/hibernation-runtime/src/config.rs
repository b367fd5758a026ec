//! Runner configuration.

/// What happens when a dispatch starts while another one for the same actor
/// is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Fail the second dispatch with `DispatchError::DispatchInProgress`
    #[default]
    Reject,
    /// Wait for the slot; waiters are served in arrival order
    Queue,
}

/// Configuration for a [`SocketDispatcher`](crate::SocketDispatcher).
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Policy for overlapping dispatches on one actor
    pub dispatch_policy: DispatchPolicy,
    /// Entrypoint used when a run does not name one
    pub default_entrypoint: Option<String>,
}

impl RunnerConfig {
    /// Config with the given dispatch policy and no default entrypoint.
    pub fn with_policy(dispatch_policy: DispatchPolicy) -> Self {
        Self { dispatch_policy, ..Self::default() }
    }
}
