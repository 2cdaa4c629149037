use std::time::Duration;

use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task, time,
};
use tokio_util::sync::CancellationToken;

/// Arms the wall clock half of the count-or-timeout merge trigger.
///
/// Every armed timer is a child of the coordinator's shutdown token, so tearing
/// the run down cancels all pending timeouts at once. An expiry takes the
/// coordinator's blocking lock, on a multi threaded runtime it runs in `block_in_place`.
#[derive(Debug)]
pub(crate) struct WindowTimer {
    runtime: Handle,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl WindowTimer {
    /// Creates a new `WindowTimer` bound to the current tokio runtime.
    ///
    /// # Returns
    /// `None` if called outside of a runtime.
    pub fn new(timeout: Duration, shutdown: CancellationToken) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;

        Some(Self {
            runtime,
            timeout,
            shutdown,
        })
    }

    /// Starts a timer that calls `on_expire` unless disarmed first.
    ///
    /// # Arguments
    /// * `on_expire` - What to do once the timeout elapses.
    ///
    /// # Returns
    /// The token that disarms this timer when cancelled.
    pub fn arm<F>(&self, on_expire: F) -> CancellationToken
    where
        F: FnOnce() + Send + 'static,
    {
        let disarm = self.shutdown.child_token();
        let token = disarm.clone();
        let timeout = self.timeout;
        let flavor = self.runtime.runtime_flavor();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(timeout) => match flavor {
                    RuntimeFlavor::MultiThread => task::block_in_place(on_expire),
                    _ => on_expire(),
                },
            }
        });

        disarm
    }
}
