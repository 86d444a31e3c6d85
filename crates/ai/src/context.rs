use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Caller-supplied bounds for one request.
///
/// `timeout` applies to each network suspension point separately (the
/// completion call, the handler call). Cancellation is cooperative.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
