use std::sync::Arc;
use std::time::Duration;

use sovereign_ai::RequestContext;
use sovereign_infra::{ExecutionJournal, Orchestrator, PipelineParts};

/// Long-lived services shared by every request.
pub struct AppServices {
    pub orchestrator: Orchestrator,
    pub journal: Arc<dyn ExecutionJournal>,
    pub request_timeout: Duration,
}

impl AppServices {
    pub fn new(parts: PipelineParts, request_timeout: Duration) -> Self {
        let journal = parts.journal.clone();
        Self {
            orchestrator: parts.build(),
            journal,
            request_timeout,
        }
    }

    /// Fresh context for one request, bounded by the configured deadline.
    ///
    /// A client disconnect drops the handler future, which aborts the
    /// in-flight completion or handler call with it.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new().with_timeout(self.request_timeout)
    }
}
