use crate::charts::ChartBuilder;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Shared resources handed to a running job.
#[derive(Clone)]
pub struct JobContext {
    pub cancellation_token: CancellationToken,

    /// Runtime the scheduler lives on. Jobs execute on the blocking pool and
    /// use this to drive async work to completion.
    pub runtime: Handle,

    pub chart_builder: Arc<ChartBuilder>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        runtime: Handle,
        chart_builder: Arc<ChartBuilder>,
    ) -> Self {
        Self {
            cancellation_token,
            runtime,
            chart_builder,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Same resources, cancelled together with this context.
    pub fn child(&self) -> Self {
        Self {
            cancellation_token: self.cancellation_token.child_token(),
            runtime: self.runtime.clone(),
            chart_builder: self.chart_builder.clone(),
        }
    }
}
