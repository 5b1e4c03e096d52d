//! Rebuilds every category's chart.
//!
//! Runs on startup, after catalog changes and on a fixed interval, so a new
//! ISO week opens its snapshot even when nobody interacts.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule},
};
use crate::catalog::ChartCategory;
use crate::charts::ChartQuery;
use std::time::Duration;
use tracing::info;

pub struct ChartRefreshJob {
    interval: Duration,
}

impl ChartRefreshJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours * 60 * 60))
    }
}

impl BackgroundJob for ChartRefreshJob {
    fn id(&self) -> &'static str {
        "chart_refresh"
    }

    fn name(&self) -> &'static str {
        "Chart Refresh"
    }

    fn description(&self) -> &'static str {
        "Rebuild the weekly chart of every category"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnStartup, HookEvent::OnCatalogChange],
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let builder = &ctx.chart_builder;
        let limit = builder.settings().default_limit;
        let mut charted = 0;
        for category in ChartCategory::all() {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            let items = ctx
                .runtime
                .block_on(builder.build_chart(&ChartQuery::new(category, limit)));
            charted += items.len();
        }
        info!("Refreshed all charts, {} items charted", charted);
        Ok(())
    }
}
