use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::catalog::MediaStores;
use crate::charts::{ChartBuilder, ItemStatsResolver};
use crate::engagement::EngagementService;
use crate::realtime::ConnectionManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedChartBuilder = Arc<ChartBuilder>;
pub type GuardedStatsResolver = Arc<ItemStatsResolver>;
pub type GuardedEngagementService = Arc<EngagementService>;
pub type GuardedConnectionManager = Arc<ConnectionManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub stores: MediaStores,
    pub chart_builder: GuardedChartBuilder,
    pub stats_resolver: GuardedStatsResolver,
    pub engagement: GuardedEngagementService,
    pub connection_manager: GuardedConnectionManager,
    pub scheduler_handle: SchedulerHandle,
    pub version: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        stores: MediaStores,
        chart_builder: GuardedChartBuilder,
        stats_resolver: GuardedStatsResolver,
        engagement: GuardedEngagementService,
        connection_manager: GuardedConnectionManager,
        scheduler_handle: SchedulerHandle,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            stores,
            chart_builder,
            stats_resolver,
            engagement,
            connection_manager,
            scheduler_handle,
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for MediaStores {
    fn from_ref(input: &ServerState) -> Self {
        input.stores.clone()
    }
}

impl FromRef<ServerState> for GuardedChartBuilder {
    fn from_ref(input: &ServerState) -> Self {
        input.chart_builder.clone()
    }
}

impl FromRef<ServerState> for GuardedStatsResolver {
    fn from_ref(input: &ServerState) -> Self {
        input.stats_resolver.clone()
    }
}

impl FromRef<ServerState> for GuardedEngagementService {
    fn from_ref(input: &ServerState) -> Self {
        input.engagement.clone()
    }
}

impl FromRef<ServerState> for GuardedConnectionManager {
    fn from_ref(input: &ServerState) -> Self {
        input.connection_manager.clone()
    }
}

impl FromRef<ServerState> for SchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}
