//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases in a temp dir.

use super::constants::*;
use super::fixtures::{seed_catalog, SeededCatalog};
use charts_server::background_jobs::{create_scheduler, JobContext};
use charts_server::catalog::{MediaStores, SqliteMediaStore};
use charts_server::charts::{
    rebuild_channel, ChartBuilder, ItemStatsResolver, SqliteChartStore,
};
use charts_server::config::ChartSettings;
use charts_server::engagement::EngagementService;
use charts_server::realtime::{Broadcaster, ConnectionManager};
use charts_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases
///
/// When dropped, the server and its rebuild worker shut down and the temp
/// directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub port: u16,

    /// Ids of the seeded catalog
    pub catalog: SeededCatalog,

    /// Direct database access for assertions
    pub media_store: Arc<SqliteMediaStore>,
    pub chart_store: Arc<SqliteChartStore>,

    _temp_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the databases cannot be created, the port cannot be bound,
    /// or the server does not become ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let media_store = Arc::new(
            SqliteMediaStore::new(temp_dir.path().join("media.db"))
                .expect("Failed to open media store"),
        );
        let chart_store = Arc::new(
            SqliteChartStore::new(temp_dir.path().join("charts.db"))
                .expect("Failed to open chart store"),
        );
        let catalog = seed_catalog(&media_store).expect("Failed to seed catalog");
        let stores = MediaStores::new(media_store.clone());

        let settings = ChartSettings::default();
        let connection_manager = Arc::new(ConnectionManager::with_queue_capacity(
            settings.fanout_queue_capacity(),
        ));
        connection_manager.start().await;

        let chart_builder = Arc::new(ChartBuilder::new(
            stores.clone(),
            chart_store.clone(),
            connection_manager.clone(),
            settings.clone(),
        ));
        let stats_resolver = Arc::new(ItemStatsResolver::new(
            stores.clone(),
            chart_store.clone(),
            chart_builder.scorer(),
            settings.clone(),
        ));

        let shutdown = CancellationToken::new();
        let (trigger, worker) = rebuild_channel(
            chart_builder.clone(),
            Duration::from_secs(settings.rebuild_cooldown_secs),
            shutdown.child_token(),
        );
        tokio::spawn(worker.run());

        let engagement = Arc::new(EngagementService::new(
            stores.clone(),
            trigger,
            connection_manager.clone(),
        ));

        // The scheduler is not run: chart refreshes come from requests only.
        let job_context = JobContext::new(
            shutdown.child_token(),
            tokio::runtime::Handle::current(),
            chart_builder.clone(),
        );
        let (_scheduler, scheduler_handle) = create_scheduler(shutdown.child_token(), job_context);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            frontend_dir_path: None,
        };
        let app = make_app(ServerState::new(
            config,
            stores,
            chart_builder,
            stats_resolver,
            engagement,
            connection_manager.clone(),
            scheduler_handle,
        ));

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    server_shutdown.cancelled().await;
                    connection_manager.stop().await;
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog,
            media_store,
            chart_store,
            _temp_dir: temp_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    pub fn ws_url(&self) -> String {
        self.base_url.replace("http://", "ws://") + "/v1/ws"
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
