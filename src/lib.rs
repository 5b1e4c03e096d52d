//! Charts Server Library
//!
//! Trending charts, engagement tracking and live updates for a media catalog.

pub mod background_jobs;
pub mod catalog;
pub mod charts;
pub mod config;
pub mod engagement;
pub mod realtime;
pub mod server;
pub mod sqlite_persistence;

pub use catalog::{ContentType, SqliteMediaStore};
pub use charts::{ChartBuilder, SqliteChartStore};
pub use server::{run_server, RequestsLoggingLevel};
