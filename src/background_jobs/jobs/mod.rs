mod chart_refresh;

pub use chart_refresh::ChartRefreshJob;
