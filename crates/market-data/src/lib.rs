pub mod indicators;
mod offline;
mod polygon;

pub use offline::OfflineProvider;
pub use polygon::{DailyBar, PolygonClient, TickerDetails};
