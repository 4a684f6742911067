//! Exporter self-monitoring.
//!
//! Unlike the database collectors these metrics are not produced by a query;
//! the collection cycle records them around every collector run.

mod scraper;

pub use scraper::{ScrapeTimer, ScraperCollector};
