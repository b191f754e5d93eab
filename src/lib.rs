//! Quarterly financial-report metrics and listed-company profiles for the
//! Shanghai and Shenzhen exchanges, scraped from public finance pages and
//! normalised into fixed-schema tables.

pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod scraper;
pub mod service;
pub mod utils;

pub use error::{FetchError, Result};
pub use models::{ColumnSchema, Dataset, ReportQuery, ResultTable, TableShape, Value};
pub use scraper::RetryPolicy;
pub use service::StockInfo;
