//! Medicine listing aggregator for Indian online pharmacies
//!
//! Searches PharmEasy, Tata 1mg and Amazon India, normalizes whatever each
//! retailer currently serves into one record shape, and ranks the results:
//! - Structured data (JSON APIs, embedded JSON, inline JavaScript state)
//! - CSS selector fallbacks over product cards
//! - Degraded link scraping when the markup has drifted
//!
//! Also keeps per-user search history and turns recurring medicine doses into
//! scheduled notifications (SQLite).

pub mod aggregator;
pub mod config;
pub mod details;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod ranking;
pub mod scheduler;
pub mod sources;
pub mod store;

pub use aggregator::Aggregator;
pub use config::Settings;
pub use details::{product_details, ProductDetails};
pub use error::{ConfigError, FetchError, ScheduleError, SourceError, StoreError};
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use model::{ProductRecord, QueryContext, Source};
pub use scheduler::{expand, DoseSpec};
pub use store::{NewDose, NewRoutine, NotificationStatus, NotificationView, SearchHistory, Store};
