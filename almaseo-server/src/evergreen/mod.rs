//! Evergreen content scoring
//!
//! Classifies published content as evergreen, watch or stale from its age,
//! 90-day traffic trend and seasonal markers, and keeps the results current
//! with a paginated batch scheduler.

pub mod age;
pub mod dashboard;
pub mod scheduler;
pub mod scoring;
pub mod seasonal;
pub mod settings;
pub mod store;
pub mod traffic;
pub mod trend;

pub use dashboard::{DashboardCache, DashboardStats};
pub use scheduler::{BatchError, BatchReport, BatchScheduler, BatchTrigger};
pub use scoring::EvergreenStatus;
pub use settings::EvergreenSettings;
pub use traffic::{SqliteTrafficSource, TrafficSource};
