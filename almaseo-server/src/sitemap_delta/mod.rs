//! Sitemap delta tracking and IndexNow pings
//!
//! Content changes push the item URL into a bounded recency ring. The ring
//! backs a "recently changed" feed and the URL list sent to IndexNow.

pub mod indexnow;
pub mod ring;
pub mod tracker;

pub use indexnow::{IndexNowClient, IndexNowConfig, IndexNowError, IndexNowSubmission};
pub use ring::{DeltaEntry, DeltaRing};
pub use tracker::DeltaTracker;
