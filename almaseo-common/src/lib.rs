//! # AlmaSEO Common Library
//!
//! Shared code for the AlmaSEO services including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Database initialization, migrations and settings access
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
