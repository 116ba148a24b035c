//! HTTP API handlers

pub mod evergreen;
pub mod health;
pub mod not_found;
pub mod posts;
pub mod sitemap;

pub use evergreen::evergreen_routes;
pub use health::health_routes;
pub use not_found::not_found_routes;
pub use posts::posts_routes;
pub use sitemap::sitemap_routes;
