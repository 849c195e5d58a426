pub mod metrics;
pub mod resources;
pub mod summary;
