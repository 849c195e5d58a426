pub mod metrics;
pub mod views;
