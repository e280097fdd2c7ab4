pub mod config;
pub mod domain;
pub mod pipeline;
pub mod predictor;
pub mod providers;
pub mod store;
pub mod telemetry;
