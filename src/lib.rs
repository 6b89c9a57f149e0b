pub mod assistant;
pub mod config;
pub mod orchestration;
pub mod platform;
pub mod shared;
pub mod workflow;
