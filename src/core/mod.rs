pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod executor;
pub mod export;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod terminal;
