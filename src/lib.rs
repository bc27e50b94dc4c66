pub mod config;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod runner;
