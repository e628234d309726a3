pub mod config;
pub mod processor;
