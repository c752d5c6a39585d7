pub mod apis;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
