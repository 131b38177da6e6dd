pub mod apis;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod parsing;
pub mod server;
pub mod tasks;
pub mod types;
