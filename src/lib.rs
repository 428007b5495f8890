pub mod config;
pub mod database;
pub mod diff;
pub mod export;
pub mod fetchers;
pub mod models;
pub mod parsers;
pub mod utils;
pub mod watchtower;
