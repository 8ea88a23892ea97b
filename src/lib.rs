pub mod calculator;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod prices;
pub mod raw;
pub mod repository;
