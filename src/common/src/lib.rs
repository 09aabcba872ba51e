pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod model;
pub mod storage;

pub use database::Database;
