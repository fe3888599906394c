pub mod catalog;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod listing;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
