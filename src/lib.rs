pub mod bot;
pub mod config;
pub mod database;
pub mod engine;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod swagger;

pub use config::Config;
pub use error::{AppError, AppResult};
