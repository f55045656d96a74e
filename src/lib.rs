// src/lib.rs
pub mod aggregate;
pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod news;
pub mod portfolio;
pub mod render;
pub mod session;
pub mod view;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use session::Session;
