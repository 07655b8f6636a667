//! docbits PDF Encoding Service
//!
//! Extracts the raster images and page text of a PDF, normalizes each to a
//! fixed shape, and stores the concatenation as a deterministic bit-string
//! artifact that clients download later.

pub mod config;
pub mod encoding;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
