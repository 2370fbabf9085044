//! Shared configuration and error types for the Paciolus client.
//!
//! This crate provides the pieces every other crate leans on:
//! - Layered configuration (files, `.env`, environment variables)
//! - The application error taxonomy and its HTTP status mapping

pub mod config;
pub mod error;

pub use config::{ApiConfig, AppConfig, CacheConfig, EndpointTtl, RetryConfig, path_matches};
pub use error::{AppError, AppResult};
