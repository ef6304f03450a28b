//! Common utilities and shared types for clubhub.
//!
//! This crate provides foundational components used across all clubhub crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//!
//! # Example
//!
//! ```no_run
//! use clubhub_common::{AppResult, Config};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Backend: {}", config.backend.base_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
