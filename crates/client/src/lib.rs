//! HTTP client for the club REST backend.
//!
//! [`BackendClient`] implements [`clubhub_core::ClubBackend`] over `reqwest`
//! and maps backend responses onto [`clubhub_common::AppError`].

pub mod client;
pub mod error;

pub use client::BackendClient;
pub use error::BackendError;
