//! HTTP access to the remote authentication endpoint.
//!
//! This module provides the `HttpBaseSession`, the plain authentication
//! client that `AuthSession` wraps, and the `ApiError` status mapping.

pub mod client;
pub mod error;

pub use client::HttpBaseSession;
pub use error::ApiError;
