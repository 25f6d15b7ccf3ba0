//! Client-side session management for a real-time connected application.
//!
//! - [`auth`]: authentication session, expiry evaluation, single-flight
//!   refresh and persistent credential storage
//! - [`api`]: HTTP base session for the authentication endpoint
//! - [`connection`]: connection lifecycle events and status
//! - [`client`]: facade tying the above together
//! - [`config`]: on-disk configuration

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod connection;

pub use client::{ServiceHandle, SessionClient};
pub use config::{Config, StoreBackend};
