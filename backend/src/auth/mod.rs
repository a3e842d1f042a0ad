//! Authentication module for registration, login and token checks.
//!
//! This module provides the public interface the routing layer calls into.
//! Transport concerns stay outside this crate.

pub mod models;
pub mod service;

// Re-exports for convenience
pub use models::{AuthenticatedIdentity, LoginRequest, RegisterRequest, Registered, TokenResponse};
pub use service::AuthService;
