//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT)
//! - Rate limiting

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use rate_limit::{
    api_rate_limit_config, auth_rate_limit_config, create_rate_limit_state, rate_limit_middleware,
    spawn_rate_limit_cleanup, RateLimitState,
};
