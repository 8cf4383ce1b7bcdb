//! Authentication and authorization module
//!
//! - Token issuance and verification
//! - Password hashing with Argon2
//! - Authorization middleware with identity re-resolution
//! - Authentication service for the credential lifecycle

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use jwt::{issue_token, verify_token, Claims, JwtConfig, TokenError};
pub use middleware::{auth_middleware, optional_auth_middleware, AuthenticatedUser};
pub use models::{AuthResponse, MessageResponse, UserPublic, UserResponse};
pub use password::{PasswordConfig, PasswordError, PasswordHasherService};
pub use service::{AuthError, AuthService, Session};
