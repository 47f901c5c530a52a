//! Authentication layer: password hashing, CSRF protection, and identity interceptors.

pub mod csrf;
pub mod middleware;
pub mod password;
pub mod token;

pub use csrf::{CsrfGuard, CsrfToken};
pub use middleware::{AppState, AuthContext, Authenticate, RequireAuthentication};
pub use password::PasswordHasher;
pub use token::generate_token;
