pub mod auth_backend;
pub mod auth_error;
pub mod token_auth;

pub use auth_backend::{AllowAll, AuthBackend};
pub use auth_error::AuthError;
pub use token_auth::TokenAuth;
