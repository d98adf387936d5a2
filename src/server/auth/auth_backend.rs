use crate::server::auth::AuthError;

/// Trait for pluggable connection authentication.
pub trait AuthBackend: Send + Sync {
    /// Whether connections must `AUTH` before anything else.
    fn is_required(&self) -> bool;

    fn verify(&self, token: &str) -> Result<(), AuthError>;
}

/// Backend used when no tokens are configured: everything is let through.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AuthBackend for AllowAll {
    fn is_required(&self) -> bool {
        false
    }

    fn verify(&self, _token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}
