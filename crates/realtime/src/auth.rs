use async_trait::async_trait;
use parley_auth::{AuthError, Authenticator};

use crate::handle::UserId;

/// Resolves a bearer credential to the user it belongs to.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}

#[async_trait]
impl SessionAuthenticator for Authenticator {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let (user, _session) = self.authenticate_token(token).await?;
        Ok(user.public_id)
    }
}
