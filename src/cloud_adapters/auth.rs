//! Google OAuth tokens for the Sheets and Drive adapters.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;
use yup_oauth2::ServiceAccountAuthenticator;
use yup_oauth2::authenticator::DefaultAuthenticator;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Errors that can occur when obtaining credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The service-account key could not be read or parsed.
    InvalidCredentials(String),
    /// The token endpoint refused or could not be reached.
    TokenUnavailable(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials(e) => write!(f, "invalid service account key: {e}"),
            AuthError::TokenUnavailable(e) => write!(f, "unable to obtain access token: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Asynchronous bearer-token source used by the HTTP adapters.
pub trait TokenProvider: Send + Sync + 'static {
    fn token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>>;
}

impl TokenProvider for DefaultAuthenticator {
    fn token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            self.token(scopes)
                .await
                .map_err(|e| AuthError::TokenUnavailable(e.to_string()))?
                .token()
                .map(|t| t.to_string())
                .ok_or_else(|| AuthError::TokenUnavailable("missing token".into()))
        })
    }
}

impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn token<'a>(
        &'a self,
        scopes: &'a [&str],
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>> {
        (**self).token(scopes)
    }
}

/// Builds an authenticator from a service-account JSON key file.
pub async fn service_account_authenticator(
    path: impl AsRef<Path>,
) -> Result<DefaultAuthenticator, AuthError> {
    let path = path.as_ref();
    let key = yup_oauth2::read_service_account_key(path)
        .await
        .map_err(|e| AuthError::InvalidCredentials(format!("{}: {e}", path.display())))?;
    info!(client_email = %key.client_email, "Loaded service account key");
    ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|e| AuthError::InvalidCredentials(e.to_string()))
}
