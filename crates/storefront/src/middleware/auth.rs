//! Authentication middleware and extractors.
//!
//! The customer is "signed in" when the session holds an API bearer token.
//! Nothing here validates the token; the API does that, and handlers react
//! to its 401 by calling [`expire_session`].

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use kala_core::PhoneNumber;
use kala_core::redirect::is_safe_return_url;
use secrecy::SecretString;
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Login page shown after the API rejected a token.
pub const EXPIRED_LOGIN_PATH: &str = "/auth/login?expired=1";

/// Extractor that requires a signed-in customer.
///
/// If the customer is not signed in, a `GET` request's path is stashed as the
/// post-login return URL and the browser is redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(customer): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.phone.map(|p| p.masked()).unwrap_or_default())
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Error returned when authentication is required but the customer is not signed in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for fragment and event-stream requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Path and query the browser asked for.
///
/// Inside a nested router `parts.uri` has the mount prefix stripped, so the
/// original URI is preferred.
fn requested_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0);
    uri.path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        if let Some(customer) = current_customer(session).await {
            return Ok(Self(customer));
        }

        if parts.method == Method::GET {
            let target = requested_path(parts);
            if let Err(e) = stash_return_url(session, &target).await {
                tracing::warn!(error = %e, "Failed to stash return URL");
            }
        }

        Err(AuthRejection::RedirectToLogin)
    }
}

/// Extractor that optionally gets the current customer.
///
/// Unlike `RequireAuth`, this does not reject the request if the customer is
/// not signed in.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => current_customer(session).await,
            None => None,
        };

        Ok(Self(customer))
    }
}

async fn current_customer(session: &Session) -> Option<CurrentCustomer> {
    let token: String = session
        .get(session_keys::AUTH_TOKEN)
        .await
        .ok()
        .flatten()?;
    let phone: Option<PhoneNumber> = session
        .get(session_keys::CUSTOMER_PHONE)
        .await
        .ok()
        .flatten();

    Some(CurrentCustomer {
        token: SecretString::from(token),
        phone,
    })
}

/// Store the bearer token and phone after a successful sign-in.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    token: &str,
    phone: &PhoneNumber,
) -> Result<(), tower_sessions::session::Error> {
    // New privilege level, new session id
    session.cycle_id().await?;
    session.insert(session_keys::AUTH_TOKEN, token).await?;
    session.insert(session_keys::CUSTOMER_PHONE, phone).await
}

/// Helper to clear the current customer from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(session_keys::AUTH_TOKEN).await?;
    session
        .remove::<PhoneNumber>(session_keys::CUSTOMER_PHONE)
        .await?;
    Ok(())
}

/// Remember where to send the customer after signing in.
///
/// Unsafe targets are ignored.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn stash_return_url(
    session: &Session,
    target: &str,
) -> Result<(), tower_sessions::session::Error> {
    if is_safe_return_url(target) {
        session.insert(session_keys::LOGIN_REDIRECT, target).await?;
    }
    Ok(())
}

/// Take the stashed return URL, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_return_url(
    session: &Session,
) -> Result<Option<String>, tower_sessions::session::Error> {
    session.remove(session_keys::LOGIN_REDIRECT).await
}

/// The API rejected the token: drop it, remember `return_to`, and send the
/// customer to the login page with a session-expired notice.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn expire_session(
    session: &Session,
    return_to: &str,
) -> Result<Redirect, tower_sessions::session::Error> {
    clear_current_customer(session).await?;
    stash_return_url(session, return_to).await?;
    Ok(Redirect::to(EXPIRED_LOGIN_PATH))
}
