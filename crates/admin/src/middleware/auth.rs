//! Authentication middleware and extractors for admin.
//!
//! Provides extractors for requiring admin authentication in route handlers.
//! The session only remembers the token the API issued; the API validates
//! it, and handlers react to its 401 by calling [`expire_session`].

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use kala_core::AdminRole;
use kala_core::redirect::is_safe_return_url;
use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};

/// Login page.
pub const LOGIN_PATH: &str = "/login";

/// Login page shown after the API rejected a token.
pub const EXPIRED_LOGIN_PATH: &str = "/login?expired=1";

/// Extractor that requires admin authentication.
///
/// If the admin is not logged in, a `GET` request's path is stashed as the
/// post-login return URL and the browser is redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.username)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Error returned when admin authentication is required but the user is not logged in.
pub enum AdminAuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// No session layer; nothing to redirect with.
    Unauthorized,
    /// Signed in, but the role does not allow this.
    Forbidden(&'static str),
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
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

async fn require_admin(parts: &Parts) -> Result<CurrentAdmin, AdminAuthRejection> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::Unauthorized)?;

    if let Some(admin) = current_admin(session).await {
        return Ok(admin);
    }

    if parts.method == Method::GET {
        let target = requested_path(parts);
        if let Err(e) = stash_return_url(session, &target).await {
            tracing::warn!(error = %e, "Failed to stash return URL");
        }
    }

    Err(AdminAuthRejection::RedirectToLogin)
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_admin(parts).await.map(Self)
    }
}

/// Extractor that optionally gets the current admin.
///
/// Unlike `RequireAdminAuth`, this does not reject the request if the admin is not logged in.
pub struct OptionalAdminAuth(pub Option<CurrentAdmin>);

impl<S> FromRequestParts<S> for OptionalAdminAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = match parts.extensions.get::<Session>() {
            Some(session) => current_admin(session).await,
            None => None,
        };

        Ok(Self(admin))
    }
}

/// Extractor that requires a role allowed to change data.
///
/// Viewers get 403 Forbidden.
pub struct RequireEditor(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireEditor
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = require_admin(parts).await?;
        if !admin.role.can_write() {
            return Err(AdminAuthRejection::Forbidden(
                "Your role can only view this panel",
            ));
        }
        Ok(Self(admin))
    }
}

/// Extractor that requires super admin authentication.
///
/// If the admin is not logged in, redirects to login.
/// If the admin is not a super admin, returns 403 Forbidden.
pub struct RequireSuperAdmin(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = require_admin(parts).await?;
        if admin.role != AdminRole::SuperAdmin {
            return Err(AdminAuthRejection::Forbidden(
                "Only super admins can do this",
            ));
        }
        Ok(Self(admin))
    }
}

async fn current_admin(session: &Session) -> Option<CurrentAdmin> {
    let token: String = session
        .get(session_keys::ADMIN_TOKEN)
        .await
        .ok()
        .flatten()?;
    let role: AdminRole = session
        .get(session_keys::ADMIN_ROLE)
        .await
        .ok()
        .flatten()?;
    let username: String = session
        .get(session_keys::ADMIN_USERNAME)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    Some(CurrentAdmin {
        token: SecretString::from(token),
        role,
        username,
    })
}

/// Helper to set the current admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    // New privilege level, new session id
    session.cycle_id().await?;
    session
        .insert(session_keys::ADMIN_TOKEN, admin.token.expose_secret())
        .await?;
    session.insert(session_keys::ADMIN_ROLE, admin.role).await?;
    session
        .insert(session_keys::ADMIN_USERNAME, &admin.username)
        .await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<String>(session_keys::ADMIN_TOKEN).await?;
    session.remove::<AdminRole>(session_keys::ADMIN_ROLE).await?;
    session
        .remove::<String>(session_keys::ADMIN_USERNAME)
        .await?;
    Ok(())
}

/// Remember where to send the admin after signing in.
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
    if is_safe_return_url(target) && !target.starts_with(LOGIN_PATH) {
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

/// The API rejected the token: sign out, remember `return_to`, and send the
/// admin to the login page with a session-expired notice.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn expire_session(
    session: &Session,
    return_to: &str,
) -> Result<Redirect, tower_sessions::session::Error> {
    clear_current_admin(session).await?;
    stash_return_url(session, return_to).await?;
    Ok(Redirect::to(EXPIRED_LOGIN_PATH))
}
