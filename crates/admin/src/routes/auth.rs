//! Admin sign-in route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use kala_core::redirect::safe_return_url;
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAdminAuth, clear_current_admin, set_current_admin, stash_return_url, take_return_url,
};
use crate::models::{CurrentAdmin, session_keys};
use crate::product_form::ProductDraft;
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Login page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
    /// Set when the API rejected the previous token.
    pub expired: Option<String>,
}

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Display the login page.
#[instrument(skip(session, admin))]
pub async fn login_page(
    session: Session,
    OptionalAdminAuth(admin): OptionalAdminAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if admin.is_some() {
        return Ok(Redirect::to(&safe_return_url(query.redirect.as_deref())).into_response());
    }
    if let Some(target) = query.redirect.as_deref() {
        stash_return_url(&session, target).await?;
    }

    Ok(LoginTemplate {
        layout: Layout::load(&session, None, "/login").await,
        username: String::new(),
        error: None,
        notice: query
            .expired
            .is_some()
            .then(|| "Your session has expired. Please sign in again.".to_owned()),
    }
    .into_response())
}

async fn login_failed(session: &Session, username: String, error: &str) -> Response {
    let page = LoginTemplate {
        layout: Layout::load(session, None, "/login").await,
        username,
        error: Some(error.to_owned()),
        notice: None,
    };
    (StatusCode::UNAUTHORIZED, page).into_response()
}

/// Check the credentials with the API and start the admin session.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let username = form.username.trim().to_owned();
    let password = SecretString::from(form.password);

    if username.is_empty() {
        return Ok(login_failed(&session, username, "Enter your username and password.").await);
    }

    let login = match state.api().login(&username, &password).await {
        Ok(login) => login,
        Err(e @ (ApiError::Unauthorized | ApiError::Forbidden)) => {
            tracing::info!(error = %e, username = %username, "Admin login rejected");
            return Ok(login_failed(&session, username, "Invalid username or password.").await);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Admin login failed");
            return Ok(login_failed(&session, username, &e.user_message()).await);
        }
    };

    let admin = CurrentAdmin {
        token: SecretString::from(login.token),
        role: login.role,
        username,
    };
    set_current_admin(&session, &admin).await?;
    set_sentry_user(&admin.username);
    tracing::info!(username = %admin.username, role = %admin.role, "Admin signed in");

    let target = safe_return_url(take_return_url(&session).await?.as_deref());
    Ok(Redirect::to(&target).into_response())
}

/// Sign out and drop any unsaved product form.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_admin(&session).await?;
    session
        .remove::<ProductDraft>(session_keys::PRODUCT_DRAFT)
        .await?;
    clear_sentry_user();
    Ok(Redirect::to("/login"))
}
