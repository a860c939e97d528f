//! OTP sign-in route handlers.
//!
//! The flow state ([`SignInStep`]) lives in the session, so a reload lands
//! on the same step. While a verify call is out, the session holds
//! `Verifying` and the per-session [`VerifyGate`](crate::verify_gate::VerifyGate)
//! is claimed, so a second submit is turned away.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use kala_core::otp::OtpError;
use kala_core::redirect::safe_return_url;
use kala_core::{OtpCode, PhoneNumber, SignInStep};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAuth, cart_key, clear_current_customer, set_current_customer, set_flash,
    stash_return_url, take_return_url,
};
use crate::models::session_keys;
use crate::routes::layout::Layout;
use crate::state::AppState;

// =============================================================================
// Forms and Templates
// =============================================================================

/// Login page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Page to return to after signing in.
    pub redirect: Option<String>,
    /// Set when the API rejected the previous token.
    pub expired: Option<String>,
}

/// Phone step form data.
#[derive(Debug, Deserialize)]
pub struct SendCodeForm {
    pub phone: String,
}

/// Code step form data.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub code: String,
}

/// Login page template; shows the phone step or the code step.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub code_step: bool,
    /// Value to refill the phone input with.
    pub phone_input: String,
    pub masked_phone: String,
    /// Seconds until "resend" unlocks; 0 when it is available.
    pub resend_in: u64,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl LoginTemplate {
    async fn render(
        session: &Session,
        flow: &SignInStep,
        now: DateTime<Utc>,
        phone_input: String,
        error: Option<String>,
    ) -> Self {
        let layout = Layout::load(session, None).await;
        let challenge = flow.challenge();
        Self {
            layout,
            code_step: challenge.is_some(),
            phone_input,
            masked_phone: challenge.map(|c| c.phone.masked()).unwrap_or_default(),
            resend_in: challenge.map_or(0, |c| c.remaining_secs(now)),
            error,
            notice: None,
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_flow(session: &Session) -> Result<SignInStep> {
    Ok(session
        .get::<SignInStep>(session_keys::SIGN_IN_FLOW)
        .await?
        .unwrap_or_default())
}

async fn save_flow(session: &Session, flow: &SignInStep) -> Result<()> {
    session.insert(session_keys::SIGN_IN_FLOW, flow).await?;
    Ok(())
}

fn otp_error_message(err: &OtpError) -> String {
    match err {
        OtpError::CooldownActive { remaining_secs } => {
            format!("Please wait {remaining_secs} seconds before requesting a new code.")
        }
        OtpError::VerificationInFlight => "Your code is already being checked.".to_owned(),
        OtpError::NoCodeSent => "Enter your phone number first.".to_owned(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the login page at whatever step the session is on.
#[instrument(skip(session, customer))]
pub async fn login_page(
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if customer.is_some() {
        return Ok(Redirect::to(&safe_return_url(query.redirect.as_deref())).into_response());
    }
    if let Some(target) = query.redirect.as_deref() {
        stash_return_url(&session, target).await?;
    }

    let mut flow = load_flow(&session).await?;
    if flow == SignInStep::Authenticated {
        // Signed out since; start over
        flow = SignInStep::EnteringPhone;
        save_flow(&session, &flow).await?;
    }

    let mut page = LoginTemplate::render(&session, &flow, Utc::now(), String::new(), None).await;
    if query.expired.is_some() {
        page.notice = Some("Your session has expired. Please sign in again.".to_owned());
    }
    Ok(page.into_response())
}

/// Validate the phone number and ask the API to send a code.
#[instrument(skip(state, session, form))]
pub async fn send_code(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SendCodeForm>,
) -> Result<Response> {
    let now = Utc::now();
    let flow = load_flow(&session).await?;

    let phone = match PhoneNumber::parse(&form.phone) {
        Ok(phone) => phone,
        Err(e) => {
            let error = format!("Invalid phone number: {e}.");
            return Ok(LoginTemplate::render(&session, &flow, now, form.phone, Some(error))
                .await
                .into_response());
        }
    };

    if let Err(e) = state.api().send_code(&phone).await {
        tracing::warn!(error = %e, "Failed to send code");
        return Ok(
            LoginTemplate::render(&session, &flow, now, form.phone, Some(e.user_message()))
                .await
                .into_response(),
        );
    }

    save_flow(&session, &SignInStep::code_sent(phone, now)).await?;
    // Verify submits are gated on this key
    cart_key(&session).await?;
    Ok(Redirect::to("/auth/login").into_response())
}

/// Send another code once the cooldown has passed.
#[instrument(skip(state, session))]
pub async fn resend_code(State(state): State<AppState>, session: Session) -> Result<Response> {
    let now = Utc::now();
    let flow = load_flow(&session).await?;

    let phone = match flow.check_resend(now) {
        Ok(phone) => phone.clone(),
        Err(OtpError::NoCodeSent) => return Ok(Redirect::to("/auth/login").into_response()),
        Err(e) => {
            let error = otp_error_message(&e);
            return Ok(LoginTemplate::render(&session, &flow, now, String::new(), Some(error))
                .await
                .into_response());
        }
    };

    if let Err(e) = state.api().send_code(&phone).await {
        tracing::warn!(error = %e, "Failed to resend code");
        return Ok(
            LoginTemplate::render(&session, &flow, now, String::new(), Some(e.user_message()))
                .await
                .into_response(),
        );
    }

    match flow.resent(now) {
        Ok(flow) => save_flow(&session, &flow).await?,
        Err(e) => tracing::warn!(error = %e, "Resend state changed underneath"),
    }
    set_flash(&session, "A new code has been sent.").await;
    Ok(Redirect::to("/auth/login").into_response())
}

/// Check the code with the API and sign the customer in.
#[instrument(skip(state, session, form))]
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<VerifyForm>,
) -> Result<Response> {
    let now = Utc::now();
    let flow = load_flow(&session).await?;
    let key = cart_key(&session).await?;

    let code = match OtpCode::parse(&form.code) {
        Ok(code) => code,
        Err(e) => {
            let error = format!("Invalid code: {e}.");
            return Ok(LoginTemplate::render(&session, &flow, now, String::new(), Some(error))
                .await
                .into_response());
        }
    };

    let Some(permit) = state.verify_gate().try_claim(&key).await else {
        let error = otp_error_message(&OtpError::VerificationInFlight);
        return Ok(LoginTemplate::render(&session, &flow, now, String::new(), Some(error))
            .await
            .into_response());
    };

    let verifying = match flow.clone().begin_verify(now) {
        Ok(verifying) => verifying,
        Err(OtpError::NoCodeSent) => return Ok(Redirect::to("/auth/login").into_response()),
        Err(e) => {
            let error = otp_error_message(&e);
            return Ok(LoginTemplate::render(&session, &flow, now, String::new(), Some(error))
                .await
                .into_response());
        }
    };
    save_flow(&session, &verifying).await?;
    session.save().await?;

    let Some(phone) = verifying.challenge().map(|c| c.phone.clone()) else {
        return Ok(Redirect::to("/auth/login").into_response());
    };

    let verified = state.api().verify_code(&phone, &code).await;
    permit.release().await;
    let token = match verified {
        Ok(token) => token,
        Err(e) => {
            tracing::info!(error = %e, "Code rejected");
            let flow = verifying.verify_failed();
            save_flow(&session, &flow).await?;
            return Ok(
                LoginTemplate::render(&session, &flow, now, String::new(), Some(e.user_message()))
                    .await
                    .into_response(),
            );
        }
    };

    set_current_customer(&session, &token.token, &phone).await?;
    save_flow(&session, &SignInStep::Authenticated).await?;
    set_sentry_user(&phone);
    tracing::info!(phone = %phone.masked(), "Customer signed in");

    let token = secrecy::SecretString::from(token.token);
    state.cart().refresh(&key, Some(&token)).await;

    let target = safe_return_url(take_return_url(&session).await?.as_deref());
    Ok(Redirect::to(&target).into_response())
}

/// Go back to the phone step.
#[instrument(skip(session))]
pub async fn change_phone(session: Session) -> Result<Redirect> {
    save_flow(&session, &SignInStep::change_phone()).await?;
    Ok(Redirect::to("/auth/login"))
}

/// Sign out: drop the token and the cart snapshot.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    clear_current_customer(&session).await?;
    session
        .remove::<SignInStep>(session_keys::SIGN_IN_FLOW)
        .await?;
    let key = cart_key(&session).await?;
    state.cart().clear(&key).await;
    clear_sentry_user();

    Ok(Redirect::to("/"))
}
