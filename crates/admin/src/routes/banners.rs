//! Banner management route handlers.
//!
//! One page per banner kind. Uploading and toggling need an editor role;
//! deleting needs a super admin.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use kala_core::models::Banner;
use kala_core::{BannerId, BannerKind};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{
    RequireAdminAuth, RequireEditor, RequireSuperAdmin, expire_session, set_flash,
};
use crate::routes::layout::Layout;
use crate::routes::multipart::MultipartForm;
use crate::routes::redirect_after_failure;
use crate::state::AppState;

fn parse_kind(raw: &str) -> Result<BannerKind> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("banner kind {raw}")))
}

fn kind_path(kind: BannerKind) -> String {
    format!("/banners/{}", kind.slug())
}

/// A banner tile.
#[derive(Debug, Clone)]
pub struct BannerView {
    pub id: String,
    pub image: String,
    pub link: Option<String>,
    pub is_active: bool,
    /// Upload date, blank when the API does not say.
    pub created_at: String,
    pub status_action: String,
    pub delete_action: String,
}

impl BannerView {
    fn new(kind: BannerKind, banner: &Banner) -> Self {
        let base = format!(
            "{}/{}",
            kind_path(kind),
            urlencoding::encode(banner.id.as_str())
        );
        Self {
            id: banner.id.to_string(),
            image: banner.image.clone(),
            link: banner.link.clone().filter(|l| !l.is_empty()),
            is_active: banner.is_active,
            created_at: banner
                .created_at
                .map(|at: DateTime<Utc>| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status_action: format!("{base}/status"),
            delete_action: format!("{base}/delete"),
        }
    }
}

/// Banner list template.
#[derive(Template, WebTemplate)]
#[template(path = "banners/list.html")]
pub struct BannerListTemplate {
    pub layout: Layout,
    pub title: &'static str,
    pub action: String,
    pub banners: Vec<BannerView>,
    pub error: Option<String>,
}

/// Show/hide form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub active: bool,
}

/// Display the banners of one kind.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(kind): Path<String>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    let path = kind_path(kind);

    let (banners, error) = match state.api().get_admin_banners(&admin.token, kind).await {
        Ok(banners) => (
            banners.iter().map(|b| BannerView::new(kind, b)).collect(),
            None,
        ),
        Err(e) if e.is_unauthorized() => {
            return Ok(expire_session(&session, &path).await?.into_response());
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = kind.slug(), "Failed to load banners");
            (Vec::new(), Some(e.user_message()))
        }
    };

    Ok(BannerListTemplate {
        layout: Layout::load(&session, Some(&admin), &path).await,
        title: kind.title(),
        action: path,
        banners,
        error,
    }
    .into_response())
}

/// Upload new banner images.
#[instrument(skip(state, session, admin, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    let path = kind_path(kind);

    let body = MultipartForm::read(multipart, "images", state.config().max_upload_bytes).await?;
    let mut notices = body.rejected;

    if body.files.is_empty() {
        notices.push("Choose at least one image.".to_owned());
        set_flash(&session, notices.join(" ")).await;
        return Ok(Redirect::to(&path).into_response());
    }

    let count = body.files.len();
    if let Err(e) = state
        .api()
        .create_banner(&admin.token, kind, &body.files)
        .await
    {
        return redirect_after_failure(&session, &e, &path).await;
    }

    tracing::info!(kind = kind.slug(), count, admin = %admin.username, "Banners uploaded");
    notices.insert(0, format!("Uploaded {count} image(s)."));
    set_flash(&session, notices.join(" ")).await;
    Ok(Redirect::to(&path).into_response())
}

/// Show or hide a banner.
#[instrument(skip(state, session, admin, form))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path((kind, id)): Path<(String, String)>,
    Form(form): Form<StatusForm>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    let path = kind_path(kind);
    let banner_id = BannerId::new(id);

    if let Err(e) = state
        .api()
        .update_banner_status(&admin.token, kind, &banner_id, form.active)
        .await
    {
        return redirect_after_failure(&session, &e, &path).await;
    }

    set_flash(
        &session,
        if form.active {
            "Banner is now shown."
        } else {
            "Banner is now hidden."
        },
    )
    .await;
    Ok(Redirect::to(&path).into_response())
}

/// Delete a banner.
#[instrument(skip(state, session, admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Response> {
    let kind = parse_kind(&kind)?;
    let path = kind_path(kind);
    let banner_id = BannerId::new(id);

    if let Err(e) = state
        .api()
        .delete_banner(&admin.token, kind, &banner_id)
        .await
    {
        return redirect_after_failure(&session, &e, &path).await;
    }

    tracing::info!(kind = kind.slug(), banner_id = %banner_id, admin = %admin.username, "Banner deleted");
    set_flash(&session, "Banner deleted.").await;
    Ok(Redirect::to(&path).into_response())
}
