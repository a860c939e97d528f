//! Product management route handlers.
//!
//! The create and edit forms post back to themselves. Each post is turned
//! into [`ProductAction`]s and applied to the draft kept in the session;
//! only the `save` intent calls the API. Picked files are parked in the
//! upload store and previewed from `/products/uploads/{id}` until then.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use kala_core::models::{Category, CategoryRef, FieldKind, Product};
use kala_core::{DiscountKind, PageRequest, ProductId};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::ApiError;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireEditor, expire_session, set_flash};
use crate::models::{CurrentAdmin, session_keys};
use crate::product_form::{
    FieldError, ImageSlot, ProductAction, ProductDraft, VariantDraft,
};
use crate::routes::layout::{Layout, PagerView};
use crate::routes::multipart::MultipartForm;
use crate::routes::redirect_after_failure;
use crate::state::AppState;

/// Products per list page.
const PAGE_SIZE: u32 = 20;

fn form_path(product_id: Option<&ProductId>) -> String {
    match product_id {
        Some(id) => format!("/products/{}/edit", urlencoding::encode(id.as_str())),
        None => "/products/new".to_owned(),
    }
}

// =============================================================================
// View Models
// =============================================================================

/// One row of the product table.
#[derive(Debug, Clone)]
pub struct ProductRowView {
    pub edit_href: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub stock: i64,
    pub category: String,
    pub labels: Vec<String>,
}

impl From<&Product> for ProductRowView {
    fn from(product: &Product) -> Self {
        Self {
            edit_href: form_path(Some(&product.id)),
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            price: product.pricing().final_price.to_string(),
            stock: product.stock,
            category: match &product.category {
                Some(CategoryRef::Object { name: Some(name), .. }) => name.clone(),
                Some(category) => category.id().to_string(),
                None => String::new(),
            },
            labels: product.labels.clone(),
        }
    }
}

/// A `<select>` option.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// A category-specific input.
#[derive(Debug, Clone)]
pub struct FieldInputView {
    pub name: String,
    pub label: String,
    /// `text`, `number` or `select`.
    pub kind: &'static str,
    pub value: String,
    pub options: Vec<OptionView>,
    pub required: bool,
    pub error: Option<String>,
}

/// A variant row.
#[derive(Debug, Clone)]
pub struct VariantRowView {
    pub index: usize,
    pub name: String,
    pub sku: String,
    pub price: String,
    pub stock: String,
    pub errors: Vec<String>,
}

/// An image tile.
#[derive(Debug, Clone)]
pub struct ImageTileView {
    pub index: usize,
    pub src: String,
    pub caption: String,
    pub primary: bool,
    pub pending: bool,
}

/// Everything the product form shows.
#[derive(Debug, Clone)]
pub struct ProductFormView {
    pub action: String,
    pub is_new: bool,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub discount: String,
    pub discount_kinds: Vec<OptionView>,
    pub categories: Vec<OptionView>,
    pub fields: Vec<FieldInputView>,
    pub labels: Vec<String>,
    pub variants: Vec<VariantRowView>,
    pub images: Vec<ImageTileView>,
    /// Errors keyed by top-level input name.
    pub errors: BTreeMap<String, String>,
    /// Errors with no input of their own.
    pub general_errors: Vec<String>,
}

impl ProductFormView {
    fn build(
        draft: &ProductDraft,
        categories: &[Category],
        errors: Vec<FieldError>,
        general_errors: Vec<String>,
    ) -> Self {
        let mut by_field: BTreeMap<String, String> = BTreeMap::new();
        for error in errors {
            by_field.entry(error.field).or_insert(error.message);
        }
        let variant_errors = |i: usize| -> Vec<String> {
            ["name", "price", "stock"]
                .iter()
                .filter_map(|part| by_field.get(&format!("variants[{i}].{part}")).cloned())
                .collect()
        };

        let mut categories: Vec<OptionView> = categories
            .iter()
            .map(|c| OptionView {
                value: c.id.to_string(),
                label: c.name.clone(),
                selected: draft.category_id.as_ref() == Some(&c.id),
            })
            .collect();
        // Keep a category the list no longer offers selectable
        if let Some(id) = &draft.category_id
            && !categories.iter().any(|c| c.selected)
        {
            categories.push(OptionView {
                value: id.to_string(),
                label: id.to_string(),
                selected: true,
            });
        }

        let primary = draft.images.primary();
        let images = draft
            .images
            .slots()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                ImageSlot::Existing(image) => ImageTileView {
                    index,
                    src: image.url.clone(),
                    caption: String::new(),
                    primary: index == primary,
                    pending: false,
                },
                ImageSlot::Upload(upload) => ImageTileView {
                    index,
                    src: format!("/products/uploads/{}", upload.upload_id),
                    caption: upload.file_name.clone(),
                    primary: index == primary,
                    pending: true,
                },
            })
            .collect();

        Self {
            action: form_path(draft.product_id.as_ref()),
            is_new: draft.product_id.is_none(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price.clone(),
            stock: draft.stock.clone(),
            discount: draft.discount.clone(),
            discount_kinds: [
                (DiscountKind::Percent, "percent", "Percent"),
                (DiscountKind::Amount, "amount", "Toman off"),
            ]
            .into_iter()
            .map(|(kind, value, label)| OptionView {
                value: value.to_owned(),
                label: label.to_owned(),
                selected: draft.discount_kind == kind,
            })
            .collect(),
            categories,
            fields: draft
                .fields
                .iter()
                .map(|field| {
                    let definition = &field.definition;
                    let name = format!("field.{}", definition.key);
                    FieldInputView {
                        error: by_field.get(&name).cloned(),
                        name,
                        label: definition.display_label().to_owned(),
                        kind: match definition.kind {
                            FieldKind::Text => "text",
                            FieldKind::Number => "number",
                            FieldKind::Select => "select",
                        },
                        value: field.value.clone(),
                        options: definition
                            .options
                            .iter()
                            .map(|option| OptionView {
                                value: option.clone(),
                                label: option.clone(),
                                selected: *option == field.value,
                            })
                            .collect(),
                        required: definition.required,
                    }
                })
                .collect(),
            labels: draft.labels.clone(),
            variants: draft
                .variants
                .iter()
                .enumerate()
                .map(|(index, v)| VariantRowView {
                    index,
                    name: v.name.clone(),
                    sku: v.sku.clone(),
                    price: v.price.clone(),
                    stock: v.stock.clone(),
                    errors: variant_errors(index),
                })
                .collect(),
            images,
            errors: by_field,
            general_errors,
        }
    }

    /// Error for a top-level input, or `""`.
    #[must_use]
    pub fn error(&self, field: &str) -> &str {
        self.errors.get(field).map_or("", String::as_str)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "products/list.html")]
pub struct ProductListTemplate {
    pub layout: Layout,
    pub products: Vec<ProductRowView>,
    pub pager: Option<PagerView>,
    pub error: Option<String>,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub layout: Layout,
    pub form: ProductFormView,
}

// =============================================================================
// Forms
// =============================================================================

/// Product list query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u32>,
}

/// Form page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    /// Throw away unsaved edits and start over.
    #[serde(default)]
    pub discard: bool,
}

/// What the submit button asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Save,
    AddVariant,
    RemoveVariant(usize),
    RemoveImage(usize),
    PrimaryImage(usize),
    /// Apply the edits and show the form again.
    Refresh,
}

impl Intent {
    fn parse(raw: &str) -> Self {
        let (verb, index) = match raw.split_once(':') {
            Some((verb, index)) => (verb, index.parse::<usize>().ok()),
            None => (raw, None),
        };
        match (verb, index) {
            ("save", _) => Self::Save,
            ("add_variant", _) => Self::AddVariant,
            ("remove_variant", Some(i)) => Self::RemoveVariant(i),
            ("remove_image", Some(i)) => Self::RemoveImage(i),
            ("primary_image", Some(i)) => Self::PrimaryImage(i),
            _ => Self::Refresh,
        }
    }
}

/// The text inputs of one form post.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub discount: Option<String>,
    pub discount_kind: DiscountKind,
    pub category_id: Option<String>,
    pub fields: Vec<(String, String)>,
    /// Existing labels left checked.
    pub checked_labels: Vec<String>,
    /// Labels typed into the "add labels" box.
    pub new_labels: Vec<String>,
    pub variants: BTreeMap<usize, VariantDraft>,
    pub intent: Option<Intent>,
}

impl ProductForm {
    /// Collect inputs by name. Unknown names are ignored.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "name" => form.name = Some(value),
                "description" => form.description = Some(value),
                "price" => form.price = Some(value),
                "stock" => form.stock = Some(value),
                "discount" => form.discount = Some(value),
                "discount_type" => {
                    form.discount_kind = if value == "amount" {
                        DiscountKind::Amount
                    } else {
                        DiscountKind::Percent
                    };
                }
                "category_id" => form.category_id = Some(value).filter(|v| !v.is_empty()),
                "label" => form.checked_labels.push(value),
                "new_label" => form.new_labels.extend(
                    value
                        .split([',', '،'])
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_owned),
                ),
                "intent" => form.intent = Some(Intent::parse(&value)),
                _ => {
                    if let Some(key) = name.strip_prefix("field.") {
                        form.fields.push((key.to_owned(), value));
                    } else if let Some(rest) = name.strip_prefix("variant.") {
                        form.set_variant_input(rest, value);
                    }
                }
            }
        }
        form
    }

    fn set_variant_input(&mut self, rest: &str, value: String) {
        let Some((index, part)) = rest.split_once('.') else {
            return;
        };
        let Ok(index) = index.parse::<usize>() else {
            return;
        };
        let row = self.variants.entry(index).or_default();
        match part {
            "name" => row.name = value,
            "sku" => row.sku = value,
            "price" => row.price = value,
            "stock" => row.stock = value,
            _ => {}
        }
    }

    /// Actions that bring `draft` in line with this post, in the order they
    /// must be applied. Field values are only set for keys the draft will
    /// have once the posted category is selected.
    #[must_use]
    pub fn actions(self, draft: &ProductDraft, categories: &[Category]) -> Vec<ProductAction> {
        let mut actions = Vec::new();

        if let Some(name) = self.name {
            actions.push(ProductAction::SetName(name));
        }
        if let Some(description) = self.description {
            actions.push(ProductAction::SetDescription(description));
        }
        if let Some(price) = self.price {
            actions.push(ProductAction::SetPrice(price));
        }
        if let Some(stock) = self.stock {
            actions.push(ProductAction::SetStock(stock));
        }
        if let Some(value) = self.discount {
            actions.push(ProductAction::SetDiscount {
                value,
                kind: self.discount_kind,
            });
        }

        let selected = self
            .category_id
            .as_deref()
            .filter(|id| draft.category_id.as_ref().is_none_or(|current| current.as_str() != *id))
            .and_then(|id| categories.iter().find(|c| c.id.as_str() == id));
        let field_keys: Vec<&str> = match selected {
            Some(category) => category.fields.iter().map(|f| f.key.as_str()).collect(),
            None => draft.fields.iter().map(|f| f.definition.key.as_str()).collect(),
        };
        let fields: Vec<ProductAction> = self
            .fields
            .into_iter()
            .filter(|(key, _)| field_keys.contains(&key.as_str()))
            .map(|(key, value)| ProductAction::SetField { key, value })
            .collect();
        if let Some(category) = selected {
            actions.push(ProductAction::SelectCategory(category.clone()));
        }
        actions.extend(fields);

        for label in &draft.labels {
            if !self.checked_labels.contains(label) {
                actions.push(ProductAction::ToggleLabel(label.clone()));
            }
        }
        for label in self.new_labels {
            if !draft.labels.contains(&label) {
                actions.push(ProductAction::ToggleLabel(label));
            }
        }

        for (index, variant) in self.variants {
            if index < draft.variants.len() {
                actions.push(ProductAction::UpdateVariant { index, variant });
            }
        }

        match self.intent {
            Some(Intent::AddVariant) => actions.push(ProductAction::AddVariant),
            Some(Intent::RemoveVariant(i)) => actions.push(ProductAction::RemoveVariant(i)),
            Some(Intent::RemoveImage(i)) => actions.push(ProductAction::RemoveImage(i)),
            Some(Intent::PrimaryImage(i)) => actions.push(ProductAction::SetPrimaryImage(i)),
            Some(Intent::Save | Intent::Refresh) | None => {}
        }
        actions
    }
}

// =============================================================================
// Draft storage
// =============================================================================

async fn stored_draft(
    session: &Session,
    product_id: Option<&ProductId>,
) -> Result<Option<ProductDraft>> {
    Ok(session
        .get::<ProductDraft>(session_keys::PRODUCT_DRAFT)
        .await?
        .filter(|draft| draft.product_id.as_ref() == product_id))
}

async fn store_draft(session: &Session, draft: &ProductDraft) -> Result<()> {
    session.insert(session_keys::PRODUCT_DRAFT, draft).await?;
    Ok(())
}

/// Categories for the form; an empty list if they cannot be loaded.
async fn form_categories(state: &AppState) -> Vec<Category> {
    state.api().get_categories().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    })
}

enum Loaded {
    Draft(ProductDraft),
    Expired,
}

/// The draft to work on: the session's if it belongs to this product,
/// otherwise a fresh one (from the API when editing).
async fn load_draft(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product_id: Option<&ProductId>,
    categories: &[Category],
) -> Result<Loaded> {
    if let Some(draft) = stored_draft(session, product_id).await? {
        return Ok(Loaded::Draft(draft));
    }
    let Some(product_id) = product_id else {
        return Ok(Loaded::Draft(ProductDraft::new()));
    };

    match state.api().get_admin_product(&admin.token, product_id).await {
        Ok(product) => Ok(Loaded::Draft(ProductDraft::from_product(&product, categories))),
        Err(e) if e.is_unauthorized() => Ok(Loaded::Expired),
        Err(ApiError::NotFound { .. }) => Err(AppError::NotFound(format!("product {product_id}"))),
        Err(e) => Err(e.into()),
    }
}

async fn render_form(
    session: &Session,
    admin: &CurrentAdmin,
    draft: &ProductDraft,
    categories: &[Category],
    errors: Vec<FieldError>,
    general_errors: Vec<String>,
) -> ProductFormTemplate {
    let path = form_path(draft.product_id.as_ref());
    ProductFormTemplate {
        layout: Layout::load(session, Some(admin), &path).await,
        form: ProductFormView::build(draft, categories, errors, general_errors),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display a page of products.
#[instrument(skip(state, session, admin))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<ProductListQuery>,
) -> Result<Response> {
    let request = PageRequest::new(query.page.unwrap_or(1), PAGE_SIZE);

    let (products, pager, error) = match state.api().get_all_products(&admin.token, request).await {
        Ok(page) => (
            page.items.iter().map(ProductRowView::from).collect(),
            PagerView::build(&page.pagination, "/products", &[]),
            None,
        ),
        Err(e) if e.is_unauthorized() => {
            return Ok(expire_session(&session, "/products").await?.into_response());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load products");
            (Vec::new(), None, Some(e.user_message()))
        }
    };

    Ok(ProductListTemplate {
        layout: Layout::load(&session, Some(&admin), "/products").await,
        products,
        pager,
        error,
    }
    .into_response())
}

/// Display the create form.
#[instrument(skip(state, session, admin))]
pub async fn new_form(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Query(query): Query<FormQuery>,
) -> Result<Response> {
    show_form(&state, &session, &admin, None, query.discard).await
}

/// Display the edit form.
#[instrument(skip(state, session, admin))]
pub async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(id): Path<String>,
    Query(query): Query<FormQuery>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    show_form(&state, &session, &admin, Some(&product_id), query.discard).await
}

async fn show_form(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product_id: Option<&ProductId>,
    discard: bool,
) -> Result<Response> {
    if discard && let Some(draft) = stored_draft(session, product_id).await? {
        state.uploads().remove_all(draft.images.uploads()).await;
        session.remove::<ProductDraft>(session_keys::PRODUCT_DRAFT).await?;
    }

    let categories = form_categories(state).await;
    let draft = match load_draft(state, session, admin, product_id, &categories).await? {
        Loaded::Draft(draft) => draft,
        Loaded::Expired => {
            let path = form_path(product_id);
            return Ok(expire_session(session, &path).await?.into_response());
        }
    };

    Ok(render_form(session, admin, &draft, &categories, Vec::new(), Vec::new())
        .await
        .into_response())
}

/// Apply a create-form post.
#[instrument(skip_all)]
pub async fn submit_new(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    multipart: Multipart,
) -> Result<Response> {
    submit(&state, &session, &admin, None, multipart).await
}

/// Apply an edit-form post.
#[instrument(skip(state, session, admin, multipart))]
pub async fn submit_edit(
    State(state): State<AppState>,
    session: Session,
    RequireEditor(admin): RequireEditor,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    submit(&state, &session, &admin, Some(&product_id), multipart).await
}

async fn submit(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product_id: Option<&ProductId>,
    multipart: Multipart,
) -> Result<Response> {
    let path = form_path(product_id);
    let body = MultipartForm::read(multipart, "images", state.config().max_upload_bytes).await?;

    let categories = form_categories(state).await;
    let mut draft = match load_draft(state, session, admin, product_id, &categories).await? {
        Loaded::Draft(draft) => draft,
        Loaded::Expired => return Ok(expire_session(session, &path).await?.into_response()),
    };

    let mut notices = body.rejected;
    for file in body.files {
        let pending = state.uploads().insert(file).await;
        draft.apply(ProductAction::AddImage(pending))?;
    }

    let form = ProductForm::from_pairs(body.fields);
    let intent = form.intent.unwrap_or(Intent::Refresh);
    for action in form.actions(&draft, &categories) {
        // A stale index (double submit, other tab) is reported, not fatal
        if let Err(e) = draft.apply(action) {
            notices.push(e.to_string());
        }
    }
    store_draft(session, &draft).await?;

    if intent != Intent::Save {
        if !notices.is_empty() {
            set_flash(session, notices.join(" ")).await;
        }
        return Ok(Redirect::to(&path).into_response());
    }

    let payload = match draft.to_payload() {
        Ok(payload) => payload,
        Err(errors) => {
            let page = render_form(session, admin, &draft, &categories, errors, notices).await;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let Some(images) = state.uploads().collect(draft.images.uploads()).await else {
        notices.push("Some new images expired before saving. Remove them and add them again.".to_owned());
        let page = render_form(session, admin, &draft, &categories, Vec::new(), notices).await;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    };

    let saved = match product_id {
        Some(id) => state.api().update_product(&admin.token, id, &payload, &images).await,
        None => state.api().create_product(&admin.token, &payload, &images).await,
    };

    match saved {
        Ok(product) => {
            state.uploads().remove_all(draft.images.uploads()).await;
            session.remove::<ProductDraft>(session_keys::PRODUCT_DRAFT).await?;
            tracing::info!(
                product_id = %product.id,
                created = product_id.is_none(),
                admin = %admin.username,
                "Product saved"
            );
            set_flash(session, format!("Saved {}.", product.name)).await;
            Ok(Redirect::to("/products").into_response())
        }
        Err(e) if e.is_client_error() && !e.is_unauthorized() => {
            tracing::info!(error = %e, "Product rejected by the API");
            notices.push(e.user_message());
            let page = render_form(session, admin, &draft, &categories, Vec::new(), notices).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => redirect_after_failure(session, &e, &path).await,
    }
}

/// Serve an unsaved upload for the form preview.
#[instrument(skip(state, _admin))]
pub async fn upload_preview(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let upload = state
        .uploads()
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("upload {id}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, upload.content_type.clone()),
            (header::CACHE_CONTROL, "private, max-age=600".to_owned()),
        ],
        upload.bytes.clone(),
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::product_form::PendingUpload;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn categories() -> Vec<Category> {
        serde_json::from_value(json!([
            {"_id": "shirts", "name": "Shirts", "fields": [{"key": "material"}, {"key": "size"}]},
            {"_id": "pants", "name": "Pants", "fields": [{"key": "material"}, {"key": "length"}]}
        ]))
        .unwrap()
    }

    #[test]
    fn test_intent_parse() {
        assert_eq!(Intent::parse("save"), Intent::Save);
        assert_eq!(Intent::parse("remove_image:2"), Intent::RemoveImage(2));
        assert_eq!(Intent::parse("remove_image:x"), Intent::Refresh);
        assert_eq!(Intent::parse("whatever"), Intent::Refresh);
    }

    #[test]
    fn test_form_pairs() {
        let form = ProductForm::from_pairs(pairs(&[
            ("name", "Shirt"),
            ("discount_type", "amount"),
            ("category_id", ""),
            ("new_label", "new, sale،  "),
            ("variant.1.name", "L"),
            ("variant.1.stock", "4"),
            ("variant.x.name", "ignored"),
            ("field.size", "M"),
            ("intent", "add_variant"),
        ]));
        assert_eq!(form.name.as_deref(), Some("Shirt"));
        assert_eq!(form.discount_kind, DiscountKind::Amount);
        assert_eq!(form.category_id, None);
        assert_eq!(form.new_labels, ["new", "sale"]);
        assert_eq!(form.variants.len(), 1);
        assert_eq!(form.variants[&1].stock, "4");
        assert_eq!(form.fields, [("size".to_owned(), "M".to_owned())]);
        assert_eq!(form.intent, Some(Intent::AddVariant));
    }

    #[test]
    fn test_category_change_sets_only_new_fields() {
        let categories = categories();
        let mut draft = ProductDraft::new();
        draft
            .apply(ProductAction::SelectCategory(categories[0].clone()))
            .unwrap();

        let form = ProductForm::from_pairs(pairs(&[
            ("category_id", "pants"),
            ("field.material", "denim"),
            ("field.size", "M"),
            ("field.length", "32"),
        ]));
        for action in form.actions(&draft, &categories) {
            draft.apply(action).unwrap();
        }

        assert_eq!(draft.category_id.as_ref().unwrap().as_str(), "pants");
        let values: Vec<_> = draft
            .fields
            .iter()
            .map(|f| (f.definition.key.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(values, [("material", "denim"), ("length", "32")]);
    }

    #[test]
    fn test_unchecked_labels_are_removed() {
        let mut draft = ProductDraft::new();
        draft.apply(ProductAction::ToggleLabel("old".to_owned())).unwrap();
        draft.apply(ProductAction::ToggleLabel("keep".to_owned())).unwrap();

        let form = ProductForm::from_pairs(pairs(&[("label", "keep"), ("new_label", "fresh, keep")]));
        for action in form.actions(&draft, &[]) {
            draft.apply(action).unwrap();
        }
        assert_eq!(draft.labels, ["keep", "fresh"]);
    }

    #[test]
    fn test_variant_edits_apply_before_intent() {
        let mut draft = ProductDraft::new();
        draft.apply(ProductAction::AddVariant).unwrap();
        draft.apply(ProductAction::AddVariant).unwrap();

        let form = ProductForm::from_pairs(pairs(&[
            ("variant.0.name", "S"),
            ("variant.1.name", "M"),
            ("variant.5.name", "ghost"),
            ("intent", "remove_variant:0"),
        ]));
        for action in form.actions(&draft, &[]) {
            draft.apply(action).unwrap();
        }
        assert_eq!(draft.variants.len(), 1);
        assert_eq!(draft.variants[0].name, "M");
    }

    #[test]
    fn test_form_view_errors_and_images() {
        let categories = categories();
        let mut draft = ProductDraft::new();
        draft
            .apply(ProductAction::SelectCategory(categories[0].clone()))
            .unwrap();
        draft.apply(ProductAction::AddVariant).unwrap();
        draft
            .apply(ProductAction::AddImage(PendingUpload {
                upload_id: "u1".to_owned(),
                file_name: "tee.jpg".to_owned(),
                content_type: "image/jpeg".to_owned(),
                size: 3,
            }))
            .unwrap();

        let view = ProductFormView::build(&draft, &categories, draft.validate(), Vec::new());
        assert_eq!(view.action, "/products/new");
        assert_eq!(view.error("name"), "Name is required");
        assert_eq!(view.error("images"), "");
        assert_eq!(view.variants[0].errors.len(), 2);
        assert!(view.categories[0].selected);
        assert_eq!(view.images[0].src, "/products/uploads/u1");
        assert!(view.images[0].primary);
        assert!(view.discount_kinds[0].selected);
    }

    #[test]
    fn test_row_view_category_name() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p 1",
            "name": "Mug",
            "price": 1000,
            "category": {"_id": "kitchen", "name": "Kitchen"}
        }))
        .unwrap();
        let row = ProductRowView::from(&product);
        assert_eq!(row.edit_href, "/products/p%201/edit");
        assert_eq!(row.category, "Kitchen");
        assert_eq!(row.price, "1,000 Toman");
    }
}
