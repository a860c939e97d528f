//! Product create/edit form state.
//!
//! The form is a reducer over a [`ProductDraft`]: every submit is turned
//! into a list of [`ProductAction`]s, applied in order, and the draft is put
//! back in the session. Only the final save calls the API, with the single
//! payload built by [`ProductDraft::to_payload`].
//!
//! Images are tracked in three lists: existing images that stay, existing
//! images marked for removal, and new uploads waiting in the upload store.
//! The primary image is an index into kept-then-new order and is kept valid
//! as images come and go.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kala_core::models::{Category, FieldDefinition, FieldKind, FieldValue, Product, Variant};
use kala_core::types::phone::to_ascii_digits;
use kala_core::{CategoryId, DiscountKind, ImageId, ProductId, Toman, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Draft
// =============================================================================

/// A category-specific field and what has been typed into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftField {
    pub definition: FieldDefinition,
    pub value: String,
}

/// A variant row as typed; parsed on save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDraft {
    pub id: Option<VariantId>,
    pub name: String,
    pub sku: String,
    pub price: String,
    pub stock: String,
}

/// An image the product already has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingImage {
    pub id: ImageId,
    pub url: String,
}

/// A new file held in the upload store until the product is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub upload_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// One image slot, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot<'a> {
    Existing(&'a ExistingImage),
    Upload(&'a PendingUpload),
}

/// Image-preview bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftImages {
    kept: Vec<ExistingImage>,
    removed: Vec<ImageId>,
    uploads: Vec<PendingUpload>,
    primary: usize,
}

impl DraftImages {
    /// Number of images the product will have after saving.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kept.len() + self.uploads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the primary image (0 when there are no images).
    #[must_use]
    pub const fn primary(&self) -> usize {
        self.primary
    }

    /// Existing images marked for removal.
    #[must_use]
    pub fn removed(&self) -> &[ImageId] {
        &self.removed
    }

    /// New uploads, in the order their parts are sent.
    #[must_use]
    pub fn uploads(&self) -> &[PendingUpload] {
        &self.uploads
    }

    /// All slots, kept images first.
    #[must_use]
    pub fn slots(&self) -> Vec<ImageSlot<'_>> {
        self.kept
            .iter()
            .map(ImageSlot::Existing)
            .chain(self.uploads.iter().map(ImageSlot::Upload))
            .collect()
    }

    fn add(&mut self, upload: PendingUpload) {
        self.uploads.push(upload);
    }

    fn remove(&mut self, index: usize) -> Result<(), DraftError> {
        if index < self.kept.len() {
            let image = self.kept.remove(index);
            self.removed.push(image.id);
        } else if index < self.len() {
            self.uploads.remove(index - self.kept.len());
        } else {
            return Err(DraftError::OutOfRange {
                what: "image",
                index,
            });
        }

        if self.primary > index {
            self.primary -= 1;
        } else if self.primary == index {
            self.primary = 0;
        }
        self.primary = self.primary.min(self.len().saturating_sub(1));
        Ok(())
    }

    fn set_primary(&mut self, index: usize) -> Result<(), DraftError> {
        if index >= self.len() {
            return Err(DraftError::OutOfRange {
                what: "image",
                index,
            });
        }
        self.primary = index;
        Ok(())
    }
}

/// Working copy of a product being created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// `None` while creating.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub discount: String,
    pub discount_kind: DiscountKind,
    pub category_id: Option<CategoryId>,
    pub fields: Vec<DraftField>,
    pub labels: Vec<String>,
    pub variants: Vec<VariantDraft>,
    pub images: DraftImages,
}

/// One user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductAction {
    SetName(String),
    SetDescription(String),
    SetPrice(String),
    SetStock(String),
    SetDiscount { value: String, kind: DiscountKind },
    /// Replace the dynamic fields with the category's, keeping values of
    /// keys that still exist.
    SelectCategory(Category),
    SetField { key: String, value: String },
    ToggleLabel(String),
    AddVariant,
    UpdateVariant { index: usize, variant: VariantDraft },
    RemoveVariant(usize),
    AddImage(PendingUpload),
    RemoveImage(usize),
    SetPrimaryImage(usize),
}

/// An action that does not fit the current draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("no {what} at position {index}")]
    OutOfRange { what: &'static str, index: usize },
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// A validation problem tied to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field name, e.g. `price` or `variants[1].stock`.
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ProductDraft {
    /// Empty draft for a new product.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft pre-filled from an existing product.
    ///
    /// Field definitions come from the product's category when it is in
    /// `categories`; stored values for other keys are kept as text fields.
    #[must_use]
    pub fn from_product(product: &Product, categories: &[Category]) -> Self {
        let category_id = product.category.as_ref().map(|c| c.id().clone());
        let mut values: BTreeMap<&str, &str> = product
            .fields
            .iter()
            .map(|f| (f.key.as_str(), f.value.as_str()))
            .collect();

        let mut fields: Vec<DraftField> = category_id
            .as_ref()
            .and_then(|id| categories.iter().find(|c| &c.id == id))
            .map(|category| {
                category
                    .fields
                    .iter()
                    .map(|definition| DraftField {
                        value: values
                            .remove(definition.key.as_str())
                            .unwrap_or_default()
                            .to_owned(),
                        definition: definition.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        fields.extend(values.into_iter().map(|(key, value)| DraftField {
            definition: FieldDefinition {
                key: key.to_owned(),
                label: String::new(),
                kind: FieldKind::Text,
                options: Vec::new(),
                required: false,
            },
            value: value.to_owned(),
        }));

        let kept: Vec<ExistingImage> = product
            .images
            .iter()
            .filter_map(|img| {
                img.id.clone().map(|id| ExistingImage {
                    id,
                    url: img.url.clone(),
                })
            })
            .collect();
        let primary = product
            .images
            .iter()
            .filter(|img| img.id.is_some())
            .position(|img| img.is_primary)
            .unwrap_or(0);

        Self {
            product_id: Some(product.id.clone()),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.price.amount().to_string(),
            stock: product.stock.to_string(),
            discount: product
                .discount
                .filter(|d| *d > Decimal::ZERO)
                .map(|d| d.normalize().to_string())
                .unwrap_or_default(),
            discount_kind: product.discount_type,
            category_id,
            fields,
            labels: product.labels.clone(),
            variants: product
                .variants
                .iter()
                .map(|v| VariantDraft {
                    id: v.id.clone(),
                    name: v.name.clone(),
                    sku: v.sku.clone().unwrap_or_default(),
                    price: v.price.amount().to_string(),
                    stock: v.stock.to_string(),
                })
                .collect(),
            images: DraftImages {
                kept,
                removed: Vec::new(),
                uploads: Vec::new(),
                primary,
            },
        }
    }

    /// Apply one action.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] if the action refers to a variant, image or
    /// field that does not exist. The draft is unchanged in that case.
    pub fn apply(&mut self, action: ProductAction) -> Result<(), DraftError> {
        match action {
            ProductAction::SetName(name) => self.name = name,
            ProductAction::SetDescription(description) => self.description = description,
            ProductAction::SetPrice(price) => self.price = price,
            ProductAction::SetStock(stock) => self.stock = stock,
            ProductAction::SetDiscount { value, kind } => {
                self.discount = value;
                self.discount_kind = kind;
            }
            ProductAction::SelectCategory(category) => self.select_category(&category),
            ProductAction::SetField { key, value } => {
                let field = self
                    .fields
                    .iter_mut()
                    .find(|f| f.definition.key == key)
                    .ok_or(DraftError::UnknownField(key))?;
                field.value = value;
            }
            ProductAction::ToggleLabel(label) => {
                let label = label.trim();
                if !label.is_empty() {
                    if let Some(pos) = self.labels.iter().position(|l| l == label) {
                        self.labels.remove(pos);
                    } else {
                        self.labels.push(label.to_owned());
                    }
                }
            }
            ProductAction::AddVariant => self.variants.push(VariantDraft::default()),
            ProductAction::UpdateVariant { index, variant } => {
                let slot = self.variants.get_mut(index).ok_or(DraftError::OutOfRange {
                    what: "variant",
                    index,
                })?;
                // The API id is not editable
                let id = slot.id.take();
                *slot = VariantDraft { id, ..variant };
            }
            ProductAction::RemoveVariant(index) => {
                if index >= self.variants.len() {
                    return Err(DraftError::OutOfRange {
                        what: "variant",
                        index,
                    });
                }
                self.variants.remove(index);
            }
            ProductAction::AddImage(upload) => self.images.add(upload),
            ProductAction::RemoveImage(index) => self.images.remove(index)?,
            ProductAction::SetPrimaryImage(index) => self.images.set_primary(index)?,
        }
        Ok(())
    }

    fn select_category(&mut self, category: &Category) {
        let previous: BTreeMap<String, String> = self
            .fields
            .drain(..)
            .map(|f| (f.definition.key, f.value))
            .collect();

        self.fields = category
            .fields
            .iter()
            .map(|definition| DraftField {
                value: previous.get(&definition.key).cloned().unwrap_or_default(),
                definition: definition.clone(),
            })
            .collect();
        self.category_id = Some(category.id.clone());
    }

    /// Every problem with the draft, in form order. Empty when it can be saved.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        match self.to_payload() {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    /// Build the create/update payload.
    ///
    /// # Errors
    ///
    /// Returns every field error if the draft is not valid.
    pub fn to_payload(&self) -> Result<ProductPayload, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }

        let price = match parse_decimal(&self.price) {
            Some(price) if price > Decimal::ZERO => Some(price),
            Some(_) => {
                errors.push(FieldError::new("price", "Price must be greater than zero"));
                None
            }
            None => {
                errors.push(FieldError::new("price", "Price must be a number"));
                None
            }
        };

        let stock = if self.stock.trim().is_empty() {
            Some(0)
        } else {
            parse_count(&self.stock).or_else(|| {
                errors.push(FieldError::new("stock", "Stock must be a whole number, 0 or more"));
                None
            })
        };

        let discount = if self.discount.trim().is_empty() {
            None
        } else {
            match parse_decimal(&self.discount) {
                Some(d) if d < Decimal::ZERO => {
                    errors.push(FieldError::new("discount", "Discount cannot be negative"));
                    None
                }
                Some(d)
                    if self.discount_kind == DiscountKind::Percent
                        && d > Decimal::ONE_HUNDRED =>
                {
                    errors.push(FieldError::new("discount", "Percent cannot exceed 100"));
                    None
                }
                Some(d)
                    if self.discount_kind == DiscountKind::Amount
                        && price.is_some_and(|p| d > p) =>
                {
                    errors.push(FieldError::new("discount", "Discount cannot exceed the price"));
                    None
                }
                Some(d) => Some(d).filter(|d| *d > Decimal::ZERO),
                None => {
                    errors.push(FieldError::new("discount", "Discount must be a number"));
                    None
                }
            }
        };

        if self.category_id.is_none() {
            errors.push(FieldError::new("category_id", "Choose a category"));
        }

        let fields = self.validated_fields(&mut errors);
        let variants = self.validated_variants(&mut errors);

        if self.images.is_empty() {
            errors.push(FieldError::new("images", "Add at least one image"));
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let (Some(price), Some(stock), Some(category_id)) = (price, stock, self.category_id.clone())
        else {
            return Err(errors);
        };

        Ok(ProductPayload {
            name: name.to_owned(),
            description: Some(self.description.trim())
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            price: Toman::new(price),
            stock,
            discount,
            discount_type: self.discount_kind,
            category_id,
            fields,
            labels: self.labels.clone(),
            variants,
            keep_images: self.images.kept.iter().map(|i| i.id.clone()).collect(),
            removed_images: self.images.removed.clone(),
            primary_image: self.images.primary,
            new_images: self.images.uploads.len(),
        })
    }

    fn validated_fields(&self, errors: &mut Vec<FieldError>) -> Vec<FieldValue> {
        let mut values = Vec::new();
        for field in &self.fields {
            let definition = &field.definition;
            let name = format!("field.{}", definition.key);
            let value = field.value.trim();

            if value.is_empty() {
                if definition.required {
                    errors.push(FieldError::new(
                        name,
                        format!("{} is required", definition.display_label()),
                    ));
                }
                continue;
            }

            let valid = match definition.kind {
                FieldKind::Text => true,
                FieldKind::Number => parse_decimal(value).is_some(),
                FieldKind::Select => definition.options.iter().any(|o| o == value),
            };
            if valid {
                values.push(FieldValue {
                    key: definition.key.clone(),
                    value: value.to_owned(),
                });
            } else {
                errors.push(FieldError::new(
                    name,
                    format!("{} has an invalid value", definition.display_label()),
                ));
            }
        }
        values
    }

    fn validated_variants(&self, errors: &mut Vec<FieldError>) -> Vec<Variant> {
        let mut variants = Vec::new();
        for (i, draft) in self.variants.iter().enumerate() {
            let before = errors.len();
            let name = draft.name.trim();
            if name.is_empty() {
                errors.push(FieldError::new(format!("variants[{i}].name"), "Variant name is required"));
            }
            let price = parse_decimal(&draft.price).filter(|p| *p > Decimal::ZERO);
            if price.is_none() {
                errors.push(FieldError::new(
                    format!("variants[{i}].price"),
                    "Variant price must be greater than zero",
                ));
            }
            let stock = if draft.stock.trim().is_empty() {
                Some(0)
            } else {
                parse_count(&draft.stock)
            };
            if stock.is_none() {
                errors.push(FieldError::new(
                    format!("variants[{i}].stock"),
                    "Variant stock must be a whole number, 0 or more",
                ));
            }

            if let (true, Some(price), Some(stock)) = (errors.len() == before, price, stock) {
                variants.push(Variant {
                    id: draft.id.clone(),
                    name: name.to_owned(),
                    sku: Some(draft.sku.trim())
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned),
                    price: Toman::new(price),
                    stock,
                    attributes: BTreeMap::new(),
                });
            }
        }
        variants
    }
}

/// Body of `createProduct` / `updateProduct`, sent as the `payload` part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Toman,
    pub stock: i64,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount: Option<Decimal>,
    pub discount_type: DiscountKind,
    pub category_id: CategoryId,
    pub fields: Vec<FieldValue>,
    pub labels: Vec<String>,
    pub variants: Vec<Variant>,
    pub keep_images: Vec<ImageId>,
    pub removed_images: Vec<ImageId>,
    /// Index into `keepImages` followed by the uploaded files.
    pub primary_image: usize,
    /// Number of `images` parts sent with this payload.
    pub new_images: usize,
}

/// Parse a decimal typed with Persian or ASCII digits and optional
/// thousands separators.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = to_ascii_digits(raw.trim())
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .map(|c| if c == '٫' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

fn parse_count(raw: &str) -> Option<i64> {
    parse_decimal(raw)
        .filter(|d| d.fract().is_zero() && *d >= Decimal::ZERO)
        .and_then(|d| i64::try_from(d).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn category(id: &str, fields: serde_json::Value) -> Category {
        serde_json::from_value(json!({"_id": id, "name": id, "fields": fields})).unwrap()
    }

    fn upload(id: &str) -> PendingUpload {
        PendingUpload {
            upload_id: id.to_owned(),
            file_name: format!("{id}.jpg"),
            content_type: "image/jpeg".to_owned(),
            size: 10,
        }
    }

    fn valid_draft() -> ProductDraft {
        let mut draft = ProductDraft::new();
        for action in [
            ProductAction::SetName("Green tea".to_owned()),
            ProductAction::SetPrice("120,000".to_owned()),
            ProductAction::SetStock("۵".to_owned()),
            ProductAction::SelectCategory(category("tea", json!([]))),
            ProductAction::AddImage(upload("u1")),
        ] {
            draft.apply(action).unwrap();
        }
        draft
    }

    #[test]
    fn test_select_category_keeps_shared_values() {
        let mut draft = ProductDraft::new();
        draft
            .apply(ProductAction::SelectCategory(category(
                "shirts",
                json!([{"key": "material"}, {"key": "size", "type": "select", "options": ["S", "M"]}]),
            )))
            .unwrap();
        draft
            .apply(ProductAction::SetField {
                key: "material".to_owned(),
                value: "cotton".to_owned(),
            })
            .unwrap();
        draft
            .apply(ProductAction::SetField {
                key: "size".to_owned(),
                value: "M".to_owned(),
            })
            .unwrap();

        draft
            .apply(ProductAction::SelectCategory(category(
                "pants",
                json!([{"key": "material"}, {"key": "length"}]),
            )))
            .unwrap();

        let keys: Vec<_> = draft.fields.iter().map(|f| f.definition.key.as_str()).collect();
        assert_eq!(keys, ["material", "length"]);
        assert_eq!(draft.fields[0].value, "cotton");
        assert_eq!(draft.fields[1].value, "");
        assert_eq!(draft.category_id, Some(CategoryId::new("pants")));
    }

    #[test]
    fn test_set_unknown_field_is_rejected() {
        let mut draft = ProductDraft::new();
        let err = draft
            .apply(ProductAction::SetField {
                key: "color".to_owned(),
                value: "red".to_owned(),
            })
            .unwrap_err();
        assert_eq!(err, DraftError::UnknownField("color".to_owned()));
    }

    #[test]
    fn test_toggle_label() {
        let mut draft = ProductDraft::new();
        draft.apply(ProductAction::ToggleLabel("new".to_owned())).unwrap();
        draft.apply(ProductAction::ToggleLabel(" sale ".to_owned())).unwrap();
        draft.apply(ProductAction::ToggleLabel("new".to_owned())).unwrap();
        draft.apply(ProductAction::ToggleLabel("  ".to_owned())).unwrap();
        assert_eq!(draft.labels, ["sale"]);
    }

    #[test]
    fn test_variant_rows() {
        let mut draft = ProductDraft::new();
        draft.apply(ProductAction::AddVariant).unwrap();
        draft.apply(ProductAction::AddVariant).unwrap();
        draft
            .apply(ProductAction::UpdateVariant {
                index: 1,
                variant: VariantDraft {
                    name: "Large".to_owned(),
                    price: "150000".to_owned(),
                    ..VariantDraft::default()
                },
            })
            .unwrap();
        draft.apply(ProductAction::RemoveVariant(0)).unwrap();

        assert_eq!(draft.variants.len(), 1);
        assert_eq!(draft.variants[0].name, "Large");
        assert!(draft.apply(ProductAction::RemoveVariant(3)).is_err());
    }

    #[test]
    fn test_primary_image_survives_removals() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "name": "Mug",
            "price": 1000,
            "images": [
                {"_id": "i1", "url": "https://cdn/1.jpg"},
                {"_id": "i2", "url": "https://cdn/2.jpg", "isPrimary": true}
            ]
        }))
        .unwrap();
        let mut draft = ProductDraft::from_product(&product, &[]);
        assert_eq!(draft.images.primary(), 1);

        draft.apply(ProductAction::AddImage(upload("u1"))).unwrap();
        draft.apply(ProductAction::SetPrimaryImage(2)).unwrap();

        // Removing an earlier image shifts the primary down with it
        draft.apply(ProductAction::RemoveImage(0)).unwrap();
        assert_eq!(draft.images.primary(), 1);
        assert_eq!(draft.images.removed(), [ImageId::new("i1")]);
        assert!(matches!(draft.images.slots()[1], ImageSlot::Upload(u) if u.upload_id == "u1"));

        // Removing the primary falls back to the first image
        draft.apply(ProductAction::RemoveImage(1)).unwrap();
        assert_eq!(draft.images.primary(), 0);
        assert!(draft.images.uploads().is_empty());

        draft.apply(ProductAction::RemoveImage(0)).unwrap();
        assert!(draft.images.is_empty());
        assert_eq!(draft.images.primary(), 0);
        assert!(draft.apply(ProductAction::SetPrimaryImage(0)).is_err());
    }

    #[test]
    fn test_validate_reports_every_error() {
        let mut draft = ProductDraft::new();
        draft.apply(ProductAction::SetPrice("abc".to_owned())).unwrap();
        draft.apply(ProductAction::SetStock("-1".to_owned())).unwrap();
        draft.apply(ProductAction::AddVariant).unwrap();

        let fields: Vec<String> = draft.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            [
                "name",
                "price",
                "stock",
                "category_id",
                "variants[0].name",
                "variants[0].price",
                "images"
            ]
        );
    }

    #[test]
    fn test_required_and_select_fields() {
        let mut draft = valid_draft();
        draft
            .apply(ProductAction::SelectCategory(category(
                "shirts",
                json!([{"key": "size", "label": "Size", "type": "select", "options": ["S"], "required": true}]),
            )))
            .unwrap();
        let errors = draft.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Size is required");

        draft
            .apply(ProductAction::SetField {
                key: "size".to_owned(),
                value: "XL".to_owned(),
            })
            .unwrap();
        assert_eq!(draft.validate()[0].message, "Size has an invalid value");
    }

    #[test]
    fn test_discount_limits() {
        let mut draft = valid_draft();
        draft
            .apply(ProductAction::SetDiscount {
                value: "150".to_owned(),
                kind: DiscountKind::Percent,
            })
            .unwrap();
        assert_eq!(draft.validate()[0].field, "discount");

        draft
            .apply(ProductAction::SetDiscount {
                value: "15000".to_owned(),
                kind: DiscountKind::Amount,
            })
            .unwrap();
        assert!(draft.validate().is_empty());
    }

    #[test]
    fn test_payload() {
        let mut draft = valid_draft();
        draft.apply(ProductAction::ToggleLabel("bestseller".to_owned())).unwrap();
        draft
            .apply(ProductAction::SetDiscount {
                value: "10".to_owned(),
                kind: DiscountKind::Percent,
            })
            .unwrap();

        let payload = draft.to_payload().unwrap();
        assert_eq!(payload.price, Toman::from_whole(120_000));
        assert_eq!(payload.stock, 5);
        assert_eq!(payload.new_images, 1);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["name"], "Green tea");
        assert_eq!(json["categoryId"], "tea");
        assert_eq!(json["discount"], 10.0);
        assert_eq!(json["discountType"], "percent");
        assert_eq!(json["labels"], json!(["bestseller"]));
        assert_eq!(json["primaryImage"], 0);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_from_product_keeps_unknown_field_values() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "name": "Shirt",
            "price": 250000,
            "discount": 10,
            "category": {"_id": "shirts", "name": "Shirts"},
            "fields": [{"key": "material", "value": "linen"}, {"key": "legacy", "value": "x"}],
            "variants": [{"_id": "v1", "name": "M", "price": 250000, "stock": 3}]
        }))
        .unwrap();
        let categories = [category("shirts", json!([{"key": "material"}]))];

        let draft = ProductDraft::from_product(&product, &categories);
        assert_eq!(draft.product_id, Some(ProductId::new("p1")));
        assert_eq!(draft.discount, "10");
        assert_eq!(draft.fields.len(), 2);
        assert_eq!(draft.fields[0].value, "linen");
        assert_eq!(draft.fields[1].definition.key, "legacy");
        assert_eq!(draft.variants[0].id, Some(VariantId::new("v1")));
        assert_eq!(draft.variants[0].stock, "3");
    }
}
