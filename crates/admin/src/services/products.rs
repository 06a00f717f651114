//! Product management: list, create, update and delete with image upload.
//!
//! Every write is followed by a full re-fetch from the backend; nothing is
//! patched into a local list.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use star_admin_core::{Price, PriceError, Product, ProductDraft, ProductId};

use crate::data::{DataError, DataService};

/// Shown when a required field is blank.
pub const MSG_FILL_ALL_FIELDS: &str = "Please fill in all fields.";
/// Shown when a new product is submitted without an image.
pub const MSG_IMAGE_REQUIRED: &str = "Please select an image for the new product.";
pub const MSG_PRODUCT_ADDED: &str = "Product added successfully!";
pub const MSG_PRODUCT_UPDATED: &str = "Product updated successfully!";
pub const MSG_PRODUCT_DELETED: &str = "Product deleted successfully!";

/// Directory inside the bucket that product images are written to.
const IMAGE_DIR: &str = "public";

/// Errors from product operations. Display text is the user-facing alert.
#[derive(Debug, Error)]
pub enum ProductError {
    /// Input rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    #[error("Error loading products: {0}")]
    Load(DataError),

    /// Upload or write failed.
    #[error("Error: {0}")]
    Save(DataError),

    #[error("Error deleting product: {0}")]
    Delete(DataError),
}

impl ProductError {
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<PriceError> for ProductError {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::Empty => Self::Validation(MSG_FILL_ALL_FIELDS.to_string()),
            other => Self::Validation(format!("Invalid price: {other}.")),
        }
    }
}

/// Raw product form fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
}

impl ProductForm {
    /// Prefill from an existing product for editing.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.normalize().to_string(),
        }
    }

    /// Check required fields and parse the price.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Validation` for blank fields or a bad price.
    pub fn validate(&self) -> Result<ValidProduct, ProductError> {
        let name = self.name.trim();
        let description = self.description.trim();
        if name.is_empty() || description.is_empty() || self.price.trim().is_empty() {
            return Err(ProductError::Validation(MSG_FILL_ALL_FIELDS.to_string()));
        }

        let price = Price::parse(&self.price)?;

        Ok(ValidProduct {
            name: name.to_string(),
            description: description.to_string(),
            price,
        })
    }
}

/// Form fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
}

impl ValidProduct {
    fn into_draft(self, image_url: Option<String>) -> ProductDraft {
        ProductDraft {
            name: self.name,
            description: self.description,
            price: self.price.amount,
            image_url,
        }
    }
}

/// An image file chosen in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name, used for its extension.
    pub file_name: String,
    /// Declared content type, if the client sent one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Lowercased extension after the last `.`, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }

    /// Storage path `public/<millis>.<ext>`.
    #[must_use]
    pub fn storage_path(&self, millis: i64) -> String {
        match self.extension() {
            Some(ext) => format!("{IMAGE_DIR}/{millis}.{ext}"),
            None => format!("{IMAGE_DIR}/{millis}"),
        }
    }

    /// Declared content type, or one guessed from the extension.
    #[must_use]
    pub fn content_type(&self) -> String {
        if let Some(declared) = self.content_type.as_deref().filter(|c| !c.is_empty()) {
            return declared.to_string();
        }
        let guessed = match self.extension().as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("avif") => "image/avif",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        };
        guessed.to_string()
    }
}

/// Product operations over a [`DataService`].
pub struct ProductService<'a> {
    data: &'a dyn DataService,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(data: &'a dyn DataService) -> Self {
        Self { data }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Load` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Product>, ProductError> {
        self.data.list_products().await.map_err(ProductError::Load)
    }

    /// Find one product in a fresh listing.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Load` if the query fails.
    pub async fn find(&self, id: ProductId) -> Result<Option<Product>, ProductError> {
        Ok(self.list().await?.into_iter().find(|p| p.id == id))
    }

    /// Create a product. An image is mandatory.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call, or `Save` if the
    /// upload or insert fails.
    #[instrument(skip(self, form, image), fields(name = %form.name))]
    pub async fn create(
        &self,
        form: &ProductForm,
        image: Option<ImageUpload>,
    ) -> Result<(), ProductError> {
        let valid = form.validate()?;
        let image = image.ok_or_else(|| ProductError::Validation(MSG_IMAGE_REQUIRED.to_string()))?;

        let image_url = self.upload(image).await?;
        self.data
            .insert_product(&valid.into_draft(Some(image_url)))
            .await
            .map_err(ProductError::Save)?;

        info!("Product created");
        Ok(())
    }

    /// Update a product. Without a new image the stored URL is kept.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call, or `Save` if the
    /// upload or update fails.
    #[instrument(skip(self, form, image), fields(name = %form.name))]
    pub async fn update(
        &self,
        id: ProductId,
        form: &ProductForm,
        image: Option<ImageUpload>,
    ) -> Result<(), ProductError> {
        let valid = form.validate()?;

        let image_url = match image {
            Some(image) => Some(self.upload(image).await?),
            None => None,
        };
        self.data
            .update_product(id, &valid.into_draft(image_url))
            .await
            .map_err(ProductError::Save)?;

        info!("Product updated");
        Ok(())
    }

    /// Delete a product. Confirmation is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns `ProductError::Delete` if the remote delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), ProductError> {
        self.data
            .delete_product(id)
            .await
            .map_err(ProductError::Delete)?;
        info!("Product deleted");
        Ok(())
    }

    async fn upload(&self, image: ImageUpload) -> Result<String, ProductError> {
        let path = image.storage_path(Utc::now().timestamp_millis());
        let content_type = image.content_type();
        self.data
            .upload_product_image(&path, &content_type, image.bytes)
            .await
            .map_err(ProductError::Save)
    }
}
