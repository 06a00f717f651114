//! Product commands.
//!
//! Every change is followed by a fresh listing, like the web view.

use std::io::{self, Write};
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use star_admin::services::{ImageUpload, ProductForm, ProductService, format_timestamp};
use star_admin::services::products::{MSG_PRODUCT_ADDED, MSG_PRODUCT_DELETED, MSG_PRODUCT_UPDATED};
use star_admin_core::{Product, ProductId};

use super::{Backend, CliError, is_yes};

/// Field overrides for `products update`.
#[derive(Debug, Default)]
pub struct Changes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
}

impl Changes {
    fn apply(self, mut form: ProductForm) -> ProductForm {
        if let Some(name) = self.name {
            form.name = name;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(price) = self.price {
            form.price = price;
        }
        form
    }
}

/// Print every product, newest first.
///
/// # Errors
///
/// Returns `CliError` if the listing fails or stdout is closed.
pub async fn list(backend: &Backend) -> Result<(), CliError> {
    let products = ProductService::new(backend.data()).list().await?;
    write_products(&mut io::stdout().lock(), &products)?;
    Ok(())
}

fn write_products(out: &mut impl Write, products: &[Product]) -> io::Result<()> {
    if products.is_empty() {
        return writeln!(out, "No products found. Add one with `star-cli products add`.");
    }

    for product in products {
        writeln!(
            out,
            "{:>6}  {:<32}  {:>14}  {}",
            product.id.get(),
            product.name,
            product.price().display(),
            format_timestamp(product.created_at),
        )?;
        writeln!(out, "        {}", product.description)?;
        if let Some(url) = &product.image_url {
            writeln!(out, "        {url}")?;
        }
    }
    Ok(())
}

async fn read_image(path: Option<&Path>) -> Result<Option<ImageUpload>, CliError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::Image {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(ImageUpload {
        file_name,
        content_type: None,
        bytes,
    }))
}

/// Create a product.
///
/// # Errors
///
/// Returns `CliError` on validation, image read or remote failures.
pub async fn add(
    backend: &Backend,
    name: String,
    description: String,
    price: String,
    image: Option<&Path>,
) -> Result<(), CliError> {
    let form = ProductForm {
        name,
        description,
        price,
    };
    let image = read_image(image).await?;

    ProductService::new(backend.data()).create(&form, image).await?;

    writeln!(io::stdout().lock(), "{MSG_PRODUCT_ADDED}")?;
    list(backend).await
}

/// Update a product, keeping current values for omitted fields.
///
/// # Errors
///
/// Returns `CliError::ProductNotFound` for an unknown id, otherwise as
/// [`add`].
pub async fn update(
    backend: &Backend,
    id: ProductId,
    changes: Changes,
    image: Option<&Path>,
) -> Result<(), CliError> {
    let service = ProductService::new(backend.data());
    let product = service
        .find(id)
        .await?
        .ok_or(CliError::ProductNotFound(id))?;

    let form = changes.apply(ProductForm::from_product(&product));
    let image = read_image(image).await?;
    service.update(id, &form, image).await?;

    writeln!(io::stdout().lock(), "{MSG_PRODUCT_UPDATED}")?;
    list(backend).await
}

/// Delete a product after confirmation.
///
/// # Errors
///
/// Returns `CliError` if reading the answer or the delete fails.
pub async fn delete(backend: &Backend, id: ProductId, yes: bool) -> Result<(), CliError> {
    if !yes && !confirm("Are you sure you want to delete this product? [y/N] ").await? {
        writeln!(io::stdout().lock(), "Cancelled.")?;
        return Ok(());
    }

    ProductService::new(backend.data()).delete(id).await?;

    writeln!(io::stdout().lock(), "{MSG_PRODUCT_DELETED}")?;
    list(backend).await
}

async fn confirm(prompt: &str) -> io::Result<bool> {
    {
        let mut out = io::stdout().lock();
        write!(out, "{prompt}")?;
        out.flush()?;
    }

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(is_yes(&answer))
}
