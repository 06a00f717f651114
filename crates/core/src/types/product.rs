//! Product records from the `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A furniture product as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Row identity.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Price in the storefront currency.
    pub price: Decimal,
    /// Public URL of the product image, if one was uploaded.
    #[serde(default)]
    pub image_url: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// The price with currency information for display.
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_amount(self.price)
    }
}

/// Column values written on insert or update.
///
/// `image_url` is omitted from the payload when `None`, so an update without
/// a new image leaves the stored URL untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
