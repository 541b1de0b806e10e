use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A catalog entry together with its rolling sales window.
///
/// `sales_data` is oldest-first and keeps the length it was created with;
/// new observations enter through [`Product::push_sale`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Product {
    pub id: u64,

    #[validate(custom = "validate_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,

    pub stock: u32,

    pub category: String,

    #[serde(default)]
    pub image_url: String,

    pub sales_data: Vec<u32>,

    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Product {
    /// Appends a sample and drops the oldest one.
    /// A zero-length window stays empty.
    pub fn push_sale(&mut self, sample: u32) {
        if self.sales_data.is_empty() {
            return;
        }
        self.sales_data.rotate_left(1);
        if let Some(last) = self.sales_data.last_mut() {
            *last = sample;
        }
    }

    pub fn window_len(&self) -> usize {
        self.sales_data.len()
    }
}

/// Input for creating a product; the catalog assigns id and sales window.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(custom = "validate_name")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[validate(custom = "validate_positive_price")]
    pub price: Decimal,

    #[serde(default)]
    pub stock: u32,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            price,
            ..Default::default()
        }
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builds the product this draft describes. The sales window starts
    /// zero-filled at `window_len` periods.
    pub fn into_product(
        self,
        id: u64,
        window_len: usize,
        default_category: &str,
        now: DateTime<Utc>,
    ) -> Product {
        let category = non_blank(self.category).unwrap_or_else(|| default_category.to_string());
        let image_url = non_blank(self.image_url)
            .unwrap_or_else(|| format!("https://picsum.photos/300/200?random={}", id));

        Product {
            id,
            name: self.name.trim().to_string(),
            description: non_blank(self.description),
            price: self.price,
            stock: self.stock,
            category,
            image_url,
            sales_data: vec![0; window_len],
            last_updated: now,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name");
        err.message = Some("Product name must not be empty".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

fn validate_non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must not be negative".into());
        return Err(err);
    }
    Ok(())
}
