use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Product, ProductFile, ProductImage};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImagePayload {
    pub image_url: String,
    pub alt_text: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FilePayload {
    pub file_url: String,
    pub file_type: Option<String>,
    #[serde(default)]
    pub downloadable: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub currency: Option<String>,
    pub stock: i32,
    pub material: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<i64>,
    pub main_image_url: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

/// Patch applied on top of the stored product. Category is cleared whenever
/// `category_id` is absent or does not resolve; images are always replaced
/// wholesale with the supplied list.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<i64>,
    pub main_image_url: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductWithAssets {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
    pub files: Vec<ProductFile>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
