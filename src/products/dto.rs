use serde::{Deserialize, Serialize};

use crate::store::Product;

/// Query string for `GET /api/products/`. Everything is optional; blanks
/// count as absent.
#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    pub niche: Option<String>,
    pub platform: Option<String>,
    pub region: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOut {
    pub id: String,
    pub title: String,
    pub platform: String,
    pub niche: String,
    pub region: String,
    pub hype_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_weekly: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_monthly: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<Product> for ProductOut {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_hex(),
            title: product.title,
            platform: product.platform,
            niche: product.niche,
            region: product.region,
            hype_score: product.hype_score,
            growth_weekly: product.growth_weekly,
            growth_monthly: product.growth_monthly,
            metadata: product.metadata,
            created_at: product
                .created_at
                .and_then(|at| at.try_to_rfc3339_string().ok()),
        }
    }
}

/// One page of listing results plus the filter-wide total.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub total: u64,
    pub limit: i64,
    pub offset: u64,
    pub returned: usize,
    pub items: Vec<ProductOut>,
}
