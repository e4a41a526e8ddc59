use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub image: Option<String>,
    pub slug: String,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    pub id: Uuid,
    pub name: String,
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub image: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub product_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<CategoryWithCount>)]
    pub items: Vec<CategoryWithCount>,
}
