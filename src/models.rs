use serde::{Serialize, Deserialize, Deserializer};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};

use crate::data_uri::DataUri;

/// Selectable furniture and decor categories, in display order.
pub const FURNITURE_CATEGORIES: &[&str] = &[
    "Sofa",
    "Lounge Chair",
    "Dining Table",
    "Dining Chair",
    "Coffee Table",
    "Side Table",
    "Sideboard",
    "Bookshelf",
    "Bed",
    "Floor Lamp",
    "Pendant Light",
    "Table Lamp",
    "Rug",
    "Curtains",
    "Plant",
    "Wall Art",
    "Mirror",
    "Cushion",
];

pub fn is_known_category(name: &str) -> bool {
    FURNITURE_CATEGORIES.contains(&name)
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CollageRequest {
    pub style_description: String,
    #[serde(default)]
    pub selected_categories: Vec<String>,
    #[serde(default)]
    pub reference_images: Vec<DataUri>,
}

impl CollageRequest {
    /// Selected categories with blanks and repeats removed, first occurrence wins.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.selected_categories.len());
        for c in &self.selected_categories {
            let c = c.trim();
            if !c.is_empty() && !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }
}

/// One object the analysis model believes is in the collage.
///
/// Optional fields are `None` when the model could not tell; blank strings
/// coming back from the model are treated the same way.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedItem {
    pub category: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub price: Option<String>,
}

#[cfg(test)]
impl IdentifiedItem {
    pub fn new(category: impl Into<String>) -> Self {
        Self { category: category.into(), brand: None, product_name: None, price: None }
    }
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub image: DataUri,
    pub items: Vec<IdentifiedItem>,
    pub generated_at: DateTime<Utc>,
}
