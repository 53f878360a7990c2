use serde_json::{json, Value};

/// Sentence naming the categories to arrange; empty when none are given.
pub fn items_text(categories: &[&str]) -> String {
    if categories.is_empty() {
        String::new()
    } else {
        format!("Arrange elements of the following categories into a beautiful collage: {}.", categories.join(", "))
    }
}

/// Prompt for the collage synthesis call. Reference photos, when present, are
/// attached as inline parts ahead of this text.
pub fn build_collage_prompt(description: &str, categories: &[&str], has_references: bool) -> String {
    let items = items_text(categories);
    let style = if has_references {
        format!(
            "[Reference images]\n\
             Use the attached images as a reference for the tone of the room and the placement of furniture.\n\n\
             The overall style should be \"{description}\"."
        )
    } else {
        format!("Base style: a \"{description}\" space built around Cassina furniture.")
    };
    format!(
        "Create an interior design proposal sheet in A4 landscape format.\n\
         The background is a completely white document.\n\n\
         [Requested item categories]\n\
         {items}\n\n\
         {style}\n\n\
         Generate a collage in which each item is cut out and neatly arranged on the white background.\n\
         Do not include any extra text or logos."
    )
}

pub fn analysis_instruction() -> &'static str {
    "List the main furniture and decor items in this generated interior image.\n\n\
     [Requirements]\n\
     1. category: the general name of the item (e.g. three-seater sofa, floor lamp, glass table).\n\
     2. brand / productName: only when a well-known brand (especially Cassina) or product model can be clearly inferred from the image. Otherwise leave null.\n\
     3. price: an approximate market price in Japanese yen (e.g. \"about 1,200,000 yen\"). Leave null if unknown.\n\
     4. Do not include uncertain information.\n\n\
     Return the result as a JSON array."
}

/// `responseSchema` for the analysis call: an array of item records where
/// only `category` is required.
pub fn analysis_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "category": { "type": "STRING", "description": "Item category name" },
                "brand": { "type": "STRING", "description": "Brand name, only when identifiable" },
                "productName": { "type": "STRING", "description": "Product name, only when identifiable" },
                "price": { "type": "STRING", "description": "Approximate price in yen" }
            },
            "required": ["category"]
        }
    })
}
