use chrono::Utc;
use tracing::{info, warn, error};
use uuid::Uuid;

use crate::{
    error::CollageError,
    gemini::CollageModel,
    models::{CollageRequest, GenerationResult},
    prompt::build_collage_prompt,
};

/// Runs one collage attempt: synthesis, then best-effort item analysis.
///
/// Fails with [`CollageError::Validation`] before any remote call when no
/// category is selected, and with [`CollageError::RemoteData`] when synthesis
/// does not produce an image. Analysis failures never fail the attempt; the
/// image is returned with an empty item list instead.
pub async fn generate_collage(
    model: &dyn CollageModel,
    request: &CollageRequest,
) -> Result<GenerationResult, CollageError> {
    let categories = request.categories();
    if categories.is_empty() {
        return Err(CollageError::Validation);
    }

    let attempt = Uuid::new_v4();
    let prompt = build_collage_prompt(
        &request.style_description,
        &categories,
        !request.reference_images.is_empty(),
    );
    info!(%attempt, categories = ?categories, references = request.reference_images.len(), "🚀 Generating collage");

    let image = model
        .synthesize(&prompt, &request.reference_images)
        .await
        .map_err(|e| {
            error!(%attempt, "❌ Collage synthesis failed: {}", e);
            CollageError::RemoteData(e)
        })?;

    let items = match model.identify_items(&image).await {
        Ok(items) => items,
        Err(e) => {
            let e = CollageError::Analysis(e);
            warn!(%attempt, "⚠️ Item identification failed, returning collage without items: {}", e);
            Vec::new()
        }
    };

    info!(%attempt, items = items.len(), "✅ Collage generated");
    Ok(GenerationResult { image, items, generated_at: Utc::now() })
}
