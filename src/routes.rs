use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use include_dir::{include_dir, Dir};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::CollageError,
    gemini::CollageModel,
    ingest::{decode_batch, FileUpload},
    models::{CollageRequest, GenerationResult, FURNITURE_CATEGORIES},
    orchestrator::generate_collage,
    pdf::generate_pdf,
    session::{ResultState, Session, SessionView, DOWNLOAD_FILE_NAME},
};

static STATIC_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

const UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub model: Arc<dyn CollageModel>,
}

impl AppState {
    pub fn new(model: Arc<dyn CollageModel>, default_style: impl Into<String>) -> Self {
        Self { session: Arc::new(RwLock::new(Session::new(default_style))), model }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/categories", get(list_categories))
        .route("/api/collage", post(create_collage))
        .route("/api/session", get(get_session))
        .route("/api/session/style", put(update_style))
        .route("/api/session/categories/:name/toggle", post(toggle_category))
        .route("/api/session/images", post(upload_images))
        .route("/api/session/images/:index", delete(remove_image))
        .route("/api/session/generate", post(generate))
        .route("/api/session/download", get(download_image))
        .route("/api/session/proposal.pdf", get(export_pdf))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                )
        )
        .with_state(state)
}

pub async fn index() -> Response {
    match STATIC_DIR.get_file("index.html").and_then(|f| f.contents_utf8()) {
        Some(page) => Html(page).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn list_categories() -> Json<&'static [&'static str]> {
    Json(FURNITURE_CATEGORIES)
}

/// Stateless variant: one request in, one result out.
pub async fn create_collage(
    State(state): State<AppState>,
    Json(body): Json<CollageRequest>,
) -> Result<Json<GenerationResult>, CollageError> {
    let result = generate_collage(state.model.as_ref(), &body).await?;
    Ok(Json(result))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.read().view())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleBody {
    pub style_description: String,
}

pub async fn update_style(State(state): State<AppState>, Json(body): Json<StyleBody>) -> Json<SessionView> {
    let mut session = state.session.write();
    session.set_style(body.style_description);
    Json(session.view())
}

pub async fn toggle_category(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, CollageError> {
    let mut session = state.session.write();
    session.toggle_category(&name)?;
    Ok(Json(session.view()))
}

pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, CollageError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CollageError::InvalidInput(e.to_string()))?
    {
        if field.name() != Some("files") && field.file_name().is_none() {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("file-{}", files.len() + 1));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| CollageError::InvalidInput(e.to_string()))?;
        files.push(FileUpload::new(name, content_type, bytes));
    }

    tracing::info!("📎 Received {} reference file(s)", files.len());
    // Decode outside the lock; commit the whole batch or nothing.
    let batch = decode_batch(files).await?;

    let mut session = state.session.write();
    session.add_references(batch);
    Ok(Json(session.view()))
}

pub async fn remove_image(
    Path(index): Path<usize>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, CollageError> {
    let mut session = state.session.write();
    session.remove_reference(index)?;
    Ok(Json(session.view()))
}

pub async fn generate(State(state): State<AppState>) -> Result<Json<SessionView>, CollageError> {
    let request = state.session.write().begin_submit()?;

    // The attempt owns its own task so a dropped connection cannot leave the
    // session in Loading; the result slot is written either way.
    let attempt = {
        let state = state.clone();
        tokio::spawn(async move {
            let outcome = generate_collage(state.model.as_ref(), &request).await;
            state.session.write().complete(&outcome);
            outcome
        })
    };

    match attempt.await {
        Ok(outcome) => {
            outcome?;
            Ok(Json(state.session.read().view()))
        }
        Err(e) => {
            tracing::error!("❌ Collage task aborted: {}", e);
            state.session.write().complete(&Err(CollageError::Internal(e.to_string())));
            Err(CollageError::Internal(e.to_string()))
        }
    }
}

pub async fn download_image(State(state): State<AppState>) -> Result<Response, CollageError> {
    let image = state.session.read().current_image().cloned().ok_or(CollageError::NoResult)?;
    let bytes = image.decode().map_err(|e| {
        tracing::error!("stored collage is not valid base64: {}", e);
        CollageError::NoResult
    })?;
    let headers = [
        (header::CONTENT_TYPE, image.mime_type().to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME)),
    ];
    Ok((StatusCode::OK, headers, bytes).into_response())
}

pub async fn export_pdf(State(state): State<AppState>) -> Result<Response, CollageError> {
    let (style, categories, result) = {
        let session = state.session.read();
        match session.result() {
            ResultState::Success(r) => (
                session.style_description().to_string(),
                session.selected().to_vec(),
                r.clone(),
            ),
            _ => return Err(CollageError::NoResult),
        }
    };

    match generate_pdf(&style, &categories, &result) {
        Ok(pdf_bytes) => {
            let headers = [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"interior-proposal.pdf\"".to_string()),
            ];
            Ok((StatusCode::OK, headers, pdf_bytes).into_response())
        }
        Err(e) => {
            tracing::error!("❌ PDF export failed: {}", e);
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_uri::DataUri,
        error::{GENERATION_FAILED_MESSAGE, NO_CATEGORY_MESSAGE},
        ingest::tests::png_bytes,
        models::IdentifiedItem,
        orchestrator::tests::{MockModel, Synth},
    };
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    fn app_with(model: MockModel) -> (Router, Arc<MockModel>, AppState) {
        let model = Arc::new(model);
        let state = AppState::new(model.clone(), "Modern, refined style");
        (router(state.clone()), model, state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart(files: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
        let boundary = "collage-boundary";
        let mut body = Vec::new();
        for (name, ct, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: {ct}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/session/images")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn generate_without_categories_is_rejected_without_remote_calls() {
        let (app, model, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, body) = send_json(&app, post("/api/session/generate")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], NO_CATEGORY_MESSAGE);
        assert!(model.synth_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn generate_success_then_download() {
        let items = vec![IdentifiedItem::new("Sofa")];
        let (app, _, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(items)));
        send(&app, post("/api/session/categories/Sofa/toggle")).await;

        let (status, view) = send_json(&app, post("/api/session/generate")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "success");
        assert_eq!(view["image"], MockModel::collage().to_string());
        assert_eq!(view["items"], json!([{ "category": "Sofa" }]));
        assert_eq!(view["downloadName"], DOWNLOAD_FILE_NAME);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/api/session/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"interior-collage.png\""
        );
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.to_vec(), b"collage".to_vec());
    }

    #[tokio::test]
    async fn synthesis_failure_is_generic_and_clears_image() {
        let (app, model, _) = app_with(MockModel::new(Synth::NoImage, Some(vec![])));
        send(&app, post("/api/session/categories/Rug/toggle")).await;

        let (status, body) = send_json(&app, post("/api/session/generate")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], GENERATION_FAILED_MESSAGE);
        assert!(model.analysis_calls.lock().is_empty());

        let (_, view) = send_json(&app, Request::builder().uri("/api/session").body(Body::empty()).unwrap()).await;
        assert_eq!(view["status"], "failed");
        assert_eq!(view["image"], Value::Null);

        let (status, _) = send(&app, Request::builder().uri("/api/session/download").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_while_loading_is_busy() {
        let (app, model, state) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        {
            let mut session = state.session.write();
            session.toggle_category("Sofa").unwrap();
            session.begin_submit().unwrap();
        }
        let (status, _) = send(&app, post("/api/session/generate")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(model.synth_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn upload_appends_and_delete_removes_by_position() {
        let (app, _, state) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, view) = send_json(
            &app,
            multipart(&[("a.png", "image/png", png_bytes(1)), ("b.png", "image/png", png_bytes(2))]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["referenceImages"].as_array().unwrap().len(), 2);

        send(&app, multipart(&[("c.png", "image/png", png_bytes(3))])).await;
        let req = Request::builder().method("DELETE").uri("/api/session/images/0").body(Body::empty()).unwrap();
        let (status, view) = send_json(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        let expected: Vec<Value> = [2u8, 3]
            .iter()
            .map(|s| Value::String(DataUri::from_bytes("image/png", &png_bytes(*s)).to_string()))
            .collect();
        assert_eq!(view["referenceImages"], Value::Array(expected));

        let req = Request::builder().method("DELETE").uri("/api/session/images/7").body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.session.read().view().reference_images.len(), 2);
    }

    #[tokio::test]
    async fn bad_upload_commits_nothing() {
        let (app, _, state) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, _) = send(
            &app,
            multipart(&[("a.png", "image/png", png_bytes(1)), ("notes.txt", "text/plain", b"hello".to_vec())]),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.session.read().view().reference_images.is_empty());
    }

    #[tokio::test]
    async fn stateless_collage_endpoint_degrades_on_analysis_failure() {
        let (app, _, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), None));
        let req = Request::builder()
            .method("POST")
            .uri("/api/collage")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "styleDescription": "minimal", "selectedCategories": ["Sofa", "Lamp"] }).to_string(),
            ))
            .unwrap();
        let (status, body) = send_json(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], MockModel::collage().to_string());
        assert_eq!(body["items"], json!([]));
    }

    #[tokio::test]
    async fn unknown_category_is_a_bad_request() {
        let (app, _, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, _) = send(&app, post("/api/session/categories/Spaceship/toggle")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dropped_generate_request_still_completes_the_attempt() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (app, model, state) = app_with(
            MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])).gated(gate.clone()),
        );
        send(&app, post("/api/session/categories/Sofa/toggle")).await;

        // The client gives up while synthesis is still pending.
        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            app.clone().oneshot(post("/api/session/generate")),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(model.synth_calls.lock().len(), 1);
        assert_eq!(state.session.read().result(), &ResultState::Loading);

        gate.notify_one();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while state.session.read().result() == &ResultState::Loading {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("attempt never completed");

        let view = state.session.read().view();
        assert_eq!(view.image, Some(MockModel::collage()));
        assert!(view.can_submit);
        assert!(state.session.write().begin_submit().is_ok());
    }

    #[tokio::test]
    async fn validation_message_survives_a_session_refresh() {
        let (app, _, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, _) = send(&app, post("/api/session/generate")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, view) = send_json(&app, Request::builder().uri("/api/session").body(Body::empty()).unwrap()).await;
        assert_eq!(view["status"], "idle");
        assert_eq!(view["error"], NO_CATEGORY_MESSAGE);
    }

    #[tokio::test]
    async fn stateless_endpoint_is_not_blocked_by_a_loading_session() {
        let (app, _, state) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        {
            let mut session = state.session.write();
            session.toggle_category("Sofa").unwrap();
            session.begin_submit().unwrap();
        }
        let req = Request::builder()
            .method("POST")
            .uri("/api/collage")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "styleDescription": "minimal", "selectedCategories": ["Sofa"] }).to_string()))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.session.read().result(), &ResultState::Loading);
    }

    #[tokio::test]
    async fn index_page_is_served() {
        let (app, _, _) = app_with(MockModel::new(Synth::Image(MockModel::collage()), Some(vec![])));
        let (status, body) = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("/api/session/generate"));
    }
}
