use std::{
    any::Any,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    handler::HandlerWithoutStateExt,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::{
    error::ApiError,
    labels::ClassLabel,
    logger::PredictionLogger,
    model::{ModelService, PredictionResult},
    recommendation::{RecommendationEngine, RecommendationRecord},
    validator::{secure_filename, ImageValidator, UploadedImage},
};

/// Service objects shared by every request. The model is read-only after
/// startup; the logger serializes its own writes.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelService>,
    pub recommender: RecommendationEngine,
    pub validator: Arc<ImageValidator>,
    pub logger: Arc<PredictionLogger>,
    pub upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        model: ModelService,
        validator: ImageValidator,
        logger: PredictionLogger,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        AppState {
            model: Arc::new(model),
            recommender: RecommendationEngine::new(),
            validator: Arc::new(validator),
            logger: Arc::new(logger),
            upload_dir: Arc::new(upload_dir.into()),
        }
    }
}

pub fn build_router(state: AppState, frontend_dir: &Path, body_limit_bytes: usize) -> Router {
    let not_found = not_found_handler.into_service();
    let uploads = ServeDir::new(state.upload_dir.as_path()).not_found_service(not_found.clone());
    let frontend = ServeDir::new(frontend_dir).not_found_service(not_found);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/predict", post(predict_handler))
        .route("/api/classes", get(classes_handler))
        .route("/api/stats", get(stats_handler))
        .nest_service("/uploads", uploads)
        .fallback_service(frontend)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub prediction: PredictionResult,
    pub recommendation: RecommendationRecord,
    pub filename: String,
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let model_status = if state.model.is_loaded() { "loaded" } else { "error" };
    Json(json!({
        "status": "healthy",
        "model_status": model_status,
        "message": "Sistema operativo",
    }))
}

async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    if !state.model.is_loaded() {
        return Err(ApiError::ModelUnavailable);
    }

    let multipart = multipart.map_err(|_| ApiError::MissingImage)?;
    let upload = read_image_field(multipart)
        .await?
        .ok_or(ApiError::MissingImage)?;

    state.validator.validate(Some(&upload))?;

    let filename = secure_filename(&upload.filename);

    let model = state.model.clone();
    let upload_dir = state.upload_dir.clone();
    let staged_name = filename.clone();
    let prediction = tokio::task::spawn_blocking(move || {
        stage_and_predict(&model, &upload_dir, &staged_name, &upload.bytes)
    })
    .await
    .map_err(|err| ApiError::Processing(err.to_string()))??;

    let recommendation = state
        .recommender
        .recommend(prediction.class.as_str(), prediction.confidence);

    state
        .logger
        .log(&filename, &prediction, &recommendation)
        .await?;

    tracing::info!(
        filename = %filename,
        class = %prediction.class,
        confidence = prediction.confidence,
        "prediction served"
    );

    Ok(Json(PredictResponse {
        success: true,
        prediction,
        recommendation,
        filename,
    }))
}

async fn read_image_field(mut multipart: Multipart) -> Result<Option<UploadedImage>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            return Ok(Some(UploadedImage {
                filename,
                bytes: bytes.to_vec(),
            }));
        }
    }
    Ok(None)
}

async fn classes_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if !state.model.is_loaded() {
        return Err(ApiError::ModelUnavailable);
    }
    Ok(Json(json!({
        "classes": ClassLabel::names(),
        "count": ClassLabel::COUNT,
    })))
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let total_predictions = state
        .logger
        .count()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let model_loaded = state.model.is_loaded();
    let classes_available = if model_loaded { ClassLabel::COUNT } else { 0 };
    Ok(Json(json!({
        "total_predictions": total_predictions,
        "model_loaded": model_loaded,
        "classes_available": classes_available,
    })))
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal("Error interno del servidor".to_string()).into_response()
}

/// Writes the upload to a uniquely named file in `upload_dir`, runs the model
/// on it and removes it again. The file belongs to this call only; a failed
/// removal is logged, never returned.
fn stage_and_predict(
    model: &ModelService,
    upload_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<PredictionResult, ApiError> {
    let staging_err = |err: std::io::Error| ApiError::Processing(err.to_string());

    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!("-{}", filename))
        .tempfile_in(upload_dir)
        .map_err(staging_err)?;
    staged.write_all(bytes).map_err(staging_err)?;
    staged.flush().map_err(staging_err)?;

    let result = model.predict_file(staged.path());

    let staged_path = staged.path().to_path_buf();
    if let Err(err) = staged.close() {
        tracing::warn!(
            path = %staged_path.display(),
            error = %err,
            "failed to remove staged upload"
        );
    }

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axum::{body::Body, http::{Request, StatusCode}};
    use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
    use tower::ServiceExt;

    use super::*;
    use crate::model::{InferenceBackend, ModelError};

    struct FirstLabel;

    impl InferenceBackend for FirstLabel {
        fn infer(&self, _input: &[f32]) -> Result<Vec<f32>, ModelError> {
            let mut scores = vec![0.0; ClassLabel::COUNT];
            scores[0] = 1.0;
            Ok(scores)
        }
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([9, 9, 9])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn staged_file_is_removed_after_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let model = ModelService::loaded(FirstLabel);

        let result = stage_and_predict(&model, dir.path(), "leaf.png", &png()).unwrap();

        assert_eq!(result.class, ClassLabel::Tomato___Bacterial_spot);
        assert!(is_empty(dir.path()));
    }

    #[test]
    fn staged_file_is_removed_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let model = ModelService::loaded(FirstLabel);

        let err = stage_and_predict(&model, dir.path(), "leaf.png", b"not an image").unwrap_err();

        assert!(matches!(err, ApiError::Processing(_)));
        assert!(is_empty(dir.path()));
    }

    #[test]
    fn existing_file_with_same_name_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("leaf.png");
        std::fs::write(&existing, b"kept for inspection").unwrap();
        let model = ModelService::loaded(FirstLabel);

        stage_and_predict(&model, dir.path(), "leaf.png", &png()).unwrap();

        assert_eq!(std::fs::read(&existing).unwrap(), b"kept for inspection");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_upload_dir_is_a_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = ModelService::loaded(FirstLabel);

        let err = stage_and_predict(&model, &dir.path().join("gone"), "leaf.png", &png()).unwrap_err();

        assert!(matches!(err, ApiError::Processing(_)));
    }

    async fn explode() -> &'static str {
        panic!("handler failed")
    }

    #[tokio::test]
    async fn handler_panic_becomes_json_500() {
        let app: Router = Router::new()
            .route("/explode", get(explode))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = app
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Error interno del servidor");
    }
}
