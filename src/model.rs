use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::labels::ClassLabel;

pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;
pub const INPUT_LEN: usize = (IMAGE_SIZE as usize) * (IMAGE_SIZE as usize) * CHANNELS;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model not available: {0}")]
    Unavailable(String),
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class: ClassLabel,
    pub confidence: f32,
    pub all_predictions: Vec<f32>,
}

impl PredictionResult {
    /// Builds a result from the raw output vector, one score per label.
    pub fn from_scores(scores: Vec<f32>) -> Result<Self, ModelError> {
        if scores.len() != ClassLabel::COUNT {
            return Err(ModelError::OutputShape {
                expected: ClassLabel::COUNT,
                actual: scores.len(),
            });
        }
        if scores.iter().any(|score| !score.is_finite()) {
            return Err(ModelError::Inference(
                "model returned a non-finite score".to_string(),
            ));
        }

        // first maximum wins on ties
        let (best_index, confidence) = scores.iter().copied().enumerate().fold(
            (0, f32::NEG_INFINITY),
            |best, (i, score)| if score > best.1 { (i, score) } else { best },
        );

        let class = ClassLabel::from_index(best_index).ok_or(ModelError::OutputShape {
            expected: ClassLabel::COUNT,
            actual: scores.len(),
        })?;

        Ok(PredictionResult {
            class,
            confidence,
            all_predictions: scores,
        })
    }
}

/// Runs the network on a preprocessed `1 x 224 x 224 x 3` input and returns
/// the class probabilities.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, ModelError>;
}

enum ModelState {
    Loaded(Box<dyn InferenceBackend>),
    Unavailable(String),
}

pub struct ModelService {
    state: ModelState,
}

impl ModelService {
    pub fn loaded(backend: impl InferenceBackend + 'static) -> Self {
        ModelService {
            state: ModelState::Loaded(Box::new(backend)),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ModelService {
            state: ModelState::Unavailable(reason.into()),
        }
    }

    /// Loads the frozen graph at `model_path`. A failed load is logged and
    /// yields an unavailable service instead of an error.
    pub fn load(model_path: &Path, input_op: &str, output_op: &str) -> Self {
        #[cfg(feature = "tensorflow")]
        {
            match TensorflowBackend::load(model_path, input_op, output_op) {
                Ok(backend) => {
                    tracing::info!(path = %model_path.display(), "model loaded");
                    Self::loaded(backend)
                }
                Err(err) => {
                    tracing::error!(path = %model_path.display(), error = %err, "failed to load model");
                    Self::unavailable(err.to_string())
                }
            }
        }

        #[cfg(not(feature = "tensorflow"))]
        {
            let _ = (input_op, output_op);
            tracing::error!(path = %model_path.display(), "built without tensorflow support");
            Self::unavailable("built without tensorflow support")
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ModelState::Loaded(_) => None,
            ModelState::Unavailable(reason) => Some(reason),
        }
    }

    pub fn predict(&self, image_data: &[u8]) -> Result<PredictionResult, ModelError> {
        let backend = match &self.state {
            ModelState::Loaded(backend) => backend,
            ModelState::Unavailable(reason) => return Err(ModelError::Unavailable(reason.clone())),
        };

        let input = preprocess_image(image_data)?;
        let scores = backend.infer(&input)?;
        let result = PredictionResult::from_scores(scores)?;

        tracing::debug!(class = %result.class, confidence = result.confidence, "prediction");
        Ok(result)
    }

    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult, ModelError> {
        if let ModelState::Unavailable(reason) = &self.state {
            return Err(ModelError::Unavailable(reason.clone()));
        }
        let image_data = std::fs::read(path)?;
        self.predict(&image_data)
    }
}

/// Decodes the image, resizes it to 224x224 RGB and scales intensities to
/// `[0, 1]`, laid out row-major with interleaved channels.
pub fn preprocess_image(image_data: &[u8]) -> Result<Vec<f32>, ModelError> {
    let img = image::load_from_memory(image_data)?;
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom);

    let mut flat_img = Vec::with_capacity(INPUT_LEN);
    for pixel in resized.pixels() {
        flat_img.push(pixel[0] as f32 / 255.0);
        flat_img.push(pixel[1] as f32 / 255.0);
        flat_img.push(pixel[2] as f32 / 255.0);
    }

    Ok(flat_img)
}

#[cfg(feature = "tensorflow")]
pub use self::tf::TensorflowBackend;

#[cfg(feature = "tensorflow")]
mod tf {
    use std::{path::Path, sync::Mutex};

    use tensorflow::{
        Graph, ImportGraphDefOptions, Operation, Session, SessionOptions, SessionRunArgs, Tensor,
    };

    use super::{InferenceBackend, ModelError, CHANNELS, IMAGE_SIZE, INPUT_LEN};

    struct LoadedGraph {
        session: Session,
        graph: Graph,
    }

    /// Frozen TensorFlow graph (`.pb`) evaluated through a single session.
    pub struct TensorflowBackend {
        inner: Mutex<LoadedGraph>,
        input_op: String,
        output_op: String,
    }

    fn tf_error(status: tensorflow::Status) -> ModelError {
        ModelError::Inference(status.to_string())
    }

    fn operation(graph: &Graph, name: &str) -> Result<Operation, ModelError> {
        graph
            .operation_by_name(name)
            .map_err(tf_error)?
            .ok_or_else(|| ModelError::Inference(format!("operation '{}' not found in graph", name)))
    }

    impl TensorflowBackend {
        pub fn load(model_path: &Path, input_op: &str, output_op: &str) -> Result<Self, ModelError> {
            let model_bytes = std::fs::read(model_path)?;

            let mut graph = Graph::new();
            graph
                .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
                .map_err(tf_error)?;

            // fail at startup rather than on the first request
            operation(&graph, input_op)?;
            operation(&graph, output_op)?;

            let session = Session::new(&SessionOptions::new(), &graph).map_err(tf_error)?;

            Ok(TensorflowBackend {
                inner: Mutex::new(LoadedGraph { session, graph }),
                input_op: input_op.to_string(),
                output_op: output_op.to_string(),
            })
        }
    }

    impl InferenceBackend for TensorflowBackend {
        fn infer(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
            if input.len() != INPUT_LEN {
                return Err(ModelError::Inference(format!(
                    "expected {} input values, got {}",
                    INPUT_LEN,
                    input.len()
                )));
            }

            let loaded = self
                .inner
                .lock()
                .map_err(|_| ModelError::Inference("model session lock poisoned".to_string()))?;

            let mut tensor = Tensor::new(&[1, IMAGE_SIZE as u64, IMAGE_SIZE as u64, CHANNELS as u64]);
            tensor.copy_from_slice(input);

            let input_operation = operation(&loaded.graph, &self.input_op)?;
            let output_operation = operation(&loaded.graph, &self.output_op)?;

            let mut args = SessionRunArgs::new();
            args.add_feed(&input_operation, 0, &tensor);
            let output_token = args.request_fetch(&output_operation, 0);
            loaded.session.run(&mut args).map_err(tf_error)?;

            let output_tensor: Tensor<f32> = args.fetch(output_token).map_err(tf_error)?;
            Ok(output_tensor.to_vec())
        }
    }
}
