use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Instant;

use image::ImageReader;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

use super::DetectionModel;
use crate::config::{DetectorConfig, ModelFamily};
use crate::error::{DetectorError, Result};
use crate::labels::{class_names, detr_head_names};
use crate::processing::{
    post::PostProcessor,
    pre::{Normalization, PreProcessor},
};
use crate::result::RawResult;
use crate::weights::WeightsSource;

const INPUT_NAME: &str = "images";
const YOLO_OUTPUT: &str = "output0";
const DETR_BOXES_OUTPUT: &str = "dets";
const DETR_LOGITS_OUTPUT: &str = "labels";
const NAMES_METADATA_KEY: &str = "names";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda),
            other => Err(format!("{} is not a supported execution provider", other)),
        }
    }
}

/// Commit the ONNX Runtime environment and prove a session can be built.
///
/// Call once at startup so a missing runtime library fails the process
/// instead of the first request.
pub fn init_runtime() -> Result<()> {
    let _ = ort::init().with_name("detector").commit();
    Session::builder()
        .map(|_| ())
        .map_err(|e| DetectorError::Runtime(e.to_string()))
}

/// ONNX Runtime session plus the pre/post processing its graph expects.
pub struct OrtModel {
    session: Mutex<Session>,
    family: ModelFamily,
    /// `None` when the model carries no mapping of its own.
    names: Option<HashMap<i64, String>>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
}

fn load_error(e: impl fmt::Display) -> DetectorError {
    DetectorError::ModelLoad(e.to_string())
}

fn inference_error(e: impl fmt::Display) -> DetectorError {
    DetectorError::Inference(e.to_string())
}

impl OrtModel {
    fn build_session(source: &WeightsSource, config: &DetectorConfig) -> Result<Session> {
        if let WeightsSource::Local(path) = source
            && !path.is_file()
        {
            return Err(DetectorError::ModelLoad(format!(
                "Weights file not found: {}",
                path.display()
            )));
        }

        let _ = ort::init().commit();

        let builder = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?
            .with_intra_threads(config.intra_threads)
            .map_err(load_error)?;

        let builder = match config.execution_provider {
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
                builder
            }
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default()
                            .with_device_id(0)
                            .build()
                            .error_on_failure(),
                    ])
                    .map_err(load_error)?
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                tracing::warn!("CUDA requested but the `cuda` feature is disabled, using CPU");
                builder
            }
        };

        let session = match source {
            WeightsSource::Local(path) => builder.commit_from_file(path),
            WeightsSource::Remote { url, .. } => builder.commit_from_url(url),
        }
        .map_err(load_error)?;

        Ok(session)
    }
}

impl DetectionModel for OrtModel {
    fn load(source: &WeightsSource, config: &DetectorConfig) -> Result<Self> {
        let start = Instant::now();
        let session = Self::build_session(source, config)?;

        let names_metadata = session
            .metadata()
            .ok()
            .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY));
        let names = class_names(names_metadata.as_deref(), source);

        let family = source.family(config.model_family);
        let input_size = config.input_size_for(family);

        tracing::info!(
            weights = %source,
            family = ?family,
            input_width = input_size.0,
            input_height = input_size.1,
            named_classes = names.as_ref().map_or(0, HashMap::len),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            family,
            names,
            preprocessor: PreProcessor::new(input_size, Normalization::from(family)),
            postprocessor: PostProcessor::new(config.confidence_threshold, config.iou_threshold),
        })
    }

    fn predict(&self, image_path: &Path) -> Result<Vec<RawResult>> {
        let image = ImageReader::open(image_path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();

        let (input, transform) = self.preprocessor.preprocess(&image)?;

        let (candidates, names) = {
            let _infer_span = common::span!("model_inference");

            let mut session = self
                .session
                .lock()
                .map_err(|_| DetectorError::Inference("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![
                    INPUT_NAME => TensorRef::from_array_view(input.view()).map_err(inference_error)?
                ])
                .map_err(inference_error)?;

            let extract = |name: &str| {
                outputs
                    .get(name)
                    .ok_or_else(|| DetectorError::Inference(format!("Output '{}' not found", name)))?
                    .try_extract_array::<f32>()
                    .map_err(inference_error)
            };

            match self.family {
                ModelFamily::Yolo => {
                    let output = extract(YOLO_OUTPUT)?;
                    let candidates = self.postprocessor.parse_yolo(&output, &transform)?;
                    (candidates, self.names.clone())
                }
                ModelFamily::Detr => {
                    let dets = extract(DETR_BOXES_OUTPUT)?;
                    let logits = extract(DETR_LOGITS_OUTPUT)?;
                    let candidates = self.postprocessor.parse_detr(&dets, &logits, &transform)?;
                    let names = self
                        .names
                        .clone()
                        .or_else(|| detr_head_names(logits.shape()[2]));
                    (candidates, names)
                }
            }
        };

        Ok(vec![RawResult {
            names,
            boxes: Some(candidates.into_iter().collect()),
        }])
    }
}

impl fmt::Debug for OrtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrtModel")
            .field("family", &self.family)
            .field("named_classes", &self.names.as_ref().map_or(0, HashMap::len))
            .field("input_size", &self.preprocessor.input_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_execution_provider_parsing() {
        assert_eq!("CPU".parse::<ExecutionProvider>(), Ok(ExecutionProvider::Cpu));
        assert_eq!("cuda".parse::<ExecutionProvider>(), Ok(ExecutionProvider::Cuda));
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_missing_local_weights_fail_before_runtime() {
        let source = WeightsSource::Local(PathBuf::from("/nonexistent/model.onnx"));
        let err = OrtModel::load(&source, &DetectorConfig::test_default()).unwrap_err();

        match err {
            DetectorError::ModelLoad(msg) => assert!(msg.contains("/nonexistent/model.onnx")),
            other => panic!("Expected ModelLoad, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_weights_fail_to_load() {
        let weights = tempfile::Builder::new().suffix(".onnx").tempfile().unwrap();
        std::fs::write(weights.path(), b"not an onnx graph").unwrap();

        let source = WeightsSource::Local(weights.path().to_path_buf());
        let err = OrtModel::load(&source, &DetectorConfig::test_default()).unwrap_err();
        assert!(matches!(err, DetectorError::ModelLoad(_)));
    }
}
