use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::backend::ort::ExecutionProvider;

pub use common::Environment;

/// Output layout of the ONNX graph being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Single `[1, 4 + classes, anchors]` head, needs NMS.
    Yolo,
    /// `dets` + `labels` query heads (RF-DETR style), no NMS.
    Detr,
}

impl ModelFamily {
    pub fn default_input_size(&self) -> (u32, u32) {
        match self {
            ModelFamily::Yolo => (640, 640),
            ModelFamily::Detr => (512, 512),
        }
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yolo" | "yolov8" => Ok(ModelFamily::Yolo),
            "detr" | "rf-detr" | "rfdetr" => Ok(ModelFamily::Detr),
            other => Err(format!(
                "{} is not a supported model family. Use either `yolo` or `detr`.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub environment: Environment,
    /// Explicit weights file; when absent or missing the default model is fetched.
    pub model_path: Option<PathBuf>,
    pub model_family: ModelFamily,
    /// Overrides the family's default input size.
    pub input_size: Option<(u32, u32)>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub intra_threads: usize,
    pub execution_provider: ExecutionProvider,
    pub otel_endpoint: Option<String>,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|value| Environment::parse(&value))
            .unwrap_or_default();

        let model_path = lookup("MODEL_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let width = parse_var::<u32, _>(&lookup, "INPUT_WIDTH");
        let height = parse_var::<u32, _>(&lookup, "INPUT_HEIGHT");
        let input_size = match (width, height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        };

        Self {
            environment,
            model_path,
            model_family: parse_var(&lookup, "MODEL_FAMILY").unwrap_or(ModelFamily::Yolo),
            input_size,
            confidence_threshold: parse_var(&lookup, "CONFIDENCE_THRESHOLD").unwrap_or(0.25),
            iou_threshold: parse_var(&lookup, "IOU_THRESHOLD").unwrap_or(0.7),
            intra_threads: parse_var(&lookup, "INTRA_THREADS").unwrap_or(4),
            execution_provider: parse_var(&lookup, "EXECUTION_PROVIDER")
                .unwrap_or(ExecutionProvider::Cpu),
            otel_endpoint: lookup("OTEL_ENDPOINT").filter(|value| !value.trim().is_empty()),
        }
    }

    /// Input size for `family`, honouring an explicit override.
    pub fn input_size_for(&self, family: ModelFamily) -> (u32, u32) {
        self.input_size.unwrap_or_else(|| family.default_input_size())
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}
