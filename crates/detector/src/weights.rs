//! Where the model weights come from.
//!
//! An explicitly configured file wins when it exists. Otherwise the default
//! model identifier is handed to ONNX Runtime, which downloads and caches it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ModelFamily;

/// Identifier of the pretrained model served when no local weights are configured.
pub const DEFAULT_MODEL: &str = "yolov8m";

const DEFAULT_MODEL_URL: &str =
    "https://cdn.pyke.io/0/pyke:ort-rs/example-models@0.0.0/yolov8m.onnx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    Local(PathBuf),
    Remote {
        name: String,
        url: String,
        family: ModelFamily,
    },
}

impl WeightsSource {
    pub fn default_model() -> Self {
        WeightsSource::Remote {
            name: DEFAULT_MODEL.to_string(),
            url: DEFAULT_MODEL_URL.to_string(),
            family: ModelFamily::Yolo,
        }
    }

    /// Output layout to decode. Remote models carry their own; local files
    /// follow the configured family.
    pub fn family(&self, configured: ModelFamily) -> ModelFamily {
        match self {
            WeightsSource::Local(_) => configured,
            WeightsSource::Remote { family, .. } => *family,
        }
    }
}

impl fmt::Display for WeightsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsSource::Local(path) => write!(f, "{}", path.display()),
            WeightsSource::Remote { name, url, .. } => write!(f, "{} ({})", name, url),
        }
    }
}

pub fn resolve_weights(configured: Option<&Path>) -> WeightsSource {
    match configured {
        Some(path) if path.is_file() => WeightsSource::Local(path.to_path_buf()),
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                fallback = DEFAULT_MODEL,
                "Configured weights not found, falling back to default model"
            );
            WeightsSource::default_model()
        }
        None => WeightsSource::default_model(),
    }
}
