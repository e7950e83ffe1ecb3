pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod model_cell;
pub mod processing;
pub mod result;
pub mod serialization;
pub mod startup;
pub mod weights;

pub use adapter::{Detector, global_detector, predict_image_bytes};
pub use backend::{DetectionModel, ort::OrtModel};
pub use config::{DetectorConfig, ModelFamily};
pub use error::{DetectorError, Result};
pub use result::{RawBoxes, RawResult};
pub use serialization::{BoundingBox, Detection, DetectionResponse, serialize_detections};
pub use startup::bootstrap;
pub use weights::{DEFAULT_MODEL, WeightsSource, resolve_weights};
