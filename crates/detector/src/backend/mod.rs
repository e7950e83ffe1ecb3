use std::path::Path;

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::result::RawResult;
use crate::weights::WeightsSource;

pub mod ort;

/// A loaded object-detection model.
///
/// Both methods block; callers on an async runtime must move them onto a
/// blocking worker. `predict` may be called concurrently on one instance.
pub trait DetectionModel: Send + Sync + Sized + 'static {
    fn load(source: &WeightsSource, config: &DetectorConfig) -> Result<Self>;

    /// Run inference on the image stored at `image_path`, one result per image.
    fn predict(&self, image_path: &Path) -> Result<Vec<RawResult>>;
}
