//! Async front door: bytes in, detection records out.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, OnceLock};
use std::time::Instant;

use tempfile::TempPath;

use crate::backend::{DetectionModel, ort::OrtModel};
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::metrics::{DetectorMetrics, Outcome};
use crate::model_cell::ModelCell;
use crate::serialization::{Detection, serialize_detections};
use crate::weights::{WeightsSource, resolve_weights};

const TEMP_PREFIX: &str = "detect-";

type Loader<M> = Arc<dyn Fn(&WeightsSource, &DetectorConfig) -> Result<M> + Send + Sync>;

/// Owns the lazily-loaded model and serves `predict` calls against it.
///
/// The model is loaded on the first non-empty request (or [`Detector::warm_up`])
/// and shared by every request afterwards.
pub struct Detector<M: DetectionModel> {
    cell: ModelCell<M>,
    weights: WeightsSource,
    config: Arc<DetectorConfig>,
    temp_dir: Option<PathBuf>,
    loader: Loader<M>,
    /// Built on first use so instruments bind to the meter provider
    /// installed by then.
    metrics: OnceLock<DetectorMetrics>,
}

impl<M: DetectionModel> Detector<M> {
    /// Resolve the weights location from `config` and load with `M::load`.
    pub fn new(config: DetectorConfig) -> Self {
        let weights = resolve_weights(config.model_path.as_deref());
        Self::with_loader(config, weights, M::load)
    }

    /// Use a custom constructor in place of `M::load`.
    pub fn with_loader<F>(config: DetectorConfig, weights: WeightsSource, loader: F) -> Self
    where
        F: Fn(&WeightsSource, &DetectorConfig) -> Result<M> + Send + Sync + 'static,
    {
        Self {
            cell: ModelCell::new(),
            weights,
            config: Arc::new(config),
            temp_dir: None,
            loader: Arc::new(loader),
            metrics: OnceLock::new(),
        }
    }

    /// Stage request images under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn weights(&self) -> &WeightsSource {
        &self.weights
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.is_loaded()
    }

    fn metrics(&self) -> &DetectorMetrics {
        self.metrics.get_or_init(DetectorMetrics::new)
    }

    /// The shared model, loading it first if nobody has yet.
    ///
    /// A failed load is returned to this caller only; the next call tries again.
    pub async fn model(&self) -> Result<Arc<M>> {
        if let Some(model) = self.cell.get() {
            return Ok(model);
        }

        let loader = Arc::clone(&self.loader);
        let weights = self.weights.clone();
        let config = Arc::clone(&self.config);
        let metrics = self.metrics().clone();

        self.cell
            .get_or_load(move || {
                tracing::info!(weights = %weights, "Loading detection model");
                let start = Instant::now();
                let loaded = loader(&weights, &config);
                match &loaded {
                    Ok(_) => {
                        metrics.record_model_load(Outcome::Success);
                        tracing::info!(
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Detection model ready"
                        );
                    }
                    Err(e) => {
                        metrics.record_model_load(Outcome::Failure);
                        tracing::error!(error = %e, weights = %weights, "Failed to load detection model");
                    }
                }
                loaded
            })
            .await
    }

    /// Load the model ahead of the first request.
    pub async fn warm_up(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    /// Detect objects in an encoded image.
    ///
    /// `suffix_hint` is the file extension matching the image format (with
    /// or without the leading dot, may be empty). Empty `image_bytes` yield
    /// an empty result without touching the model or the filesystem.
    #[tracing::instrument(
        name = "detect",
        skip_all,
        fields(bytes = image_bytes.len(), suffix = suffix_hint, detections = tracing::field::Empty)
    )]
    pub async fn predict(&self, image_bytes: &[u8], suffix_hint: &str) -> Result<Vec<Detection>> {
        let start = Instant::now();

        if image_bytes.is_empty() {
            tracing::debug!("Empty payload, skipping inference");
            self.metrics()
                .record_request(start.elapsed(), Outcome::Empty, 0);
            return Ok(Vec::new());
        }

        let outcome = self.detect(image_bytes, suffix_hint).await;

        match &outcome {
            Ok(detections) => {
                tracing::Span::current().record("detections", detections.len());
                tracing::debug!(detections = detections.len(), "Detection complete");
                self.metrics()
                    .record_request(start.elapsed(), Outcome::Success, detections.len());
            }
            Err(e) => {
                tracing::error!(error = %e, "Detection failed");
                self.metrics()
                    .record_request(start.elapsed(), Outcome::Failure, 0);
            }
        }

        outcome
    }

    async fn detect(&self, image_bytes: &[u8], suffix_hint: &str) -> Result<Vec<Detection>> {
        // Dropping a TempPath removes the file, so every early return below cleans up.
        let staged = self.stage(image_bytes, suffix_hint)?;

        let model = self.model().await?;
        let image_path = staged.to_path_buf();
        let inference = tokio::task::spawn_blocking(move || model.predict(&image_path)).await;

        if let Err(e) = staged.close() {
            tracing::debug!(error = %e, "Staged image already gone");
        }

        let results = inference??;
        Ok(results
            .first()
            .map(serialize_detections)
            .unwrap_or_default())
    }

    fn stage(&self, image_bytes: &[u8], suffix_hint: &str) -> Result<TempPath> {
        let _span = common::span_debug!("stage_image");

        let suffix = normalize_suffix(suffix_hint);
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(&suffix);

        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(image_bytes)?;
        file.flush()?;

        Ok(file.into_temp_path())
    }
}

impl<M: DetectionModel> std::fmt::Debug for Detector<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("weights", &self.weights)
            .field("loaded", &self.is_loaded())
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

/// Turn a caller-supplied extension into a file suffix.
///
/// Leading dots are optional. Anything other than ASCII alphanumerics is
/// dropped so a hint can never steer the path outside the temp directory.
pub(crate) fn normalize_suffix(hint: &str) -> String {
    let ext = hint.trim().trim_start_matches('.');
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return String::new();
    }
    format!(".{}", ext)
}

static DETECTOR: LazyLock<Detector<OrtModel>> =
    LazyLock::new(|| Detector::new(DetectorConfig::from_env()));

/// Process-wide detector configured from the environment.
pub fn global_detector() -> &'static Detector<OrtModel> {
    &DETECTOR
}

/// Run detection with the process-wide detector.
///
/// Call [`crate::startup::bootstrap`] first: metrics are bound to the meter
/// provider present at the first call.
pub async fn predict_image_bytes(image_bytes: &[u8], suffix_hint: &str) -> Result<Vec<Detection>> {
    DETECTOR.predict(image_bytes, suffix_hint).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_bound_on_first_call() {
        let detector: Detector<OrtModel> = Detector::with_loader(
            DetectorConfig::test_default(),
            WeightsSource::default_model(),
            |_, _| Err(crate::error::DetectorError::ModelLoad("unused".to_string())),
        );
        assert!(detector.metrics.get().is_none(), "No instruments before first call");

        let detections = detector.predict(b"", "jpg").await.unwrap();
        assert!(detections.is_empty());
        assert!(detector.metrics.get().is_some());
        assert!(!detector.is_loaded());
    }

    #[test]
    fn test_normalize_suffix() {
        assert_eq!(normalize_suffix("jpg"), ".jpg");
        assert_eq!(normalize_suffix(".png"), ".png");
        assert_eq!(normalize_suffix(" webp "), ".webp");
        assert_eq!(normalize_suffix(""), "");
        assert_eq!(normalize_suffix("."), "");
    }

    #[test]
    fn test_normalize_suffix_rejects_path_characters() {
        assert_eq!(normalize_suffix("../../etc/passwd"), "");
        assert_eq!(normalize_suffix("jpg/x"), "");
        assert_eq!(normalize_suffix("tar.gz"), "");
    }
}
