use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime unavailable: {0}")]
    Runtime(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
