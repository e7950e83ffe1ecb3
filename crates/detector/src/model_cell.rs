//! Lazily-initialised, process-wide model slot.
//!
//! The first caller to find the slot empty loads the model on a blocking
//! worker while holding an async lock; everyone else waits on that lock and
//! then sees the published instance. Failed loads leave the slot empty so a
//! later call retries.

use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;

use crate::error::Result;

#[derive(Debug)]
pub struct ModelCell<M> {
    slot: OnceLock<Arc<M>>,
    guard: Mutex<()>,
}

impl<M> Default for ModelCell<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCell<M> {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
            guard: Mutex::const_new(()),
        }
    }

    /// The published model, if any. Never blocks.
    pub fn get(&self) -> Option<Arc<M>> {
        self.slot.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<M: Send + Sync + 'static> ModelCell<M> {
    /// Return the published model, running `load` at most once across
    /// concurrent callers. `load` runs on the blocking pool.
    pub async fn get_or_load<F>(&self, load: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Result<M> + Send + 'static,
    {
        if let Some(model) = self.get() {
            return Ok(model);
        }

        let _guard = self.guard.lock().await;

        // Another caller may have published while we waited.
        if let Some(model) = self.get() {
            return Ok(model);
        }

        let model = Arc::new(tokio::task::spawn_blocking(load).await??);
        let published = self.slot.get_or_init(|| model);
        Ok(Arc::clone(published))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_empty_until_loaded() {
        let cell: ModelCell<u32> = ModelCell::new();
        assert!(!cell.is_loaded());
        assert!(cell.get().is_none());

        let model = cell.get_or_load(|| Ok(7)).await.unwrap();
        assert_eq!(*model, 7);
        assert!(cell.is_loaded());
    }

    #[tokio::test]
    async fn test_loaded_instance_is_reused() {
        let cell: ModelCell<u32> = ModelCell::new();
        let first = cell.get_or_load(|| Ok(1)).await.unwrap();
        let second = cell.get_or_load(|| Ok(2)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cell: ModelCell<u32> = ModelCell::new();
        let err = cell
            .get_or_load(|| Err(DetectorError::ModelLoad("missing".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::ModelLoad(_)));
        assert!(!cell.is_loaded());

        let model = cell.get_or_load(|| Ok(3)).await.unwrap();
        assert_eq!(*model, 3);
    }

    #[tokio::test]
    async fn test_panicking_loader_surfaces_worker_error() {
        let cell: ModelCell<u32> = ModelCell::new();
        let err = cell
            .get_or_load(|| -> Result<u32> { panic!("loader exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::Worker(_)));
        assert!(!cell.is_loaded());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_loads_once() {
        let cell = Arc::new(ModelCell::<usize>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    cell.get_or_load(move || {
                        std::thread::sleep(std::time::Duration::from_millis(50));
                        Ok(loads.fetch_add(1, Ordering::SeqCst))
                    })
                    .await
                })
            })
            .collect();

        let mut models = Vec::new();
        for task in tasks {
            models.push(task.await.unwrap().unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
