//! Load-once handles for models shared by every document of a run

use crate::error::Result;
use log::{info, warn};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A model loaded on first use and read-only afterwards.
///
/// A failed load is logged once and remembered: later calls get `None`
/// without retrying, and callers fall back to their non-learned path.
pub struct LazyModel<T> {
    name: &'static str,
    loader: Loader<T>,
    cell: OnceLock<Option<Arc<T>>>,
}

impl<T> LazyModel<T> {
    pub fn new(name: &'static str, loader: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            name,
            loader: Box::new(loader),
            cell: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell
            .get_or_init(|| {
                let start = Instant::now();
                match (self.loader)() {
                    Ok(model) => {
                        info!("Loaded {} in {:.2?}", self.name, start.elapsed());
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        warn!("{} unavailable ({}), continuing without it: {}", self.name, e.kind(), e);
                        None
                    }
                }
            })
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Some(_)))
    }
}

impl<T> fmt::Debug for LazyModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModel")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
