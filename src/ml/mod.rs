//! Learned components: token labeler, section classifier and their model files

pub mod device;
pub mod labeler;
pub mod lazy;
pub mod model_manager;
pub mod textcat;

pub use labeler::{BertLabeler, LazyLabeler};
pub use lazy::LazyModel;
pub use model_manager::{InstalledModel, ModelKind, ModelManager};
pub use textcat::{EmbeddingSectionClassifier, LazySectionClassifier};
