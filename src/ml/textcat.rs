//! Section classifier: static embeddings plus a multi-label linear head

use crate::error::{CvError, Result};
use crate::ml::lazy::LazyModel;
use crate::processing::document::SectionCategory;
use crate::processing::ner::SectionClassifier;
use log::debug;
use model2vec_rs::model::StaticModel;
use ndarray::{Array1, Array2};
use safetensors::{tensor::Dtype, SafeTensors};
use std::path::{Path, PathBuf};

pub const HEAD_FILE: &str = "textcat_head.safetensors";
pub const LABELS_FILE: &str = "textcat_labels.json";

/// Blocks longer than this are classified on their leading part.
const MAX_BLOCK_CHARS: usize = 2000;

fn load_error(what: &str, e: impl std::fmt::Display) -> CvError {
    CvError::ModelLoad(format!("{}: {}", what, e))
}

fn decode_f32(data: &[u8], dtype: Dtype, name: &str) -> Result<Vec<f32>> {
    match dtype {
        Dtype::F32 => Ok(data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        other => Err(CvError::ModelLoad(format!(
            "Tensor '{}' has unsupported dtype {:?}",
            name, other
        ))),
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Linear head over sentence embeddings, one sigmoid output per label.
/// Labels the pipeline does not know are kept as `None` and never reported.
#[derive(Debug, Clone)]
pub struct SectionHead {
    weight: Array2<f32>,
    bias: Array1<f32>,
    labels: Vec<Option<SectionCategory>>,
}

impl SectionHead {
    pub fn new(weight: Array2<f32>, bias: Array1<f32>, labels: Vec<Option<SectionCategory>>) -> Result<Self> {
        let (rows, _) = weight.dim();
        if rows != bias.len() || rows != labels.len() {
            return Err(CvError::ModelLoad(format!(
                "Section head shape mismatch: {} rows, {} biases, {} labels",
                rows,
                bias.len(),
                labels.len()
            )));
        }
        Ok(Self { weight, bias, labels })
    }

    /// Read `weight` [labels x dim] and `bias` [labels] from safetensors bytes.
    pub fn from_safetensors(bytes: &[u8], label_names: &[String]) -> Result<Self> {
        let tensors = SafeTensors::deserialize(bytes).map_err(|e| load_error("Invalid section head", e))?;

        let weight = tensors
            .tensor("weight")
            .map_err(|e| load_error("Section head has no weight", e))?;
        let [rows, cols]: [usize; 2] = weight
            .shape()
            .try_into()
            .map_err(|_| CvError::ModelLoad("Section head weight is not 2-D".to_string()))?;
        let weight = Array2::from_shape_vec((rows, cols), decode_f32(weight.data(), weight.dtype(), "weight")?)
            .map_err(|e| load_error("Bad weight shape", e))?;

        let bias = tensors
            .tensor("bias")
            .map_err(|e| load_error("Section head has no bias", e))?;
        let bias = Array1::from(decode_f32(bias.data(), bias.dtype(), "bias")?);

        let labels = label_names
            .iter()
            .map(|name| SectionCategory::from_label(name))
            .collect();
        Self::new(weight, bias, labels)
    }

    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Sigmoid score per known label.
    pub fn scores(&self, embedding: &[f32]) -> Result<Vec<(SectionCategory, f32)>> {
        if embedding.len() != self.dim() {
            return Err(CvError::Inference(format!(
                "Embedding has {} dimensions, head expects {}",
                embedding.len(),
                self.dim()
            )));
        }
        let x = Array1::from(embedding.to_vec());
        let logits = self.weight.dot(&x) + &self.bias;
        Ok(self
            .labels
            .iter()
            .zip(logits.iter())
            .filter_map(|(label, &logit)| label.map(|category| (category, sigmoid(logit))))
            .collect())
    }
}

pub struct EmbeddingSectionClassifier {
    model: StaticModel,
    head: SectionHead,
}

impl EmbeddingSectionClassifier {
    /// Load the static model, `textcat_head.safetensors` and `textcat_labels.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let model = StaticModel::from_pretrained(dir, None, None, None)
            .map_err(|e| load_error("Failed to load embedding model", e))?;

        let labels_raw = std::fs::read_to_string(dir.join(LABELS_FILE))
            .map_err(|e| load_error("Failed to read section labels", e))?;
        let label_names: Vec<String> =
            serde_json::from_str(&labels_raw).map_err(|e| load_error("Invalid section labels", e))?;

        let head_bytes = std::fs::read(dir.join(HEAD_FILE)).map_err(|e| load_error("Failed to read section head", e))?;
        let head = SectionHead::from_safetensors(&head_bytes, &label_names)?;

        debug!("Section classifier ready: {} labels, dim {}", label_names.len(), head.dim());
        Ok(Self { model, head })
    }
}

impl SectionClassifier for EmbeddingSectionClassifier {
    fn name(&self) -> &'static str {
        "textcat"
    }

    fn classify(&self, block: &str) -> Result<Vec<(SectionCategory, f32)>> {
        let head: String = block.chars().take(MAX_BLOCK_CHARS).collect();
        if head.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.model.encode_single(&head);
        self.head.scores(&embedding)
    }
}

/// Classifier loaded on first use; contributes no scores when unavailable.
pub struct LazySectionClassifier {
    model: LazyModel<EmbeddingSectionClassifier>,
}

impl LazySectionClassifier {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            model: LazyModel::new("section classifier", move || EmbeddingSectionClassifier::load(&dir)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}

impl SectionClassifier for LazySectionClassifier {
    fn name(&self) -> &'static str {
        "textcat"
    }

    fn classify(&self, block: &str) -> Result<Vec<(SectionCategory, f32)>> {
        match self.model.get() {
            Some(classifier) => classifier.classify(block),
            None => Ok(Vec::new()),
        }
    }
}
