//! BERT token classifier producing entity spans

use crate::error::{CvError, Result};
use crate::ml::device::select_device;
use crate::ml::lazy::LazyModel;
use crate::processing::ner::{Entity, EntityKind, EntityRecognizer};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// Text is labeled in line-aligned chunks of about this many bytes.
pub const CHUNK_BYTES: usize = 1500;
const MAX_TOKENS: usize = 512;

/// The parts of config.json the head needs.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    id2label: HashMap<String, String>,
}

fn load_error(what: &str, e: impl std::fmt::Display) -> CvError {
    CvError::ModelLoad(format!("{}: {}", what, e))
}

/// Labels indexed by class id. Ids must run from 0 without gaps.
fn labels_in_order(id2label: &HashMap<String, String>) -> Result<Vec<String>> {
    let mut labels = Vec::with_capacity(id2label.len());
    for id in 0..id2label.len() {
        let label = id2label
            .get(&id.to_string())
            .ok_or_else(|| CvError::ModelLoad(format!("id2label has no entry for class {}", id)))?;
        labels.push(label.clone());
    }
    Ok(labels)
}

/// Line-aligned slices of `text` with their byte offsets.
fn chunk_lines(text: &str, max_bytes: usize) -> Vec<(usize, &str)> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for line in text.split_inclusive('\n') {
        if end > start && end - start + line.len() > max_bytes {
            chunks.push((start, &text[start..end]));
            start = end;
        }
        end += line.len();
    }
    if end > start {
        chunks.push((start, &text[start..end]));
    }
    chunks
}

/// Merge per-token BIO tags into labeled byte ranges. `None` marks special
/// tokens, "O" marks outside. Pieces of the same word (touching offsets)
/// stay in one span even when tagged B.
pub fn decode_bio<'a>(tags: &[Option<&'a str>], offsets: &[(usize, usize)]) -> Vec<(usize, usize, &'a str)> {
    let mut spans = Vec::new();
    let mut current: Option<(usize, usize, &'a str)> = None;

    for (tag, &(start, end)) in tags.iter().zip(offsets) {
        let tag = match tag {
            Some(tag) if *tag != "O" && start < end => *tag,
            _ => {
                spans.extend(current.take());
                continue;
            }
        };
        let (inside, label) = match tag.split_once('-') {
            Some(("B", label)) => (false, label),
            Some(("I", label)) => (true, label),
            _ => (true, tag),
        };

        match current.as_mut() {
            Some((_, cur_end, cur_label)) if *cur_label == label && (inside || *cur_end == start) => {
                *cur_end = end;
            }
            _ => {
                spans.extend(current.take());
                current = Some((start, end, label));
            }
        }
    }
    spans.extend(current);
    spans
}

/// Token classifier: BERT encoder plus a linear head over `id2label`.
pub struct BertLabeler {
    model: BertModel,
    head: Linear,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl BertLabeler {
    /// Load from a directory holding config.json, tokenizer.json and model.safetensors.
    pub fn load(dir: &Path, device: Device) -> Result<Self> {
        let config_raw = std::fs::read_to_string(dir.join("config.json"))
            .map_err(|e| load_error("Failed to read labeler config", e))?;
        let bert_config: BertConfig =
            serde_json::from_str(&config_raw).map_err(|e| load_error("Invalid BERT config", e))?;
        let head_config: HeadConfig =
            serde_json::from_str(&config_raw).map_err(|e| load_error("Invalid classifier config", e))?;
        let labels = labels_in_order(&head_config.id2label)?;

        let tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| load_error("Failed to load tokenizer", e))?;

        let weights = dir.join("model.safetensors");
        // SAFETY: the weights file is only read, and not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(|e| load_error("Failed to map labeler weights", e))?;

        // Token-classification checkpoints nest the encoder under "bert".
        let model = BertModel::load(vb.pp("bert"), &bert_config)
            .or_else(|_| BertModel::load(vb.clone(), &bert_config))
            .map_err(|e| load_error("Failed to load BERT encoder", e))?;
        let head = candle_nn::linear(head_config.hidden_size, labels.len(), vb.pp("classifier"))
            .map_err(|e| load_error("Failed to load classification head", e))?;

        debug!("Labeler ready with {} labels on {:?}", labels.len(), device);
        Ok(Self {
            model,
            head,
            tokenizer,
            labels,
            device,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn label_chunk(&self, text: &str, offset: usize, chunk: &str) -> Result<Vec<Entity>> {
        let encoding = self
            .tokenizer
            .encode(chunk, true)
            .map_err(|e| CvError::Inference(format!("Tokenization failed: {}", e)))?;
        let len = encoding.get_ids().len().min(MAX_TOKENS);
        if len == 0 {
            return Ok(Vec::new());
        }
        let ids = &encoding.get_ids()[..len];
        let offsets = &encoding.get_offsets()[..len];
        let special = &encoding.get_special_tokens_mask()[..len];

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let attention_mask = input_ids.ones_like()?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let predictions = self
            .head
            .forward(&hidden)?
            .argmax(D::Minus1)?
            .squeeze(0)?
            .to_vec1::<u32>()?;

        let tags: Vec<Option<&str>> = predictions
            .iter()
            .zip(special)
            .map(|(&class, &is_special)| {
                (is_special == 0)
                    .then(|| self.labels.get(class as usize).map(String::as_str))
                    .flatten()
            })
            .collect();

        let entities = decode_bio(&tags, offsets)
            .into_iter()
            .filter_map(|(start, end, label)| {
                let kind = EntityKind::from_label(label)?;
                let slice = chunk.get(start..end)?;
                let lead = slice.len() - slice.trim_start().len();
                let trail = slice.len() - slice.trim_end().len();
                Entity::new(text, offset + start + lead, offset + end - trail, kind)
            })
            .collect();
        Ok(entities)
    }
}

impl EntityRecognizer for BertLabeler {
    fn name(&self) -> &'static str {
        "bert"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        for (offset, chunk) in chunk_lines(text, CHUNK_BYTES) {
            entities.extend(self.label_chunk(text, offset, chunk)?);
        }
        Ok(entities)
    }
}

/// The labeler behind a lazy handle; an unavailable model yields no spans.
pub struct LazyLabeler {
    model: LazyModel<BertLabeler>,
}

impl LazyLabeler {
    pub fn new(dir: PathBuf, use_gpu: bool) -> Self {
        Self {
            model: LazyModel::new("sequence labeler", move || {
                BertLabeler::load(&dir, select_device(use_gpu)?)
            }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_loaded()
    }
}

impl EntityRecognizer for LazyLabeler {
    fn name(&self) -> &'static str {
        "bert"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        match self.model.get() {
            Some(labeler) => labeler.recognize(text),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bio() {
        // [CLS] Adèle Pat ##arot chez AWS [SEP]
        let tags = [None, Some("B-PER"), Some("I-PER"), Some("B-PER"), Some("O"), Some("B-ORG"), None];
        let offsets = [(0, 0), (0, 6), (7, 10), (10, 14), (15, 19), (20, 23), (0, 0)];
        let spans = decode_bio(&tags, &offsets);
        assert_eq!(spans, vec![(0, 14, "PER"), (20, 23, "ORG")]);
    }

    #[test]
    fn test_decode_bio_splits_adjacent_entities() {
        let tags = [Some("B-SKILL"), Some("B-SKILL"), Some("I-LOC")];
        let offsets = [(0, 6), (8, 12), (13, 18)];
        let spans = decode_bio(&tags, &offsets);
        assert_eq!(spans, vec![(0, 6, "SKILL"), (8, 12, "SKILL"), (13, 18, "LOC")]);
    }

    #[test]
    fn test_labels_in_order() {
        let id2label: HashMap<String, String> = [("1", "B-PER"), ("0", "O"), ("2", "I-PER")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(labels_in_order(&id2label).unwrap(), vec!["O", "B-PER", "I-PER"]);

        let gap: HashMap<String, String> = [("0".to_string(), "O".to_string()), ("2".to_string(), "B-ORG".to_string())]
            .into_iter()
            .collect();
        assert!(labels_in_order(&gap).is_err());
    }

    #[test]
    fn test_chunk_lines_keeps_offsets() {
        let text = "abc\ndefgh\nij\n";
        let chunks = chunk_lines(text, 6);
        assert_eq!(chunks, vec![(0, "abc\n"), (4, "defgh\n"), (10, "ij\n")]);
        for (offset, chunk) in chunks {
            assert_eq!(&text[offset..offset + chunk.len()], chunk);
        }
        assert_eq!(chunk_lines(text, 100), vec![(0, text)]);
    }

    #[test]
    fn test_missing_model_degrades_to_no_spans() {
        let labeler = LazyLabeler::new(PathBuf::from("/nonexistent/labeler"), false);
        assert!(labeler.recognize("Adèle Patarot").unwrap().is_empty());
        assert!(!labeler.is_loaded());
    }
}
