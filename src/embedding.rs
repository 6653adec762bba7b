use serde::Serialize;

use crate::util::{normalize_whitespace, sha256_hex};

pub const DEFAULT_MODEL_ID: &str = "summary-hash-v1";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Deterministic feature-hashing embedder over word and bigram features.
#[derive(Debug, Clone, Serialize)]
pub struct HashingEmbedder {
    pub model_id: String,
    pub dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(model_id: &str, dimensions: usize) -> Self {
        let trimmed = model_id.trim();
        Self {
            model_id: if trimmed.is_empty() {
                DEFAULT_MODEL_ID.to_string()
            } else {
                trimmed.to_string()
            },
            dimensions: dimensions.max(8),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0_f32; self.dimensions];
        let features = summary_features(text);
        if features.is_empty() {
            return vector;
        }

        for feature in &features {
            let hash = feature_hash(feature);
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
            vector[index] += sign * weight;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID, DEFAULT_EMBEDDING_DIM)
    }
}

/// Hash recorded next to each embedding to detect edited summaries.
pub fn summary_text_hash(text: &str) -> String {
    sha256_hex(normalize_whitespace(text).as_bytes())
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

// sha256 rather than DefaultHasher so vectors stay identical across toolchains
fn feature_hash(feature: &str) -> u64 {
    let digest = sha256_hex(feature.as_bytes());
    u64::from_str_radix(&digest[..16], 16).unwrap_or_default()
}

fn summary_features(text: &str) -> Vec<String> {
    let words = normalize_whitespace(text)
        .split(' ')
        .map(|word| {
            word.chars()
                .filter(|character| character.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn l2_normalize(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();
    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    for value in values {
        *value /= norm;
    }
}
