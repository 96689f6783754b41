use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use sha2::{Digest, Sha256};

/// Offline embedder: character bigrams hashed into a fixed number of buckets,
/// L2-normalised. Identical texts map to identical vectors.
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        for pair in chars.windows(2) {
            let gram: String = pair.iter().collect();
            let digest = Sha256::digest(gram.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % self.dimension;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_texts_share_a_vector() {
        let p = HashingProvider::default();
        let out = p
            .embed(
                &["삼성전자 실적 발표".to_string(), "삼성전자 실적 발표".to_string(), "SK하이닉스 증설".to_string()],
                InputType::Document,
            )
            .await
            .unwrap();
        assert_eq!(out[0], out[1]);
        assert_ne!(out[0], out[2]);
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
