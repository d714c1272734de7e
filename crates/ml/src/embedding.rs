use wayfinder_retrieval::{tokenize, EmbeddingModel};

/// Signed feature hashing over catalog tokens. Deterministic, dependency-free
/// and good enough to lift paraphrased matches above pure keyword overlap.
#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub const DEFAULT_DIMS: usize = 192;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(32) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl Default for HashEmbeddingModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "hash-embedding"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0_f32; self.dims];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let index = (hash as usize) % self.dims;
            let sign = if (hash & 1) == 0 { 1.0 } else { -1.0 };
            vec[index] += sign;
        }

        normalize(&mut vec);
        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use wayfinder_retrieval::cosine_similarity;

    use super::*;

    #[test]
    fn embeddings_are_unit_length_and_case_insensitive() {
        let model = HashEmbeddingModel::default();
        let a = model.embed("Quán Cà Phê view Hồ Gươm");
        let b = model.embed("quán cà phê VIEW hồ gươm");

        assert_eq!(a.len(), 192);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(cosine_similarity(&a, &b) > 0.999);
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let model = HashEmbeddingModel::new(8);
        assert_eq!(model.dims(), 32);
        assert!(model.embed("!!").iter().all(|v| *v == 0.0));
    }
}
