const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Text-to-vector function shared by ingestion and retrieval. Both sides must
/// use the same implementation or the similarity space falls apart, and the
/// output must be deterministic for identical input or fingerprint-based
/// dedup loses its meaning.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Signed hashed-trigram embedder with L2 normalization.
///
/// Not a learned model, but deterministic, dependency-free, and good enough
/// for lexical similarity. Each word is padded with boundary markers and cut
/// into character trigrams, so word edges count as features and trigrams
/// never straddle two words. Every trigram hashes to a bucket plus a sign,
/// which keeps unrelated texts near orthogonal instead of drifting positive
/// as collisions pile up. Vectors are unit length, so cosine similarity
/// reduces to a dot product.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

const WORD_BOUNDARY: char = '\u{1}';

fn mix_trigram(window: &[char]) -> u64 {
    let mut hash = 0x9e37_79b9_7f4a_7c15u64;
    for ch in window {
        hash ^= *ch as u64;
        hash = hash.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        hash ^= hash >> 27;
    }
    hash
}

impl Embedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let buckets = vector.len() as u64;
        let lowered = text.to_lowercase();

        for word in lowered.split_whitespace() {
            let padded: Vec<char> = std::iter::once(WORD_BOUNDARY)
                .chain(word.chars())
                .chain(std::iter::once(WORD_BOUNDARY))
                .collect();

            for window in padded.windows(3) {
                let hash = mix_trigram(window);
                let weight = if hash >> 63 == 0 { 1.0 } else { -1.0 };
                vector[(hash % buckets) as usize] += weight;
            }
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[cfg(test)]
mod tests {
    use super::{Embedder, HashedNgramEmbedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = HashedNgramEmbedder::default();
        let first = embedder.embed("What does the document say about risk?");
        let second = embedder.embed("What does the document say about risk?");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = HashedNgramEmbedder { dimensions: 32 };
        assert_eq!(embedder.embed("abc").len(), 32);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashedNgramEmbedder::default();
        let vector = embedder.embed("security monitoring and performance baselines");
        let magnitude: f32 = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    fn word_boundaries_are_part_of_the_feature_space() {
        let embedder = HashedNgramEmbedder::default();
        // Same characters, different word split: the boundary trigrams differ.
        assert_ne!(embedder.embed("note book"), embedder.embed("notebook"));
        // Whitespace amount does not matter, only the split.
        assert_eq!(embedder.embed("note  book"), embedder.embed("note book"));
    }

    #[test]
    fn similar_text_scores_higher_than_unrelated() {
        let embedder = HashedNgramEmbedder::default();
        let base = embedder.embed("hydraulic pressure relief valve");
        let close = embedder.embed("pressure relief valve maintenance");
        let far = embedder.embed("quarterly marketing newsletter draft");

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&base, &close) > dot(&base, &far));
    }
}
