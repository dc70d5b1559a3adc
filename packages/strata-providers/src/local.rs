//! Deterministic feature-hashing embedder for deployments without a remote model.

use color_eyre::Result;

use crate::{BoxFuture, EmbeddingProvider};
use strata_domain::text;

pub struct HashingEmbedding {
	dimensions: usize,
}
impl HashingEmbedding {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions: dimensions.max(1) }
	}

	pub fn embed_one(&self, input: &str) -> Vec<f32> {
		let mut vec = vec![0.0_f32; self.dimensions];

		for token in text::tokenize(input) {
			let hash = blake3::hash(token.as_bytes());
			let bytes = hash.as_bytes();
			let mut index_bytes = [0_u8; 8];

			index_bytes.copy_from_slice(&bytes[..8]);

			let index = (u64::from_le_bytes(index_bytes) % self.dimensions as u64) as usize;
			let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

			vec[index] += sign;
		}

		let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

		if norm > f32::EPSILON {
			for value in &mut vec {
				*value /= norm;
			}
		}

		vec
	}
}
impl EmbeddingProvider for HashingEmbedding {
	fn dimensions(&self) -> usize {
		self.dimensions
	}

	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|text| self.embed_one(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}
