pub mod embedding;
pub mod local;

use std::{future::Future, pin::Pin, sync::Arc};

use color_eyre::{Result, eyre};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

use strata_config::EmbeddingProviderConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn dimensions(&self) -> usize;

	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub fn from_config(cfg: &EmbeddingProviderConfig) -> Arc<dyn EmbeddingProvider> {
	if cfg.is_local() {
		Arc::new(local::HashingEmbedding::new(cfg.dimensions as usize))
	} else {
		Arc::new(embedding::HttpEmbedding::new(cfg.clone()))
	}
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
