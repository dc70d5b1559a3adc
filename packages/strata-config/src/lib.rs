mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ArchiveTier, CacheTier, Config, EmbeddingProviderConfig, PersistentTier, Providers, Rag,
	Router, SemanticTier, Service, TierWeights, Tiers, TtlSeconds,
};

use std::{collections::HashSet, fs, path::Path};

use strata_domain::{Tier, routing};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.router.failure_threshold == 0 {
		return Err(Error::Validation {
			message: "router.failure_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.router.recovery_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "router.recovery_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.router.health_check_interval_ms == 0 {
		return Err(Error::Validation {
			message: "router.health_check_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.router.operation_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "router.operation_timeout_ms must be greater than zero.".to_string(),
		});
	}

	for tier in Tier::ALL {
		let weight = cfg.router.tier_weights.weight(tier);

		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("router.tier_weights.{tier} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("router.tier_weights.{tier} must be zero or greater."),
			});
		}
	}

	let mut rule_ids = HashSet::new();

	for rule in &cfg.router.rules {
		routing::validate_rule(rule)
			.map_err(|err| Error::Validation { message: format!("router.rules: {err}") })?;

		if !rule_ids.insert(rule.id.as_str()) {
			return Err(Error::Validation {
				message: format!("router.rules contains duplicate id {:?}.", rule.id),
			});
		}
	}

	if cfg.tiers.cache.enabled && cfg.tiers.cache.capacity == 0 {
		return Err(Error::Validation {
			message: "tiers.cache.capacity must be greater than zero when enabled.".to_string(),
		});
	}
	if let Some(persistent) = cfg.tiers.persistent.as_ref()
		&& persistent.dsn.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "tiers.persistent.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if let Some(semantic) = cfg.tiers.semantic.as_ref() {
		if semantic.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "tiers.semantic.collection must be non-empty.".to_string(),
			});
		}
		if cfg.providers.embedding.dimensions != semantic.vector_dim {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must match tiers.semantic.vector_dim."
					.to_string(),
			});
		}
	}
	if !cfg.providers.embedding.is_local() {
		let embedding = &cfg.providers.embedding;

		for (label, value) in [
			("api_base", &embedding.api_base),
			("api_key", &embedding.api_key),
			("model", &embedding.model),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation {
					message: format!("providers.embedding.{label} must be non-empty."),
				});
			}
		}
	}
	if cfg.rag.max_sources == 0 {
		return Err(Error::Validation {
			message: "rag.max_sources must be greater than zero.".to_string(),
		});
	}
	if cfg.rag.per_store_max_results == 0 {
		return Err(Error::Validation {
			message: "rag.per_store_max_results must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("rag.min_relevance", cfg.rag.min_relevance),
		("rag.confidence_threshold", cfg.rag.confidence_threshold),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.rag.cross_reference_min_terms == 0 {
		return Err(Error::Validation {
			message: "rag.cross_reference_min_terms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for terms in [&mut cfg.rag.technical_terms, &mut cfg.rag.business_terms] {
		let mut seen = HashSet::new();

		terms.retain_mut(|term| {
			*term = term.trim().to_ascii_lowercase();

			!term.is_empty() && seen.insert(term.clone())
		});
	}

	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	if cfg.service.log_level.is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
