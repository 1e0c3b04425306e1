mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Exist, LlmProviderConfig, Providers, Qdrant, Retrieval,
	Service, Storage, Synthesis,
};

use std::{fs, path::Path};

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
	validate_storage(cfg)?;
	validate_providers(cfg)?;

	let retrieval = &cfg.retrieval;

	if retrieval.top_k == 0 {
		return Err(Error::invalid("retrieval.top_k", "must be greater than zero."));
	}
	if !retrieval.min_score.is_finite() || !(0.0..=1.0).contains(&retrieval.min_score) {
		return Err(Error::invalid("retrieval.min_score", "must be in the range 0.0-1.0."));
	}
	if retrieval.validation_timeout_ms == 0 {
		return Err(Error::invalid("retrieval.validation_timeout_ms", "must be greater than zero."));
	}
	if cfg.synthesis.return_limit == 0 {
		return Err(Error::invalid("synthesis.return_limit", "must be greater than zero."));
	}
	if cfg.storage.exist.max_items < cfg.synthesis.return_limit {
		return Err(Error::invalid(
			"storage.exist.max_items",
			"must be greater than or equal to synthesis.return_limit.",
		));
	}

	Ok(())
}

fn validate_storage(cfg: &Config) -> Result<()> {
	let qdrant = &cfg.storage.qdrant;
	let exist = &cfg.storage.exist;

	for (field, value) in [
		("storage.qdrant.url", &qdrant.url),
		("storage.qdrant.collection", &qdrant.collection),
		("storage.exist.url", &exist.url),
		("storage.exist.username", &exist.username),
	] {
		if value.trim().is_empty() {
			return Err(Error::invalid(field, "must be non-empty."));
		}
	}

	if qdrant.vector_dim == 0 {
		return Err(Error::invalid("storage.qdrant.vector_dim", "must be greater than zero."));
	}
	if exist.timeout_ms == 0 {
		return Err(Error::invalid("storage.exist.timeout_ms", "must be greater than zero."));
	}

	Ok(())
}

fn validate_providers(cfg: &Config) -> Result<()> {
	let providers = &cfg.providers;

	if providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::invalid(
			"providers.embedding.dimensions",
			"must match storage.qdrant.vector_dim.",
		));
	}
	if providers.embedding.api_key.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.api_key", "must be non-empty."));
	}

	for (field, llm) in [
		("providers.optimizer", &providers.optimizer),
		("providers.validator", &providers.validator),
		("providers.synthesizer", &providers.synthesizer),
	] {
		if llm.api_key.trim().is_empty() {
			return Err(Error::invalid(field, "api_key must be non-empty."));
		}
		if !llm.temperature.is_finite() || !(0.0..=2.0).contains(&llm.temperature) {
			return Err(Error::invalid(field, "temperature must be in the range 0.0-2.0."));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.exist.password.as_deref().map(|pass| pass.trim().is_empty()).unwrap_or(false) {
		cfg.storage.exist.password = None;
	}
	if cfg.storage.qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.storage.qdrant.vector_name = None;
	}
}
