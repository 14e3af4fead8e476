mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Backend, BackendSource, Config, RetrievalConfig, ScoringWeights, Service, Terms};

use std::{collections::HashSet, fs, path::Path};

const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

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
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	cfg.retrieval.validate()?;

	let backend = &cfg.backend;

	if backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if backend.max_candidates == 0 {
		return Err(Error::Validation {
			message: "backend.max_candidates must be greater than zero.".to_string(),
		});
	}
	if backend.sources.is_empty() {
		return Err(Error::Validation {
			message: "backend.sources must contain at least one source.".to_string(),
		});
	}

	let mut names = HashSet::new();

	for source in &backend.sources {
		if source.name.trim().is_empty() {
			return Err(Error::Validation {
				message: "backend.sources.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(source.name.as_str()) {
			return Err(Error::Validation {
				message: format!("backend.sources.name {} is duplicated.", source.name),
			});
		}
		if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
			return Err(Error::Validation {
				message: format!("backend.sources.url for {} must be an http(s) URL.", source.name),
			});
		}
		if source.tool.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("backend.sources.tool for {} must be non-empty.", source.name),
			});
		}
	}

	Ok(())
}

impl RetrievalConfig {
	pub fn validate(&self) -> Result<()> {
		if self.max_results == 0 {
			return Err(Error::Validation {
				message: "retrieval.max_results must be greater than zero.".to_string(),
			});
		}
		if self.max_expansion_terms == 0 {
			return Err(Error::Validation {
				message: "retrieval.max_expansion_terms must be greater than zero.".to_string(),
			});
		}
		if self.fallback_max_results < self.max_results {
			return Err(Error::Validation {
				message: "retrieval.fallback_max_results must be at least retrieval.max_results."
					.to_string(),
			});
		}

		for (label, value) in [
			("retrieval.min_relevance_threshold", self.min_relevance_threshold),
			("retrieval.synonym_weight", self.synonym_weight),
			("retrieval.relation_weight", self.relation_weight),
			("retrieval.dedup_similarity_threshold", self.dedup_similarity_threshold),
			("retrieval.fallback_relation_weight", self.fallback_relation_weight),
			("retrieval.fallback_min_relevance_threshold", self.fallback_min_relevance_threshold),
			("retrieval.scoring.overlap_weight", self.scoring.overlap_weight),
			("retrieval.scoring.density_weight", self.scoring.density_weight),
			("retrieval.scoring.prior_weight", self.scoring.prior_weight),
			("retrieval.scoring.neutral_prior", self.scoring.neutral_prior),
		] {
			check_unit_interval(label, value)?;
		}

		if self.synonym_weight <= 0.0 || self.synonym_weight >= 1.0 {
			return Err(Error::Validation {
				message: "retrieval.synonym_weight must be greater than 0.0 and less than 1.0."
					.to_string(),
			});
		}
		if self.relation_weight <= 0.0 || self.relation_weight >= self.synonym_weight {
			return Err(Error::Validation {
				message: "retrieval.relation_weight must be greater than 0.0 and less than retrieval.synonym_weight."
					.to_string(),
			});
		}
		if self.fallback_relation_weight <= 0.0 || self.fallback_relation_weight >= 1.0 {
			return Err(Error::Validation {
				message:
					"retrieval.fallback_relation_weight must be greater than 0.0 and less than 1.0."
						.to_string(),
			});
		}
		if self.fallback_min_relevance_threshold > self.min_relevance_threshold {
			return Err(Error::Validation {
				message: "retrieval.fallback_min_relevance_threshold must not exceed retrieval.min_relevance_threshold."
					.to_string(),
			});
		}

		let sum =
			self.scoring.overlap_weight + self.scoring.density_weight + self.scoring.prior_weight;

		if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
			return Err(Error::Validation {
				message: format!("retrieval.scoring weights must sum to 1.0, got {sum}."),
			});
		}

		Ok(())
	}
}

fn check_unit_interval(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(Error::Validation { message: format!("{label} must be a finite number.") });
	}
	if !(0.0..=1.0).contains(&value) {
		return Err(Error::Validation { message: format!("{label} must be in the range 0.0-1.0.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for source in &mut cfg.backend.sources {
		if source.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			source.api_key = None;
		}
	}

	if cfg
		.terms
		.as_ref()
		.and_then(|terms| terms.path.as_ref())
		.map(|path| path.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.terms = None;
	}
}
