use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub retrieval: RetrievalConfig,
	pub terms: Option<Terms>,
	pub backend: Backend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

/// Ranking, deduplication and fallback knobs shared read-only by every query.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
	/// Cap on fragments returned by a primary pass.
	pub max_results: u32,
	/// Score floor for inclusion in a primary pass.
	pub min_relevance_threshold: f32,
	pub synonym_weight: f32,
	/// Weight of related-graph terms. Must stay below `synonym_weight`.
	pub relation_weight: f32,
	pub max_expansion_terms: u32,
	/// Token-set similarity at or above which two fragments count as duplicates.
	pub dedup_similarity_threshold: f32,
	pub fallback_enabled: bool,
	/// Related-graph weight used by the relaxed pass only.
	pub fallback_relation_weight: f32,
	pub fallback_max_results: u32,
	/// Score floor applied by the relaxed pass.
	pub fallback_min_relevance_threshold: f32,
	pub scoring: ScoringWeights,
}
impl Default for RetrievalConfig {
	fn default() -> Self {
		Self {
			max_results: 5,
			min_relevance_threshold: 0.2,
			synonym_weight: 0.8,
			relation_weight: 0.5,
			max_expansion_terms: 24,
			dedup_similarity_threshold: 0.8,
			fallback_enabled: true,
			fallback_relation_weight: 0.7,
			fallback_max_results: 8,
			fallback_min_relevance_threshold: 0.0,
			scoring: ScoringWeights::default(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
	pub overlap_weight: f32,
	pub density_weight: f32,
	pub prior_weight: f32,
	/// Prior used when the backend does not score a fragment.
	pub neutral_prior: f32,
}
impl Default for ScoringWeights {
	fn default() -> Self {
		Self { overlap_weight: 0.5, density_weight: 0.3, prior_weight: 0.2, neutral_prior: 0.5 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Terms {
	/// Optional. TOML file with `[synonyms]`, `[related]` and `stopwords`.
	pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_retry_backoff_ms")]
	pub retry_backoff_ms: u64,
	#[serde(default = "default_max_candidates")]
	pub max_candidates: u32,
	pub sources: Vec<BackendSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSource {
	pub name: String,
	pub url: String,
	pub tool: String,
	pub api_key: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_max_retries() -> u32 {
	1
}

fn default_retry_backoff_ms() -> u64 {
	250
}

fn default_max_candidates() -> u32 {
	20
}
