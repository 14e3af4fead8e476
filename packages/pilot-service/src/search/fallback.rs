use serde::Serialize;

use crate::search::{
	expansion::{ExpandedQuery, QueryExpander},
	ranking::ScoredCandidate,
};
use pilot_config::RetrievalConfig;

/// Which pass of a search produced a ranked list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
	Primary,
	Relaxed,
}
impl Pass {
	pub fn max_results(self, cfg: &RetrievalConfig) -> usize {
		match self {
			Self::Primary => cfg.max_results as usize,
			Self::Relaxed => cfg.fallback_max_results as usize,
		}
	}

	pub fn min_score(self, cfg: &RetrievalConfig) -> f32 {
		match self {
			Self::Primary => cfg.min_relevance_threshold,
			Self::Relaxed => cfg.fallback_min_relevance_threshold,
		}
	}
}

/// True when fallback is enabled and the ranked list is empty or its best score is under the
/// relevance threshold.
pub fn should_fallback(ranked: &[ScoredCandidate], cfg: &RetrievalConfig) -> bool {
	if !cfg.fallback_enabled {
		return false;
	}

	match ranked.iter().map(|item| item.score).reduce(f32::max) {
		None => true,
		Some(top) => top < cfg.min_relevance_threshold,
	}
}

/// The query for the relaxed pass: same seeds, graph neighbours at `fallback_relation_weight`.
pub fn relax(
	expander: &QueryExpander,
	query: &ExpandedQuery,
	cfg: &RetrievalConfig,
) -> ExpandedQuery {
	expander.reweigh(query, cfg.fallback_relation_weight, cfg)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::search::ranking::ScoreFactors;
	use pilot_domain::Candidate;

	fn scored(score: f32) -> ScoredCandidate {
		ScoredCandidate {
			candidate: Candidate::new("c", "текст"),
			score,
			matched_terms: Vec::new(),
			factors: ScoreFactors::default(),
		}
	}

	#[test]
	fn fires_on_empty_or_weak_results() {
		let cfg = RetrievalConfig::default();

		assert!(should_fallback(&[], &cfg));
		assert!(should_fallback(&[scored(0.1), scored(0.19)], &cfg));
		assert!(!should_fallback(&[scored(0.1), scored(0.2)], &cfg));
	}

	#[test]
	fn never_fires_when_disabled() {
		let cfg = RetrievalConfig { fallback_enabled: false, ..RetrievalConfig::default() };

		assert!(!should_fallback(&[], &cfg));
	}

	#[test]
	fn relaxed_pass_widens_the_cap_and_lowers_the_floor() {
		let cfg = RetrievalConfig::default();

		assert_eq!(Pass::Primary.max_results(&cfg), 5);
		assert_eq!(Pass::Relaxed.max_results(&cfg), 8);
		assert!(Pass::Relaxed.min_score(&cfg) <= Pass::Primary.min_score(&cfg));
	}
}
