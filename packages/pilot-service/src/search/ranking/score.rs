use serde::Serialize;

use crate::search::{expansion::ExpandedQuery, ranking::text};
use pilot_config::ScoringWeights;
use pilot_domain::{Candidate, Term, tokenize};

/// Per-factor breakdown of a relevance score, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreFactors {
	pub overlap: f32,
	pub density: f32,
	pub prior: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
	pub candidate: Candidate,
	pub score: f32,
	/// Expanded-query terms found in the fragment, in query order.
	pub matched_terms: Vec<Term>,
	pub factors: ScoreFactors,
}

/// Scores one fragment against the matching terms of the expanded query.
///
/// `overlap` is the matched share of their weight, `density` the share of fragment tokens
/// covered by a matched term, and `prior` the backend score or the neutral prior. The final
/// score is their weighted sum, clamped to [0, 1].
pub fn score(
	candidate: Candidate,
	query: &ExpandedQuery,
	weights: &ScoringWeights,
) -> ScoredCandidate {
	let tokens = tokenize(&candidate.text);
	let mut covered = vec![false; tokens.len()];
	let mut matched_terms = Vec::new();
	let mut matched_weight = 0.0_f32;

	for entry in query.matching_terms() {
		if text::mark_occurrences(&tokens, &entry.term.words(), &mut covered) {
			matched_weight += entry.weight;

			matched_terms.push(entry.term.clone());
		}
	}

	let total_weight = query.total_weight();
	let overlap = if total_weight > 0.0 { unit(matched_weight / total_weight) } else { 0.0 };
	let density = if tokens.is_empty() {
		0.0
	} else {
		unit(covered.iter().filter(|flag| **flag).count() as f32 / tokens.len() as f32)
	};
	let prior = candidate
		.prior
		.filter(|value| value.is_finite())
		.map(unit)
		.unwrap_or_else(|| unit(weights.neutral_prior));
	let score = unit(
		weights.overlap_weight * overlap
			+ weights.density_weight * density
			+ weights.prior_weight * prior,
	);

	ScoredCandidate {
		candidate,
		score,
		matched_terms,
		factors: ScoreFactors { overlap, density, prior },
	}
}

/// Sorts by descending score. Equal scores keep their incoming order.
pub fn rank(candidates: &mut [ScoredCandidate]) {
	candidates.sort_by(|a, b| text::cmp_f32_desc(a.score, b.score));
}

fn unit(value: f32) -> f32 {
	if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::search::expansion::QueryExpander;
	use pilot_config::RetrievalConfig;
	use pilot_domain::TermTables;

	fn query(raw: &str, tables: &str) -> ExpandedQuery {
		let tables = TermTables::from_toml_str(tables).expect("Tables must parse.");

		QueryExpander::new(Arc::new(tables))
			.expand(raw, &[], &RetrievalConfig::default())
			.expect("Expansion must succeed.")
	}

	#[test]
	fn combines_weighted_overlap_density_and_prior() {
		let query = query("система", "[synonyms]\n\"система\" = [\"system\"]\n");
		let candidate = Candidate::new("c1", "Система и окружение").with_prior(0.9);
		let scored = score(candidate, &query, &ScoringWeights::default());

		assert!((scored.factors.overlap - 1.0 / 1.8).abs() < 1e-6);
		assert!((scored.factors.density - 1.0 / 3.0).abs() < 1e-6);
		assert_eq!(scored.factors.prior, 0.9);

		let expected = 0.5 * (1.0 / 1.8) + 0.3 * (1.0 / 3.0) + 0.2 * 0.9;

		assert!((scored.score - expected).abs() < 1e-6);
		assert_eq!(scored.matched_terms, vec![Term::new("система").expect("Term must parse.")]);
	}

	#[test]
	fn missing_or_broken_prior_is_neutral() {
		let query = query("система", "");
		let weights = ScoringWeights::default();

		for candidate in [
			Candidate::new("c1", "холизм"),
			Candidate::new("c2", "холизм").with_prior(f32::NAN),
		] {
			let scored = score(candidate, &query, &weights);

			assert_eq!(scored.factors.prior, 0.5);
			assert!((scored.score - 0.1).abs() < 1e-6);
		}
	}

	#[test]
	fn out_of_range_priors_are_clamped() {
		let query = query("система", "");
		let weights = ScoringWeights::default();
		let high = score(Candidate::new("c1", "система").with_prior(7.0), &query, &weights);
		let low = score(Candidate::new("c2", "окружение").with_prior(-3.0), &query, &weights);

		assert_eq!(high.score, 1.0);
		assert_eq!(low.score, 0.0);
	}

	#[test]
	fn phrase_terms_match_only_contiguously() {
		let query = query("границы системы", "[related]\n\"границы системы\" = [\"окружение\"]\n");
		let weights = ScoringWeights::default();
		let joined =
			score(Candidate::new("c1", "Границы системы задают окружение"), &query, &weights);
		let split = score(Candidate::new("c2", "системы без границы"), &query, &weights);

		assert!(joined.matched_terms.iter().any(|term| term.as_str() == "границы системы"));
		assert!(!split.matched_terms.iter().any(|term| term.as_str() == "границы системы"));
	}

	#[test]
	fn rank_is_stable_on_ties() {
		let query = query("система", "");
		let weights = ScoringWeights::default();
		let mut scored: Vec<ScoredCandidate> = [("a", 0.3), ("b", 0.8), ("c", 0.3), ("d", 0.8)]
			.into_iter()
			.map(|(id, prior)| {
				score(Candidate::new(id, "текст").with_prior(prior), &query, &weights)
			})
			.collect();

		rank(&mut scored);

		let ids: Vec<&str> = scored.iter().map(|item| item.candidate.id.as_str()).collect();

		assert_eq!(ids, vec!["b", "d", "a", "c"]);
	}
}
