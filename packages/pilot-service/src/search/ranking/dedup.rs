use std::collections::HashSet;

use crate::search::ranking::{ScoredCandidate, text};

/// Token-set similarity of two fragments.
pub fn similarity(lhs: &str, rhs: &str) -> f32 {
	text::token_overlap_ratio(&text::token_set(lhs), &text::token_set(rhs))
}

/// Drops near-duplicates from a score-sorted list.
///
/// A fragment is discarded when its similarity to any already accepted fragment reaches
/// `threshold`, so the earlier (higher or equally scored) one always wins. The output is a
/// subsequence of the input.
pub fn deduplicate(candidates: Vec<ScoredCandidate>, threshold: f32) -> Vec<ScoredCandidate> {
	let mut accepted: Vec<(ScoredCandidate, HashSet<String>)> =
		Vec::with_capacity(candidates.len());

	for candidate in candidates {
		let tokens = text::token_set(&candidate.candidate.text);
		let duplicate_of = accepted.iter().find_map(|(kept, kept_tokens)| {
			let similarity = text::token_overlap_ratio(&tokens, kept_tokens);

			(similarity >= threshold).then_some((kept.candidate.id.as_str(), similarity))
		});

		if let Some((kept_id, similarity)) = duplicate_of {
			tracing::debug!(
				candidate_id = %candidate.candidate.id,
				kept_id,
				similarity,
				"Dropped near-duplicate fragment."
			);

			continue;
		}

		accepted.push((candidate, tokens));
	}

	accepted.into_iter().map(|(candidate, _)| candidate).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::search::ranking::ScoreFactors;
	use pilot_domain::Candidate;

	fn scored(id: &str, text: &str, score: f32) -> ScoredCandidate {
		ScoredCandidate {
			candidate: Candidate::new(id, text),
			score,
			matched_terms: Vec::new(),
			factors: ScoreFactors::default(),
		}
	}

	fn ids(candidates: &[ScoredCandidate]) -> Vec<&str> {
		candidates.iter().map(|item| item.candidate.id.as_str()).collect()
	}

	#[test]
	fn keeps_the_first_of_near_duplicates() {
		let input = vec![
			scored("a", "Система есть совокупность элементов и связей", 0.9),
			scored("b", "Система есть совокупность связей и элементов!", 0.8),
			scored("c", "Эмерджентность возникает на уровне целого", 0.7),
		];
		let output = deduplicate(input, 0.8);

		assert_eq!(ids(&output), vec!["a", "c"]);
	}

	#[test]
	fn threshold_is_inclusive() {
		let input = vec![scored("a", "один два три", 0.9), scored("b", "один два четыре", 0.8)];

		assert!((similarity("один два три", "один два четыре") - 0.5).abs() < 1e-6);
		assert_eq!(ids(&deduplicate(input.clone(), 0.5)), vec!["a"]);
		assert_eq!(ids(&deduplicate(input, 0.51)), vec!["a", "b"]);
	}

	#[test]
	fn compares_against_every_accepted_fragment() {
		let input = vec![
			scored("a", "альфа бета", 0.9),
			scored("b", "гамма дельта", 0.8),
			scored("c", "гамма дельта эпсилон", 0.7),
		];

		assert_eq!(ids(&deduplicate(input, 0.6)), vec!["a", "b"]);
	}

	#[test]
	fn accepted_pairs_stay_below_threshold() {
		let texts = [
			"система элементы связи",
			"система элементы связи окружение",
			"границы окружение",
			"границы окружение интерфейс",
			"холизм",
			"система элементы",
		];
		let input: Vec<ScoredCandidate> = texts
			.iter()
			.enumerate()
			.map(|(idx, text)| scored(&idx.to_string(), text, 1.0 - idx as f32 * 0.1))
			.collect();

		for threshold in [0.0, 0.3, 0.5, 0.75, 1.0] {
			let output = deduplicate(input.clone(), threshold);

			for (i, lhs) in output.iter().enumerate() {
				for rhs in &output[i + 1..] {
					assert!(similarity(&lhs.candidate.text, &rhs.candidate.text) < threshold);
				}
			}

			let mut cursor = input.iter();

			for item in &output {
				assert!(cursor.any(|original| original == item), "Output must be a subsequence.");
			}
		}
	}
}
