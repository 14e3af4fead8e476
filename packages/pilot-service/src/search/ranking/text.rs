use std::{cmp::Ordering, collections::HashSet};

use pilot_domain::tokenize;

pub fn token_set(text: &str) -> HashSet<String> {
	tokenize(text).into_iter().collect()
}

/// Intersection over union of two token sets. Two empty sets share nothing.
pub fn token_overlap_ratio(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	if lhs.is_empty() && rhs.is_empty() {
		return 0.0;
	}

	let (small, large) = if lhs.len() <= rhs.len() { (lhs, rhs) } else { (rhs, lhs) };
	let intersection = small.iter().filter(|token| large.contains(*token)).count();
	let union = lhs.len() + rhs.len() - intersection;

	intersection as f32 / union as f32
}

/// Marks every token position covered by an occurrence of `words` and reports whether any
/// occurrence was found.
pub fn mark_occurrences(tokens: &[String], words: &[String], covered: &mut [bool]) -> bool {
	if words.is_empty() || words.len() > tokens.len() {
		return false;
	}

	let mut found = false;

	for start in 0..=(tokens.len() - words.len()) {
		let window = &tokens[start..start + words.len()];

		if window.iter().zip(words).all(|(token, word)| token == word) {
			found = true;

			for flag in &mut covered[start..start + words.len()] {
				*flag = true;
			}
		}
	}

	found
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
