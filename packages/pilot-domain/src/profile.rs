use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::term::Term;

/// The part of a learner profile that biases retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
	/// Subject area the learner works in, e.g. "управление проектами".
	#[serde(default)]
	pub domain: String,
	#[serde(default)]
	pub interests: Vec<String>,
}
impl LearnerProfile {
	/// Hint terms for query expansion: the domain first, then interests in order.
	pub fn hints(&self) -> Vec<Term> {
		let mut out = Vec::new();
		let mut seen = HashSet::new();

		for raw in std::iter::once(&self.domain).chain(self.interests.iter()) {
			let Some(term) = Term::new(raw) else { continue };

			if seen.insert(term.clone()) {
				out.push(term);
			}
		}

		out
	}
}
