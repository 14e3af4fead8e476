mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use pilot_domain::{Candidate, SearchFilters, Term, TermTables};
use pilot_service::{BoxFuture, KnowledgeBackend};

/// One request seen by a [`ScriptedBackend`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedFetch {
	pub terms: Vec<Term>,
	pub filters: Option<SearchFilters>,
}

/// In-memory knowledge backend that replays scripted responses in order.
///
/// Once the script runs out every further fetch returns an empty list.
#[derive(Default)]
pub struct ScriptedBackend {
	script: Mutex<VecDeque<pilot_service::Result<Vec<Candidate>>>>,
	calls: AtomicUsize,
	requests: Mutex<Vec<RecordedFetch>>,
}
impl ScriptedBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Answers the first fetch with `candidates` and every later fetch with nothing.
	pub fn returning(candidates: Vec<Candidate>) -> Self {
		Self::new().then_return(candidates)
	}

	pub fn then_return(self, candidates: Vec<Candidate>) -> Self {
		self.push(Ok(candidates));

		self
	}

	pub fn then_fail(self, message: &str) -> Self {
		self.push(Err(pilot_service::Error::BackendUnavailable { message: message.to_string() }));

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<RecordedFetch> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn into_shared(self) -> Arc<Self> {
		Arc::new(self)
	}

	fn push(&self, response: pilot_service::Result<Vec<Candidate>>) {
		self.script.lock().unwrap_or_else(|err| err.into_inner()).push_back(response);
	}
}
impl KnowledgeBackend for ScriptedBackend {
	fn fetch<'a>(
		&'a self,
		terms: &'a [Term],
		filters: Option<&'a SearchFilters>,
	) -> BoxFuture<'a, pilot_service::Result<Vec<Candidate>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.requests
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(RecordedFetch { terms: terms.to_vec(), filters: filters.cloned() });

		let response = self
			.script
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.pop_front()
			.unwrap_or_else(|| Ok(Vec::new()));

		Box::pin(async move { response })
	}
}

/// Candidates `1..=priors.len()` with the given backend priors and distinct texts.
pub fn prior_candidates(priors: &[f32]) -> Vec<Candidate> {
	priors
		.iter()
		.enumerate()
		.map(|(idx, prior)| {
			Candidate::new((idx + 1).to_string(), format!("fragment number {}", idx + 1))
				.with_prior(*prior)
		})
		.collect()
}

/// Non-blank terms of `raw`, in order.
pub fn terms(raw: &[&str]) -> Vec<Term> {
	raw.iter().filter_map(|value| Term::new(value)).collect()
}

pub fn tables(raw: &str) -> Result<Arc<TermTables>> {
	Ok(Arc::new(TermTables::from_toml_str(raw)?))
}

pub fn embedded_tables() -> Result<Arc<TermTables>> {
	Ok(Arc::new(TermTables::embedded()?))
}

/// Candidate ids in order.
pub fn ids<'a, I>(items: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a Candidate>,
{
	items.into_iter().map(|candidate| candidate.id.clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prior_candidates_are_numbered_from_one() {
		let candidates = prior_candidates(&[0.9, 0.1]);

		assert_eq!(ids(&candidates), vec!["1".to_string(), "2".to_string()]);
		assert_eq!(candidates[1].prior, Some(0.1));
	}
}
