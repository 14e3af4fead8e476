pub mod expansion;
pub mod fallback;
pub mod ranking;

use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{KnowledgeBackend, Result};
use expansion::{ExpandedQuery, QueryExpander};
use fallback::Pass;
use pilot_config::RetrievalConfig;
use pilot_domain::{LearnerProfile, SearchFilters, Term, TermTables};
use ranking::ScoredCandidate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub hints: Vec<Term>,
	#[serde(default)]
	pub filters: Option<SearchFilters>,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), hints: Vec::new(), filters: None }
	}

	/// A request biased by the learner's domain and interests.
	pub fn from_profile(query: impl Into<String>, profile: &LearnerProfile) -> Self {
		Self { query: query.into(), hints: profile.hints(), filters: None }
	}

	pub fn with_hints(mut self, hints: Vec<Term>) -> Self {
		self.hints = hints;

		self
	}

	pub fn with_filters(mut self, filters: SearchFilters) -> Self {
		self.filters = Some(filters);

		self
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct RetrievalResult {
	pub trace_id: Uuid,
	/// Descending score; equal scores keep backend order.
	pub candidates: Vec<ScoredCandidate>,
	/// The query of the pass that produced `candidates`.
	pub expanded_query: ExpandedQuery,
	pub fallback_fired: bool,
	/// Valid fragments scored by the final pass, before thresholding, deduplication and
	/// truncation.
	pub candidates_considered: usize,
	/// Fragments of the final pass dropped as malformed or as an id repeated within one
	/// source.
	pub skipped_count: usize,
	pub duplicates_removed: usize,
	pub backend_fetches: u32,
}
impl RetrievalResult {
	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}
}

struct PassOutcome {
	ranked: Vec<ScoredCandidate>,
	considered: usize,
	skipped: usize,
	duplicates_removed: usize,
}

/// Runs retrieval for one question: expansion, fetch, scoring, deduplication and at most one
/// relaxed pass.
///
/// A `Retriever` holds only immutable state, so a single instance built at startup can be
/// shared through an `Arc` by any number of concurrent searches.
pub struct Retriever {
	cfg: RetrievalConfig,
	expander: QueryExpander,
	backend: Arc<dyn KnowledgeBackend>,
}
impl Retriever {
	/// Fails with [`crate::Error::Configuration`] when `cfg` does not validate.
	pub fn new(
		cfg: RetrievalConfig,
		tables: Arc<TermTables>,
		backend: Arc<dyn KnowledgeBackend>,
	) -> Result<Self> {
		cfg.validate()?;

		Ok(Self { cfg, expander: QueryExpander::new(tables), backend })
	}

	pub fn config(&self) -> &RetrievalConfig {
		&self.cfg
	}

	pub fn expander(&self) -> &QueryExpander {
		&self.expander
	}

	pub async fn search(&self, raw_query: &str, hints: &[Term]) -> Result<RetrievalResult> {
		let req = SearchRequest::new(raw_query).with_hints(hints.to_vec());

		self.search_with(&req).await
	}

	pub async fn search_with(&self, req: &SearchRequest) -> Result<RetrievalResult> {
		let trace_id = Uuid::new_v4();
		let query = self.expander.expand(&req.query, &req.hints, &self.cfg)?;
		let filters = req.filters.as_ref().filter(|filters| !filters.is_empty());
		let primary = self.run_pass(trace_id, &query, filters, Pass::Primary).await?;

		if !fallback::should_fallback(&primary.ranked, &self.cfg) {
			return Ok(self.finish(trace_id, query, primary, Pass::Primary));
		}

		tracing::info!(
			%trace_id,
			primary_results = primary.ranked.len(),
			"Primary pass starved. Running relaxed pass."
		);

		let relaxed_query = fallback::relax(&self.expander, &query, &self.cfg);
		let relaxed = self.run_pass(trace_id, &relaxed_query, filters, Pass::Relaxed).await?;

		Ok(self.finish(trace_id, relaxed_query, relaxed, Pass::Relaxed))
	}

	async fn run_pass(
		&self,
		trace_id: Uuid,
		query: &ExpandedQuery,
		filters: Option<&SearchFilters>,
		pass: Pass,
	) -> Result<PassOutcome> {
		let terms = query.term_list();
		let fetched = self.backend.fetch(&terms, filters).await?;
		let fetched_count = fetched.len();
		let mut seen = HashSet::new();
		let mut skipped = 0;
		let mut scored = Vec::with_capacity(fetched_count);

		for candidate in fetched {
			if !candidate.is_well_formed() {
				tracing::warn!(
					%trace_id,
					candidate_id = %candidate.id,
					"Skipping malformed fragment."
				);

				skipped += 1;

				continue;
			}
			if !seen.insert((candidate.location.source.clone(), candidate.id.clone())) {
				tracing::warn!(
					%trace_id,
					candidate_id = %candidate.id,
					source = candidate.location.source.as_deref().unwrap_or("-"),
					"Skipping fragment with a repeated id."
				);

				skipped += 1;

				continue;
			}

			scored.push(ranking::score(candidate, query, &self.cfg.scoring));
		}

		let considered = scored.len();

		ranking::rank(&mut scored);

		let floor = pass.min_score(&self.cfg);

		scored.retain(|item| item.score >= floor);

		let above_floor = scored.len();
		let ranked = ranking::deduplicate(scored, self.cfg.dedup_similarity_threshold);
		let duplicates_removed = above_floor - ranked.len();

		tracing::debug!(
			%trace_id,
			?pass,
			fetched = fetched_count,
			considered,
			above_floor,
			kept = ranked.len(),
			"Retrieval pass finished."
		);

		Ok(PassOutcome { ranked, considered, skipped, duplicates_removed })
	}

	fn finish(
		&self,
		trace_id: Uuid,
		expanded_query: ExpandedQuery,
		outcome: PassOutcome,
		pass: Pass,
	) -> RetrievalResult {
		let PassOutcome { mut ranked, considered, skipped, duplicates_removed } = outcome;
		let fallback_fired = pass == Pass::Relaxed;
		let backend_fetches = if fallback_fired { 2 } else { 1 };

		ranked.truncate(pass.max_results(&self.cfg));

		tracing::info!(
			%trace_id,
			results = ranked.len(),
			considered,
			fallback_fired,
			backend_fetches,
			"Search finished."
		);

		RetrievalResult {
			trace_id,
			candidates: ranked,
			expanded_query,
			fallback_fired,
			candidates_considered: considered,
			skipped_count: skipped,
			duplicates_removed,
			backend_fetches,
		}
	}
}
