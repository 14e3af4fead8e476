pub mod context;
pub mod search;

mod error;

pub use context::build_generation_context;
pub use error::{Error, Result};
pub use search::{
	RetrievalResult, Retriever, SearchRequest,
	expansion::{ExpandedQuery, ExpandedTerm, QueryExpander, TermOrigin},
	fallback::{Pass, relax, should_fallback},
	ranking::{ScoreFactors, ScoredCandidate, deduplicate, rank, score, similarity},
};

use std::{future::Future, pin::Pin};

use pilot_config::Backend;
use pilot_domain::{Candidate, SearchFilters, Term};
use pilot_providers::knowledge::KnowledgeClient;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of candidate fragments for a term set.
///
/// Implementations own timeouts and retries. A failure that should reach the caller is
/// reported as [`Error::BackendUnavailable`]; an empty list means the backend had nothing.
pub trait KnowledgeBackend
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		terms: &'a [Term],
		filters: Option<&'a SearchFilters>,
	) -> BoxFuture<'a, Result<Vec<Candidate>>>;
}

/// [`KnowledgeBackend`] over the configured MCP knowledge sources.
pub struct DefaultBackend {
	client: KnowledgeClient,
}
impl DefaultBackend {
	pub fn new(cfg: &Backend) -> Result<Self> {
		Ok(Self { client: KnowledgeClient::new(cfg)? })
	}
}

impl KnowledgeBackend for DefaultBackend {
	fn fetch<'a>(
		&'a self,
		terms: &'a [Term],
		filters: Option<&'a SearchFilters>,
	) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		Box::pin(async move { Ok(self.client.fetch(terms, filters).await?) })
	}
}
