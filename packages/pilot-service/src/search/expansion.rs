use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

use crate::{Error, Result, search::ranking::cmp_f32_desc};
use pilot_config::RetrievalConfig;
use pilot_domain::{Term, TermTables, tokenize};

const SEED_WEIGHT: f32 = 1.0;

/// How a term entered the expanded query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOrigin {
	Query,
	Hint,
	Synonym,
	Related,
}
impl TermOrigin {
	pub fn is_seed(self) -> bool {
		matches!(self, Self::Query | Self::Hint)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpandedTerm {
	pub term: Term,
	pub weight: f32,
	pub origin: TermOrigin,
	/// Function word of the question. Kept as a seed but not matched while content words
	/// exist.
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub stopword: bool,
}

/// Ordered, de-duplicated weighted term set.
///
/// Seeds (every query word, known phrases and hints) carry weight 1.0 and come first,
/// followed by expansion terms in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExpandedQuery {
	terms: Vec<ExpandedTerm>,
}
impl ExpandedQuery {
	pub fn terms(&self) -> &[ExpandedTerm] {
		&self.terms
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn weight(&self, term: &Term) -> Option<f32> {
		self.terms.iter().find(|entry| &entry.term == term).map(|entry| entry.weight)
	}

	/// Terms used for matching: every non-stopword term, or all terms when the query holds
	/// nothing else.
	pub fn matching_terms(&self) -> impl Iterator<Item = &ExpandedTerm> {
		let has_content = self.terms.iter().any(|entry| !entry.stopword);

		self.terms.iter().filter(move |entry| !has_content || !entry.stopword)
	}

	/// Summed weight of [`Self::matching_terms`].
	pub fn total_weight(&self) -> f32 {
		self.matching_terms().map(|entry| entry.weight).sum()
	}

	pub fn seeds(&self) -> impl Iterator<Item = &ExpandedTerm> {
		self.terms.iter().filter(|entry| entry.origin.is_seed())
	}

	/// Matching terms in order, as sent to the knowledge backend.
	pub fn term_list(&self) -> Vec<Term> {
		self.matching_terms().map(|entry| entry.term.clone()).collect()
	}
}

/// Turns a question plus profile hints into an [`ExpandedQuery`] over the term tables.
#[derive(Clone, Debug)]
pub struct QueryExpander {
	tables: Arc<TermTables>,
}
impl QueryExpander {
	pub fn new(tables: Arc<TermTables>) -> Self {
		Self { tables }
	}

	pub fn tables(&self) -> &TermTables {
		&self.tables
	}

	pub fn expand(
		&self,
		raw: &str,
		hints: &[Term],
		cfg: &RetrievalConfig,
	) -> Result<ExpandedQuery> {
		if raw.trim().is_empty() {
			return Err(Error::InvalidQuery { message: "query must not be empty.".to_string() });
		}

		let tokens = tokenize(raw);

		if tokens.is_empty() {
			return Err(Error::InvalidQuery { message: "query contains no words.".to_string() });
		}

		let mut seeds = Vec::new();

		for term in self.query_terms(&tokens) {
			let stopword = self.tables.is_stopword(&term);

			seeds.push(ExpandedTerm {
				term,
				weight: SEED_WEIGHT,
				origin: TermOrigin::Query,
				stopword,
			});
		}
		for hint in hints {
			seeds.push(ExpandedTerm {
				term: hint.clone(),
				weight: SEED_WEIGHT,
				origin: TermOrigin::Hint,
				stopword: false,
			});
		}

		let query = self.expand_seeds(seeds, cfg.relation_weight, cfg);

		tracing::debug!(
			seeds = query.seeds().count(),
			terms = query.len(),
			"Expanded query."
		);

		Ok(query)
	}

	/// Re-derives `query` from its seeds with `relation_weight` for graph neighbours.
	pub fn reweigh(
		&self,
		query: &ExpandedQuery,
		relation_weight: f32,
		cfg: &RetrievalConfig,
	) -> ExpandedQuery {
		self.expand_seeds(query.seeds().cloned().collect(), relation_weight, cfg)
	}

	fn expand_seeds(
		&self,
		seeds: Vec<ExpandedTerm>,
		relation_weight: f32,
		cfg: &RetrievalConfig,
	) -> ExpandedQuery {
		let mut builder = Builder::default();

		for seed in &seeds {
			builder.offer(&seed.term, seed.weight, seed.origin, seed.stopword);
		}
		for seed in &seeds {
			for synonym in self.tables.synonyms(&seed.term) {
				builder.offer(synonym, cfg.synonym_weight, TermOrigin::Synonym, false);
			}
			for related in self.tables.related(&seed.term) {
				builder.offer(related, relation_weight, TermOrigin::Related, false);
			}
		}

		ExpandedQuery { terms: cap_terms(builder.terms, cfg.max_expansion_terms as usize) }
	}

	/// Every word of the query in order, plus any pair of adjacent content words the tables
	/// know as a phrase.
	fn query_terms(&self, tokens: &[String]) -> Vec<Term> {
		let mut out: Vec<Term> = Vec::new();
		let mut previous: Option<Term> = None;

		for word in tokens.iter().filter_map(|token| Term::new(token)) {
			if !out.contains(&word) {
				out.push(word.clone());
			}
			if self.tables.is_stopword(&word) {
				continue;
			}
			if let Some(prev) = previous.as_ref()
				&& let Some(phrase) = Term::new(&format!("{prev} {word}"))
				&& self.is_known(&phrase)
				&& !out.contains(&phrase)
			{
				out.push(phrase);
			}

			previous = Some(word);
		}

		out
	}

	fn is_known(&self, term: &Term) -> bool {
		!self.tables.synonyms(term).is_empty() || !self.tables.related(term).is_empty()
	}
}

#[derive(Default)]
struct Builder {
	terms: Vec<ExpandedTerm>,
	index: HashMap<Term, usize>,
}
impl Builder {
	/// Adds `term`, or raises the weight of an already seen term in place.
	fn offer(&mut self, term: &Term, weight: f32, origin: TermOrigin, stopword: bool) {
		match self.index.get(term) {
			Some(&idx) => {
				let entry = &mut self.terms[idx];

				if weight > entry.weight {
					entry.weight = weight;
					entry.origin = origin;
					entry.stopword = stopword;
				}
			},
			None => {
				self.index.insert(term.clone(), self.terms.len());
				self.terms.push(ExpandedTerm { term: term.clone(), weight, origin, stopword });
			},
		}
	}
}

/// Keeps every seed, then the heaviest expansion terms that fit, in discovery order.
fn cap_terms(terms: Vec<ExpandedTerm>, cap: usize) -> Vec<ExpandedTerm> {
	if terms.len() <= cap {
		return terms;
	}

	let seeds = terms.iter().filter(|entry| entry.origin.is_seed()).count();
	let budget = cap.saturating_sub(seeds);
	let mut expansions: Vec<(usize, f32)> = terms
		.iter()
		.enumerate()
		.filter(|(_, entry)| !entry.origin.is_seed())
		.map(|(idx, entry)| (idx, entry.weight))
		.collect();

	expansions.sort_by(|a, b| cmp_f32_desc(a.1, b.1).then(a.0.cmp(&b.0)));

	let mut keep = vec![false; terms.len()];

	for (idx, _) in expansions.into_iter().take(budget) {
		keep[idx] = true;
	}

	terms
		.into_iter()
		.enumerate()
		.filter(|(idx, entry)| entry.origin.is_seed() || keep[*idx])
		.map(|(_, entry)| entry)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn term(raw: &str) -> Term {
		Term::new(raw).expect("Test term must be non-empty.")
	}

	fn expander(raw: &str) -> QueryExpander {
		QueryExpander::new(Arc::new(TermTables::from_toml_str(raw).expect("Tables must parse.")))
	}

	fn listed(query: &ExpandedQuery) -> Vec<(String, f32)> {
		query.terms().iter().map(|entry| (entry.term.to_string(), entry.weight)).collect()
	}

	const TABLES: &str = r#"
stopwords = ["что", "такое"]

[synonyms]
"система" = ["system"]
"граница" = ["boundary"]
"границы системы" = ["system boundary"]

[related]
"система" = ["граница", "элементы", "связи"]
"#;

	#[test]
	fn seeds_then_synonyms_then_related() {
		let query = expander(TABLES)
			.expand("Что такое система?", &[], &RetrievalConfig::default())
			.expect("Expansion must succeed.");

		assert_eq!(listed(&query), vec![
			("что".to_string(), 1.0),
			("такое".to_string(), 1.0),
			("система".to_string(), 1.0),
			("system".to_string(), 0.8),
			("граница".to_string(), 0.5),
			("элементы".to_string(), 0.5),
			("связи".to_string(), 0.5),
		]);
	}

	#[test]
	fn every_query_word_is_a_seed_but_stopwords_are_not_matched() {
		let query = expander(TABLES)
			.expand("Что такое система?", &[], &RetrievalConfig::default())
			.expect("Expansion must succeed.");
		let seeds: Vec<(String, bool)> =
			query.seeds().map(|entry| (entry.term.to_string(), entry.stopword)).collect();

		assert_eq!(seeds, vec![
			("что".to_string(), true),
			("такое".to_string(), true),
			("система".to_string(), false),
		]);
		assert!(!query.term_list().contains(&term("что")));
		assert!((query.total_weight() - 3.3).abs() < 1e-6);
	}

	#[test]
	fn stopword_only_query_keeps_its_words_next_to_hints() {
		let query = expander(TABLES)
			.expand("Что такое?", &[term("холизм")], &RetrievalConfig::default())
			.expect("Expansion must succeed.");
		let origins: Vec<(String, TermOrigin)> =
			query.seeds().map(|entry| (entry.term.to_string(), entry.origin)).collect();

		assert_eq!(origins, vec![
			("что".to_string(), TermOrigin::Query),
			("такое".to_string(), TermOrigin::Query),
			("холизм".to_string(), TermOrigin::Hint),
		]);
		assert_eq!(query.term_list(), vec![term("холизм")]);
	}

	#[test]
	fn term_reached_twice_keeps_the_larger_weight_and_first_position() {
		let query = expander(TABLES)
			.expand("система", &[term("граница")], &RetrievalConfig::default())
			.expect("Expansion must succeed.");

		assert_eq!(query.weight(&term("граница")), Some(1.0));
		assert_eq!(query.terms()[1].origin, TermOrigin::Hint);
		assert_eq!(query.terms().iter().filter(|entry| entry.term == term("граница")).count(), 1);
	}

	#[test]
	fn cap_drops_lightest_expansions_first() {
		let cfg = RetrievalConfig { max_expansion_terms: 3, ..RetrievalConfig::default() };
		let query = expander(TABLES).expand("система", &[], &cfg).expect("Expansion must succeed.");

		assert_eq!(listed(&query), vec![
			("система".to_string(), 1.0),
			("system".to_string(), 0.8),
			("граница".to_string(), 0.5),
		]);
	}

	#[test]
	fn cap_never_drops_seeds() {
		let cfg = RetrievalConfig { max_expansion_terms: 1, ..RetrievalConfig::default() };
		let query = expander(TABLES)
			.expand("система граница", &[term("холизм")], &cfg)
			.expect("Expansion must succeed.");

		assert_eq!(query.len(), 3);
		assert!(query.terms().iter().all(|entry| entry.origin.is_seed()));
	}

	#[test]
	fn known_phrases_become_seeds() {
		let query = expander(TABLES)
			.expand("Границы системы", &[], &RetrievalConfig::default())
			.expect("Expansion must succeed.");

		assert_eq!(query.weight(&term("границы системы")), Some(1.0));
		assert_eq!(query.weight(&term("system boundary")), Some(0.8));
	}

	#[test]
	fn stopword_only_query_keeps_its_words() {
		let query = expander(TABLES)
			.expand("Что такое?", &[], &RetrievalConfig::default())
			.expect("Expansion must succeed.");

		assert_eq!(query.term_list(), vec![term("что"), term("такое")]);
	}

	#[test]
	fn blank_and_wordless_queries_are_invalid() {
		let expander = expander(TABLES);
		let cfg = RetrievalConfig::default();

		assert!(matches!(expander.expand("  \t", &[], &cfg), Err(Error::InvalidQuery { .. })));
		assert!(matches!(expander.expand("?!", &[], &cfg), Err(Error::InvalidQuery { .. })));
	}

	#[test]
	fn reweigh_only_touches_related_terms() {
		let expander = expander(TABLES);
		let cfg = RetrievalConfig::default();
		let query = expander.expand("система", &[], &cfg).expect("Expansion must succeed.");
		let relaxed = expander.reweigh(&query, 0.7, &cfg);

		assert_eq!(relaxed.weight(&term("система")), Some(1.0));
		assert_eq!(relaxed.weight(&term("system")), Some(0.8));
		assert_eq!(relaxed.weight(&term("связи")), Some(0.7));
	}
}
