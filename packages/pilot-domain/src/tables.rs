use std::{
	collections::{BTreeMap, HashMap, HashSet},
	fs,
	path::Path,
};

use serde::Deserialize;

use crate::{Error, Result, term::Term};

const DEFAULT_TERMS_TOML: &str = include_str!("default_terms.toml");

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TermTablesFile {
	#[serde(default)]
	stopwords: Vec<String>,
	#[serde(default)]
	synonyms: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	related: BTreeMap<String, Vec<String>>,
}

/// Read-only synonym map, related-term graph and stopword list.
///
/// Both maps are directed lookups: an entry `a -> b` says nothing about `b -> a`.
#[derive(Debug, Clone, Default)]
pub struct TermTables {
	synonyms: HashMap<Term, Vec<Term>>,
	related: HashMap<Term, Vec<Term>>,
	stopwords: HashSet<Term>,
}
impl TermTables {
	/// Tables bundled with the crate.
	pub fn embedded() -> Result<Self> {
		Self::from_toml_str(DEFAULT_TERMS_TOML)
	}

	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadTerms { path: path.to_path_buf(), source: err })?;

		Self::from_toml_str(&raw)
	}

	pub fn from_toml_str(raw: &str) -> Result<Self> {
		let file: TermTablesFile =
			toml::from_str(raw).map_err(|err| Error::ParseTerms { source: err })?;
		let mut stopwords = HashSet::new();

		for word in &file.stopwords {
			stopwords.insert(parse_term("stopwords", word)?);
		}

		Ok(Self {
			synonyms: build_map("synonyms", file.synonyms)?,
			related: build_map("related", file.related)?,
			stopwords,
		})
	}

	pub fn synonyms(&self, term: &Term) -> &[Term] {
		self.synonyms.get(term).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn related(&self, term: &Term) -> &[Term] {
		self.related.get(term).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn is_stopword(&self, term: &Term) -> bool {
		self.stopwords.contains(term)
	}

	pub fn synonym_entries(&self) -> usize {
		self.synonyms.len()
	}

	pub fn related_entries(&self) -> usize {
		self.related.len()
	}
}

fn build_map(
	section: &str,
	entries: BTreeMap<String, Vec<String>>,
) -> Result<HashMap<Term, Vec<Term>>> {
	let mut out: HashMap<Term, Vec<Term>> = HashMap::new();

	for (key, values) in entries {
		let key = parse_term(section, &key)?;
		let targets = out.entry(key.clone()).or_default();

		for value in values {
			let value = parse_term(section, &value)?;

			if value == key || targets.contains(&value) {
				continue;
			}

			targets.push(value);
		}
	}

	out.retain(|_, targets| !targets.is_empty());

	Ok(out)
}

fn parse_term(section: &str, raw: &str) -> Result<Term> {
	Term::new(raw).ok_or_else(|| Error::InvalidTerms {
		message: format!("{section} contains a blank term."),
	})
}
